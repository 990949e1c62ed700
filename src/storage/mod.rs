//! Storage backends for the registry
//!
//! Pluggable persistence behind the [`StorageBackend`] trait. The in-memory
//! backend is the reference implementation; a durable backend can be slotted
//! in without touching the registration service.

mod memory;

pub use memory::MemoryStorage;

use crate::error::RegistryResult;
use crate::types::{Schema, SchemaId, SchemaVersion, Subject, SubjectVersion};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage backend trait for schema persistence
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Allocate (or retrieve) the schema id bound to a fingerprint.
    ///
    /// Returns `(id, true)` when a fresh id was allocated and bound, or
    /// `(id, false)` when the fingerprint was already known. The lookup and
    /// the bind are atomic per fingerprint key: concurrent callers with the
    /// same fingerprint converge on one id, and ids are never reclaimed.
    async fn allocate_schema_id(&self, fingerprint: &str) -> RegistryResult<(SchemaId, bool)>;

    /// Store a schema object under its (already allocated) id
    async fn store_schema(&self, schema: Schema) -> RegistryResult<SchemaId>;

    /// Get schema by ID
    async fn get_schema(&self, id: SchemaId) -> RegistryResult<Option<Schema>>;

    /// Get schema by fingerprint
    async fn get_schema_by_fingerprint(&self, fingerprint: &str)
        -> RegistryResult<Option<Schema>>;

    /// Append a new version binding `schema_id` under a subject.
    ///
    /// Versions start at 1, increase monotonically, and are never reused,
    /// even after deletion. Appends are serialized per subject.
    async fn append_version(
        &self,
        subject: &Subject,
        schema_id: SchemaId,
    ) -> RegistryResult<SchemaVersion>;

    /// Get all live versions for a subject, in append order
    async fn get_versions(&self, subject: &Subject) -> RegistryResult<Vec<u32>>;

    /// Get a specific version of a subject
    async fn get_subject_version(
        &self,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<Option<SubjectVersion>>;

    /// Get the latest live version of a subject
    async fn get_latest_version(&self, subject: &Subject)
        -> RegistryResult<Option<SubjectVersion>>;

    /// List all subjects with at least one live version, in first-registration order
    async fn list_subjects(&self) -> RegistryResult<Vec<Subject>>;

    /// Check if a subject has at least one live version
    async fn subject_exists(&self, subject: &Subject) -> RegistryResult<bool>;

    /// Delete a subject (soft delete by default); returns the deleted version numbers
    async fn delete_subject(&self, subject: &Subject, permanent: bool)
        -> RegistryResult<Vec<u32>>;

    /// Delete a specific version
    async fn delete_version(
        &self,
        subject: &Subject,
        version: SchemaVersion,
        permanent: bool,
    ) -> RegistryResult<()>;
}

/// Type alias for a shared storage backend
pub type Storage = Arc<dyn StorageBackend>;

/// Create a storage backend from configuration
pub async fn create_storage(config: &crate::config::StorageConfig) -> RegistryResult<Storage> {
    match config {
        crate::config::StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
