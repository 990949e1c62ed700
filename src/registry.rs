//! Schema registry - main interface
//!
//! Thread-safe, async registry over a pluggable storage backend:
//! - content-addressed schema ids, shared across subjects
//! - per-subject version logs with idempotent re-registration
//! - reference validation against already-registered schemas

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::fingerprint::SchemaFingerprint;
use crate::proto;
use crate::references::ReferenceResolver;
use crate::storage::{create_storage, Storage};
use crate::types::{
    Schema, SchemaId, SchemaReference, SchemaType, SchemaVersion, Subject, SubjectVersion,
};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, info};

/// Schema registry - registration, lookup and reference integrity
///
/// Registration is idempotent on identical content: re-registering the same
/// schema (same type, trim-identical content, same ordered reference list)
/// under the same subject returns the original id without appending a
/// version, and registering it under a different subject reuses the id with
/// a fresh version in that subject.
pub struct SchemaRegistry {
    /// Storage backend
    storage: Storage,
    /// Check protobuf imports against declared references
    verify_imports: bool,
    /// Schema cache by id
    cache_by_id: DashMap<u32, Schema>,
}

impl SchemaRegistry {
    /// Create a new registry with the given configuration
    pub async fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let storage = create_storage(&config.storage).await?;
        Ok(Self {
            storage,
            verify_imports: config.verify_imports,
            cache_by_id: DashMap::new(),
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a schema under a subject
    ///
    /// Returns the schema id (new, or existing when the content is already
    /// registered).
    pub async fn register(
        &self,
        subject: impl Into<Subject>,
        schema_type: SchemaType,
        schema: &str,
    ) -> RegistryResult<SchemaId> {
        self.register_with_references(subject, schema_type, schema, Vec::new())
            .await
    }

    /// Register a schema with references under a subject
    ///
    /// References pin types imported from other schemas to exact
    /// (subject, version) pairs. Each one must already be registered;
    /// validation failures surface before any state changes, so a failed
    /// registration leaves subjects and versions exactly as they were.
    pub async fn register_with_references(
        &self,
        subject: impl Into<Subject>,
        schema_type: SchemaType,
        schema: &str,
        references: Vec<SchemaReference>,
    ) -> RegistryResult<SchemaId> {
        let subject = subject.into();

        // 1. Syntactic validation, then imports against declared references
        validate_content(schema_type, schema)?;
        if self.verify_imports {
            check_declared_imports(schema_type, schema, &references)?;
        }

        // 2. Every declared reference (and its closure) must resolve
        let resolver = ReferenceResolver::new(&self.storage);
        resolver.resolve(&references).await?;

        // 3. Idempotent re-registration: scan all live versions of the
        //    subject, not just the latest
        let fingerprint = SchemaFingerprint::compute(schema_type, schema, &references);
        let fp_hex = fingerprint.md5_hex();
        if let Some(existing) = self.find_version_by_fingerprint(&subject, &fp_hex).await? {
            debug!(
                subject = %subject,
                version = existing.version.0,
                id = existing.id.0,
                "schema already registered under subject"
            );
            return Ok(existing.id);
        }

        // 4. Allocate or reuse the global id. Reuse happens when identical
        //    content is already registered under another subject.
        let (id, newly_allocated) = self.storage.allocate_schema_id(&fp_hex).await?;
        if newly_allocated {
            let schema_obj = Schema::new(id, schema_type, schema.to_string())
                .with_fingerprint(fp_hex.clone())
                .with_references(references);
            self.storage.store_schema(schema_obj.clone()).await?;
            self.cache_by_id.insert(id.0, schema_obj);
        }

        // 5. Append the version under this subject
        let version = self.storage.append_version(&subject, id).await?;

        info!(
            subject = %subject,
            version = version.0,
            id = id.0,
            reused = !newly_allocated,
            "registered schema"
        );

        Ok(id)
    }

    /// Find an existing registration matching the given schema exactly,
    /// without creating one.
    ///
    /// With `normalize` the comparison is fingerprint-level (trimmed content
    /// plus ordered references); without it the content must match
    /// byte-for-byte.
    pub async fn lookup(
        &self,
        subject: impl Into<Subject>,
        schema_type: SchemaType,
        schema: &str,
        references: &[SchemaReference],
        normalize: bool,
    ) -> RegistryResult<SubjectVersion> {
        let subject = subject.into();
        if !self.storage.subject_exists(&subject).await? {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }

        let fp_hex = SchemaFingerprint::compute(schema_type, schema, references).md5_hex();
        for v in self.storage.get_versions(&subject).await? {
            let Some(sv) = self
                .storage
                .get_subject_version(&subject, SchemaVersion::new(v))
                .await?
            else {
                continue;
            };
            let Some(stored) = self.storage.get_schema(sv.id).await? else {
                continue;
            };
            if stored.schema_type != schema_type {
                continue;
            }
            let matched = if normalize {
                stored.fingerprint.as_deref() == Some(fp_hex.as_str())
            } else {
                stored.schema == schema && stored.references == references
            };
            if matched {
                return Ok(sv);
            }
        }

        Err(RegistryError::SchemaNotFound(format!(
            "schema not registered under subject '{}'",
            subject
        )))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get schema by id
    pub async fn get_by_id(&self, id: SchemaId) -> RegistryResult<Schema> {
        if let Some(cached) = self.cache_by_id.get(&id.0) {
            return Ok(cached.clone());
        }

        let schema = self
            .storage
            .get_schema(id)
            .await?
            .ok_or_else(|| RegistryError::SchemaNotFound(format!("Schema ID {}", id)))?;

        self.cache_by_id.insert(id.0, schema.clone());
        Ok(schema)
    }

    /// Get the references of a schema, exactly as submitted and in order
    pub async fn get_references(&self, id: SchemaId) -> RegistryResult<Vec<SchemaReference>> {
        let schema = self.get_by_id(id).await?;
        Ok(schema.references)
    }

    /// Get schema by subject and version
    pub async fn get_by_version(
        &self,
        subject: impl Into<Subject>,
        version: SchemaVersion,
    ) -> RegistryResult<SubjectVersion> {
        let subject = subject.into();
        if !self.storage.subject_exists(&subject).await? {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }
        self.storage
            .get_subject_version(&subject, version)
            .await?
            .ok_or_else(|| RegistryError::VersionNotFound {
                subject: subject.to_string(),
                version: version.0,
            })
    }

    /// Get latest version of a subject
    pub async fn get_latest(&self, subject: impl Into<Subject>) -> RegistryResult<SubjectVersion> {
        let subject = subject.into();
        self.storage
            .get_latest_version(&subject)
            .await?
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_string()))
    }

    /// List all versions for a subject, in registration order
    pub async fn list_versions(&self, subject: impl Into<Subject>) -> RegistryResult<Vec<u32>> {
        let subject = subject.into();
        if !self.storage.subject_exists(&subject).await? {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }
        self.storage.get_versions(&subject).await
    }

    /// List all subjects, in first-registration order
    pub async fn list_subjects(&self) -> RegistryResult<Vec<Subject>> {
        self.storage.list_subjects().await
    }

    /// Get all schema ids that declare a reference to the given
    /// subject/version
    pub async fn get_schemas_referencing(
        &self,
        subject: impl Into<Subject>,
        version: SchemaVersion,
    ) -> RegistryResult<Vec<SchemaId>> {
        let subject = subject.into();
        let mut referencing = Vec::new();

        for subj in self.storage.list_subjects().await? {
            for v in self.storage.get_versions(&subj).await? {
                let Some(sv) = self
                    .storage
                    .get_subject_version(&subj, SchemaVersion::new(v))
                    .await?
                else {
                    continue;
                };
                let Ok(schema) = self.get_by_id(sv.id).await else {
                    continue;
                };
                let hit = schema
                    .references
                    .iter()
                    .any(|r| r.subject == subject.as_str() && r.version == version.0);
                if hit && !referencing.contains(&sv.id) {
                    referencing.push(sv.id);
                }
            }
        }

        Ok(referencing)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete a subject (soft delete unless `permanent`); returns the
    /// deleted version numbers. Schema ids stay allocated.
    pub async fn delete_subject(
        &self,
        subject: impl Into<Subject>,
        permanent: bool,
    ) -> RegistryResult<Vec<u32>> {
        let subject = subject.into();
        if !self.storage.subject_exists(&subject).await? {
            return Err(RegistryError::SubjectNotFound(subject.to_string()));
        }
        let deleted = self.storage.delete_subject(&subject, permanent).await?;
        info!(subject = %subject, permanent, versions = deleted.len(), "deleted subject");
        Ok(deleted)
    }

    /// Delete a specific version
    pub async fn delete_version(
        &self,
        subject: impl Into<Subject>,
        version: SchemaVersion,
        permanent: bool,
    ) -> RegistryResult<()> {
        let subject = subject.into();
        // Ensure the version exists so callers get a 404-class error
        self.get_by_version(subject.clone(), version).await?;
        self.storage
            .delete_version(&subject, version, permanent)
            .await
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryResult<RegistryStats> {
        let subjects = self.storage.list_subjects().await?;
        let mut version_count = 0;
        for s in &subjects {
            version_count += self.storage.get_versions(s).await?.len();
        }
        Ok(RegistryStats {
            subject_count: subjects.len(),
            version_count,
            cached_schemas: self.cache_by_id.len(),
        })
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    async fn find_version_by_fingerprint(
        &self,
        subject: &Subject,
        fp_hex: &str,
    ) -> RegistryResult<Option<SubjectVersion>> {
        for v in self.storage.get_versions(subject).await? {
            let Some(sv) = self
                .storage
                .get_subject_version(subject, SchemaVersion::new(v))
                .await?
            else {
                continue;
            };
            let Some(stored) = self.storage.get_schema(sv.id).await? else {
                continue;
            };
            if stored.fingerprint.as_deref() == Some(fp_hex) {
                return Ok(Some(sv));
            }
        }
        Ok(None)
    }
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub subject_count: usize,
    pub version_count: usize,
    pub cached_schemas: usize,
}

/// Validate schema content for its declared type.
///
/// Avro and JSON Schema content must at least parse as JSON; protobuf goes
/// through the statement-level surface check. Full grammar validation is the
/// job of the schema-type parser at the serialization layer.
fn validate_content(schema_type: SchemaType, schema: &str) -> RegistryResult<()> {
    match schema_type {
        SchemaType::Avro | SchemaType::Json => {
            serde_json::from_str::<serde_json::Value>(schema).map_err(|e| {
                RegistryError::InvalidSchema(format!("invalid {} schema: {}", schema_type, e))
            })?;
            Ok(())
        }
        SchemaType::Protobuf => proto::validate(schema).map_err(RegistryError::InvalidSchema),
    }
}

/// Every protobuf `import` must be covered by a declared reference, except
/// the well-known types. An import with no matching reference would leave a
/// dangling dependency the registry cannot pin to a version.
fn check_declared_imports(
    schema_type: SchemaType,
    schema: &str,
    references: &[SchemaReference],
) -> RegistryResult<()> {
    if schema_type != SchemaType::Protobuf {
        return Ok(());
    }
    let declared: HashSet<&str> = references.iter().map(|r| r.name.as_str()).collect();
    for import in proto::imports(schema) {
        if proto::is_well_known(&import) {
            continue;
        }
        if !declared.contains(import.as_str()) {
            return Err(RegistryError::InvalidSchema(format!(
                "import \"{}\" has no matching reference",
                import
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto_schema(marker: u32) -> String {
        format!(
            "syntax = \"proto3\";\npackage telemetry.v1;\n\n\
             message Reading{} {{\n  string sensor_id = 1;\n  bool active = 2;\n}}\n",
            marker
        )
    }

    async fn registry() -> SchemaRegistry {
        SchemaRegistry::new(RegistryConfig::memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_get_by_id() {
        let registry = registry().await;
        let schema = proto_schema(1);

        let id = registry
            .register("readings-value", SchemaType::Protobuf, &schema)
            .await
            .unwrap();
        assert_eq!(id.as_u32(), 1);

        let retrieved = registry.get_by_id(id).await.unwrap();
        assert_eq!(retrieved.schema_type, SchemaType::Protobuf);
        assert_eq!(retrieved.schema, schema);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let registry = registry().await;
        let schema = proto_schema(1);

        let id1 = registry
            .register("readings-value", SchemaType::Protobuf, &schema)
            .await
            .unwrap();
        let id2 = registry
            .register("readings-value", SchemaType::Protobuf, &schema)
            .await
            .unwrap();

        assert_eq!(id1, id2);
        let versions = registry.list_versions("readings-value").await.unwrap();
        assert_eq!(versions, vec![1]);
    }

    #[tokio::test]
    async fn test_reregistration_matches_any_version_not_just_latest() {
        let registry = registry().await;
        let first = proto_schema(1);
        let second = proto_schema(2);

        let id1 = registry
            .register("readings-value", SchemaType::Protobuf, &first)
            .await
            .unwrap();
        registry
            .register("readings-value", SchemaType::Protobuf, &second)
            .await
            .unwrap();

        // First schema is no longer the latest version but still matches
        let id_again = registry
            .register("readings-value", SchemaType::Protobuf, &first)
            .await
            .unwrap();
        assert_eq!(id_again, id1);
        assert_eq!(
            registry.list_versions("readings-value").await.unwrap(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_cross_subject_id_aliasing() {
        let registry = registry().await;
        let schema = proto_schema(1);

        let id1 = registry
            .register("subject-a", SchemaType::Protobuf, &schema)
            .await
            .unwrap();
        let id2 = registry
            .register("subject-b", SchemaType::Protobuf, &schema)
            .await
            .unwrap();

        // Content-addressed: one id, two subjects, each at version 1
        assert_eq!(id1, id2);
        assert_eq!(registry.list_versions("subject-a").await.unwrap(), vec![1]);
        assert_eq!(registry.list_versions("subject-b").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_invalid_protobuf_rejected() {
        let registry = registry().await;
        let bad = "syntax = \"proto3\";\n\nbad-message Reading {\n  string id = 1;\n}\n";

        let err = registry
            .register("readings-value", SchemaType::Protobuf, bad)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), crate::error::error_codes::INVALID_SCHEMA);

        // Nothing was written
        assert!(registry.list_subjects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_avro_rejected() {
        let registry = registry().await;
        let err = registry
            .register("readings-value", SchemaType::Avro, "not valid json")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), crate::error::error_codes::INVALID_SCHEMA);
    }

    #[tokio::test]
    async fn test_undeclared_import_rejected() {
        let registry = registry().await;
        let schema = "syntax = \"proto3\";\n\nimport \"common/units.proto\";\n\n\
                      message Reading {\n  string id = 1;\n}\n";

        let err = registry
            .register("readings-value", SchemaType::Protobuf, schema)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), crate::error::error_codes::INVALID_SCHEMA);
        assert!(err.to_string().contains("common/units.proto"));
    }

    #[tokio::test]
    async fn test_well_known_import_needs_no_reference() {
        let registry = registry().await;
        let schema = "syntax = \"proto3\";\n\n\
                      import \"google/protobuf/timestamp.proto\";\n\n\
                      message Reading {\n  string id = 1;\n}\n";

        let id = registry
            .register("readings-value", SchemaType::Protobuf, schema)
            .await
            .unwrap();
        assert_eq!(id.as_u32(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_reference_rejected_without_side_effects() {
        let registry = registry().await;
        let schema = proto_schema(1);

        let refs = vec![SchemaReference::new("bad", "bad", 100)];
        let err = registry
            .register_with_references("readings-value", SchemaType::Protobuf, &schema, refs)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), crate::error::error_codes::INVALID_SCHEMA);
        assert!(registry.list_subjects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_finds_without_creating() {
        let registry = registry().await;
        let schema = proto_schema(1);

        let id = registry
            .register("readings-value", SchemaType::Protobuf, &schema)
            .await
            .unwrap();

        let found = registry
            .lookup("readings-value", SchemaType::Protobuf, &schema, &[], false)
            .await
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.version.as_u32(), 1);

        // Trim-level match needs normalize
        let padded = format!("\n{}\n\n", schema);
        let err = registry
            .lookup("readings-value", SchemaType::Protobuf, &padded, &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SchemaNotFound(_)));
        let found = registry
            .lookup("readings-value", SchemaType::Protobuf, &padded, &[], true)
            .await
            .unwrap();
        assert_eq!(found.id, id);

        // Lookup never appends
        assert_eq!(
            registry.list_versions("readings-value").await.unwrap(),
            vec![1]
        );
    }

    #[tokio::test]
    async fn test_lookup_unknown_subject() {
        let registry = registry().await;
        let err = registry
            .lookup("missing", SchemaType::Protobuf, &proto_schema(1), &[], true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SubjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_versions_unknown_subject() {
        let registry = registry().await;
        let err = registry.list_versions("missing").await.unwrap_err();
        assert!(matches!(err, RegistryError::SubjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_by_version_errors() {
        let registry = registry().await;
        registry
            .register("readings-value", SchemaType::Protobuf, &proto_schema(1))
            .await
            .unwrap();

        let err = registry
            .get_by_version("missing", SchemaVersion::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SubjectNotFound(_)));

        let err = registry
            .get_by_version("readings-value", SchemaVersion::new(9))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_version_then_register_continues_numbering() {
        let registry = registry().await;
        registry
            .register("readings-value", SchemaType::Protobuf, &proto_schema(1))
            .await
            .unwrap();
        registry
            .register("readings-value", SchemaType::Protobuf, &proto_schema(2))
            .await
            .unwrap();

        registry
            .delete_version("readings-value", SchemaVersion::new(2), false)
            .await
            .unwrap();
        assert_eq!(
            registry.list_versions("readings-value").await.unwrap(),
            vec![1]
        );

        registry
            .register("readings-value", SchemaType::Protobuf, &proto_schema(3))
            .await
            .unwrap();
        assert_eq!(
            registry.list_versions("readings-value").await.unwrap(),
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = registry().await;
        registry
            .register("subject-a", SchemaType::Protobuf, &proto_schema(1))
            .await
            .unwrap();
        registry
            .register("subject-a", SchemaType::Protobuf, &proto_schema(2))
            .await
            .unwrap();
        registry
            .register("subject-b", SchemaType::Protobuf, &proto_schema(3))
            .await
            .unwrap();

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.subject_count, 2);
        assert_eq!(stats.version_count, 3);
    }
}
