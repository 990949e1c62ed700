//! In-memory storage backend

use super::StorageBackend;
use crate::error::{RegistryError, RegistryResult};
use crate::types::{Schema, SchemaId, SchemaType, SchemaVersion, Subject, SubjectVersion};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory storage backend
pub struct MemoryStorage {
    /// Schema ID counter
    next_id: AtomicU32,
    /// Schemas by ID
    schemas: DashMap<u32, Schema>,
    /// Fingerprint -> ID binding (the global schema table)
    fingerprints: DashMap<String, u32>,
    /// Subject -> version log
    subjects: DashMap<String, SubjectState>,
    /// Subjects in first-registration order
    subject_order: RwLock<Vec<String>>,
}

/// Per-subject version log.
///
/// `next_version` outlives deletes so version numbers are never reused.
struct SubjectState {
    next_version: u32,
    versions: Vec<VersionEntry>,
}

impl Default for SubjectState {
    fn default() -> Self {
        Self {
            next_version: 1,
            versions: Vec::new(),
        }
    }
}

#[derive(Clone)]
struct VersionEntry {
    version: u32,
    schema_id: u32,
    schema_type: SchemaType,
    deleted: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            schemas: DashMap::new(),
            fingerprints: DashMap::new(),
            subjects: DashMap::new(),
            subject_order: RwLock::new(Vec::new()),
        }
    }

    fn next_raw_id(&self) -> RegistryResult<u32> {
        // fetch_update with checked_add detects overflow at u32::MAX instead
        // of wrapping to 0 and handing out duplicate ids.
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .map_err(|_| {
                RegistryError::Internal("schema id space exhausted (u32::MAX reached)".into())
            })
    }

    fn build_subject_version(
        &self,
        subject: &Subject,
        entry: &VersionEntry,
    ) -> RegistryResult<SubjectVersion> {
        let schema = self
            .schemas
            .get(&entry.schema_id)
            .map(|s| s.clone())
            .ok_or_else(|| {
                RegistryError::Storage(format!(
                    "version {} of subject {} points at missing schema id {}",
                    entry.version, subject, entry.schema_id
                ))
            })?;
        Ok(SubjectVersion {
            subject: subject.clone(),
            version: SchemaVersion::new(entry.version),
            id: SchemaId::new(entry.schema_id),
            schema_type: entry.schema_type,
            schema: schema.schema,
        })
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn allocate_schema_id(&self, fingerprint: &str) -> RegistryResult<(SchemaId, bool)> {
        // The entry lock makes the read-then-write atomic per fingerprint:
        // concurrent allocation of the same fingerprint converges on one id.
        match self.fingerprints.entry(fingerprint.to_string()) {
            Entry::Occupied(e) => Ok((SchemaId::new(*e.get()), false)),
            Entry::Vacant(v) => {
                let id = self.next_raw_id()?;
                v.insert(id);
                Ok((SchemaId::new(id), true))
            }
        }
    }

    async fn store_schema(&self, schema: Schema) -> RegistryResult<SchemaId> {
        let id = schema.id.0;
        if let Some(ref fp) = schema.fingerprint {
            self.fingerprints.entry(fp.clone()).or_insert(id);
        }
        self.schemas.insert(id, schema);
        Ok(SchemaId::new(id))
    }

    async fn get_schema(&self, id: SchemaId) -> RegistryResult<Option<Schema>> {
        Ok(self.schemas.get(&id.0).map(|s| s.clone()))
    }

    async fn get_schema_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> RegistryResult<Option<Schema>> {
        let id = self.fingerprints.get(fingerprint).map(|id| *id);
        match id {
            Some(id) => self.get_schema(SchemaId::new(id)).await,
            None => Ok(None),
        }
    }

    async fn append_version(
        &self,
        subject: &Subject,
        schema_id: SchemaId,
    ) -> RegistryResult<SchemaVersion> {
        let schema_type = self
            .schemas
            .get(&schema_id.0)
            .map(|s| s.schema_type)
            .ok_or_else(|| RegistryError::SchemaNotFound(format!("Schema ID {}", schema_id)))?;

        // The entry guard serializes appends per subject; drop it before
        // touching subject_order to keep lock acquisition one-directional.
        let version = {
            let mut state = self.subjects.entry(subject.0.clone()).or_default();
            let version = state.next_version;
            state.versions.push(VersionEntry {
                version,
                schema_id: schema_id.0,
                schema_type,
                deleted: false,
            });
            state.next_version += 1;
            version
        };

        let mut order = self.subject_order.write();
        if !order.iter().any(|s| s == subject.as_str()) {
            order.push(subject.0.clone());
        }

        Ok(SchemaVersion::new(version))
    }

    async fn get_versions(&self, subject: &Subject) -> RegistryResult<Vec<u32>> {
        match self.subjects.get(&subject.0) {
            Some(state) => Ok(state
                .versions
                .iter()
                .filter(|v| !v.deleted)
                .map(|v| v.version)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn get_subject_version(
        &self,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<Option<SubjectVersion>> {
        let entry = self.subjects.get(&subject.0).and_then(|state| {
            state
                .versions
                .iter()
                .find(|v| v.version == version.0 && !v.deleted)
                .cloned()
        });
        match entry {
            Some(entry) => Ok(Some(self.build_subject_version(subject, &entry)?)),
            None => Ok(None),
        }
    }

    async fn get_latest_version(
        &self,
        subject: &Subject,
    ) -> RegistryResult<Option<SubjectVersion>> {
        let entry = self
            .subjects
            .get(&subject.0)
            .and_then(|state| state.versions.iter().rev().find(|v| !v.deleted).cloned());
        match entry {
            Some(entry) => Ok(Some(self.build_subject_version(subject, &entry)?)),
            None => Ok(None),
        }
    }

    async fn list_subjects(&self) -> RegistryResult<Vec<Subject>> {
        let order = self.subject_order.read().clone();
        let mut live = Vec::with_capacity(order.len());
        for name in order {
            let has_live = self
                .subjects
                .get(&name)
                .map(|state| state.versions.iter().any(|v| !v.deleted))
                .unwrap_or(false);
            if has_live {
                live.push(Subject::new(name));
            }
        }
        Ok(live)
    }

    async fn subject_exists(&self, subject: &Subject) -> RegistryResult<bool> {
        Ok(self
            .subjects
            .get(&subject.0)
            .map(|state| state.versions.iter().any(|v| !v.deleted))
            .unwrap_or(false))
    }

    async fn delete_subject(
        &self,
        subject: &Subject,
        permanent: bool,
    ) -> RegistryResult<Vec<u32>> {
        match self.subjects.get_mut(&subject.0) {
            Some(mut state) => {
                let deleted: Vec<u32> = state
                    .versions
                    .iter()
                    .filter(|v| !v.deleted)
                    .map(|v| v.version)
                    .collect();
                if permanent {
                    // Drop the entries but keep next_version: numbers are
                    // never reused, even if the subject comes back.
                    state.versions.clear();
                } else {
                    for v in state.versions.iter_mut() {
                        v.deleted = true;
                    }
                }
                Ok(deleted)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn delete_version(
        &self,
        subject: &Subject,
        version: SchemaVersion,
        permanent: bool,
    ) -> RegistryResult<()> {
        if let Some(mut state) = self.subjects.get_mut(&subject.0) {
            if permanent {
                state.versions.retain(|v| v.version != version.0);
            } else if let Some(v) = state
                .versions
                .iter_mut()
                .find(|v| v.version == version.0 && !v.deleted)
            {
                v.deleted = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTO: &str = "syntax = \"proto3\";\nmessage Reading { string id = 1; }\n";

    async fn store_new(storage: &MemoryStorage, fingerprint: &str) -> SchemaId {
        let (id, fresh) = storage.allocate_schema_id(fingerprint).await.unwrap();
        assert!(fresh);
        let schema = Schema::new(id, SchemaType::Protobuf, PROTO.to_string())
            .with_fingerprint(fingerprint.to_string());
        storage.store_schema(schema).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_allocate_reuses_id_for_same_fingerprint() {
        let storage = MemoryStorage::new();

        let (id1, fresh1) = storage.allocate_schema_id("fp-a").await.unwrap();
        let (id2, fresh2) = storage.allocate_schema_id("fp-a").await.unwrap();
        let (id3, fresh3) = storage.allocate_schema_id("fp-b").await.unwrap();

        assert!(fresh1);
        assert!(!fresh2);
        assert!(fresh3);
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1.as_u32(), 1);
        assert_eq!(id3.as_u32(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_allocation_converges() {
        let storage = std::sync::Arc::new(MemoryStorage::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let storage = storage.clone();
            // Half the tasks race on one fingerprint, half get distinct ones
            let fp = if i % 2 == 0 {
                "shared".to_string()
            } else {
                format!("distinct-{}", i)
            };
            handles.push(tokio::spawn(async move {
                storage.allocate_schema_id(&fp).await.unwrap().0
            }));
        }

        let mut shared_ids = Vec::new();
        let mut all_ids = Vec::new();
        for (i, h) in handles.into_iter().enumerate() {
            let id = h.await.unwrap();
            if i % 2 == 0 {
                shared_ids.push(id);
            }
            all_ids.push(id.as_u32());
        }

        // Same fingerprint -> one id
        assert!(shared_ids.windows(2).all(|w| w[0] == w[1]));
        // Distinct fingerprints -> distinct ids
        all_ids.sort_unstable();
        all_ids.dedup();
        assert_eq!(all_ids.len(), 9); // 1 shared + 8 distinct
    }

    #[tokio::test]
    async fn test_version_numbers_contiguous() {
        let storage = MemoryStorage::new();
        let subject = Subject::new("readings-value");

        for expected in 1..=3u32 {
            let id = store_new(&storage, &format!("fp-{}", expected)).await;
            let v = storage.append_version(&subject, id).await.unwrap();
            assert_eq!(v.as_u32(), expected);
        }

        assert_eq!(
            storage.get_versions(&subject).await.unwrap(),
            vec![1, 2, 3]
        );
        let latest = storage.get_latest_version(&subject).await.unwrap().unwrap();
        assert_eq!(latest.version.as_u32(), 3);
    }

    #[tokio::test]
    async fn test_append_requires_stored_schema() {
        let storage = MemoryStorage::new();
        let subject = Subject::new("readings-value");
        let result = storage.append_version(&subject, SchemaId::new(7)).await;
        assert!(matches!(result, Err(RegistryError::SchemaNotFound(_))));
        // Failed append leaves no trace
        assert!(storage.list_subjects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subject_order_is_first_registration_order() {
        let storage = MemoryStorage::new();

        let id = store_new(&storage, "fp-1").await;
        storage
            .append_version(&Subject::new("zeta"), id)
            .await
            .unwrap();
        storage
            .append_version(&Subject::new("alpha"), id)
            .await
            .unwrap();
        storage
            .append_version(&Subject::new("zeta"), id)
            .await
            .unwrap();

        let subjects = storage.list_subjects().await.unwrap();
        let names: Vec<&str> = subjects.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_version_numbers_survive_deletes() {
        let storage = MemoryStorage::new();
        let subject = Subject::new("readings-value");

        let id1 = store_new(&storage, "fp-1").await;
        let id2 = store_new(&storage, "fp-2").await;
        storage.append_version(&subject, id1).await.unwrap();
        storage.append_version(&subject, id2).await.unwrap();

        storage
            .delete_version(&subject, SchemaVersion::new(2), false)
            .await
            .unwrap();
        assert_eq!(storage.get_versions(&subject).await.unwrap(), vec![1]);

        // Next append continues at 3; version 2 is never handed out again
        let id3 = store_new(&storage, "fp-3").await;
        let v = storage.append_version(&subject, id3).await.unwrap();
        assert_eq!(v.as_u32(), 3);
    }

    #[tokio::test]
    async fn test_delete_subject_soft_and_permanent() {
        let storage = MemoryStorage::new();
        let subject = Subject::new("readings-value");

        let id = store_new(&storage, "fp-1").await;
        storage.append_version(&subject, id).await.unwrap();

        let deleted = storage.delete_subject(&subject, false).await.unwrap();
        assert_eq!(deleted, vec![1]);
        assert!(storage.list_subjects().await.unwrap().is_empty());
        assert!(!storage.subject_exists(&subject).await.unwrap());

        // Re-populating continues the version numbering
        let id2 = store_new(&storage, "fp-2").await;
        let v = storage.append_version(&subject, id2).await.unwrap();
        assert_eq!(v.as_u32(), 2);

        let deleted = storage.delete_subject(&subject, true).await.unwrap();
        assert_eq!(deleted, vec![2]);
        assert!(storage.list_subjects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_schema_by_fingerprint() {
        let storage = MemoryStorage::new();
        let id = store_new(&storage, "fp-1").await;

        let found = storage.get_schema_by_fingerprint("fp-1").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(id));
        assert!(storage
            .get_schema_by_fingerprint("fp-unknown")
            .await
            .unwrap()
            .is_none());
    }
}
