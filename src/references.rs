//! Schema reference resolution
//!
//! Every reference a schema declares must point at an already-registered
//! (subject, version) pair. The resolver validates the declared list and
//! walks the transitive closure of the referenced schemas' own references.
//! Absence is always an error, never "no dependency". Cycles in the stored
//! graph are rejected; the append-only store should make them
//! unconstructible, so hitting one means the store is corrupt.

use crate::error::{RegistryError, RegistryResult};
use crate::storage::Storage;
use crate::types::{SchemaId, SchemaReference, SchemaVersion, Subject};
use std::collections::HashSet;
use tracing::debug;

/// A reference paired with the schema id it resolved to
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    pub reference: SchemaReference,
    pub schema_id: SchemaId,
}

/// Resolves declared references against the store
pub struct ReferenceResolver<'a> {
    storage: &'a Storage,
}

enum Frame {
    Enter(SchemaReference),
    Exit,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Resolve the declared references and their transitive closure.
    ///
    /// The returned list starts with the declared references in submitted
    /// order, with each reference's own dependencies following it
    /// depth-first. A (subject, version) pair appears at most once.
    pub async fn resolve(
        &self,
        references: &[SchemaReference],
    ) -> RegistryResult<Vec<ResolvedReference>> {
        let mut resolved = Vec::new();
        let mut done: HashSet<(String, u32)> = HashSet::new();

        for root in references {
            // Iterative DFS; `path` is the on-stack chain used for cycle
            // detection, `done` the fully-explored set.
            let mut path: Vec<(String, u32)> = Vec::new();
            let mut work = vec![Frame::Enter(root.clone())];

            while let Some(frame) = work.pop() {
                match frame {
                    Frame::Enter(r) => {
                        let key = (r.subject.clone(), r.version);
                        if done.contains(&key) {
                            continue;
                        }
                        if path.contains(&key) {
                            let mut chain: Vec<String> = path
                                .iter()
                                .map(|(s, v)| format!("{}:{}", s, v))
                                .collect();
                            chain.push(format!("{}:{}", r.subject, r.version));
                            return Err(RegistryError::CyclicReference(chain.join(" -> ")));
                        }

                        let sv = self
                            .storage
                            .get_subject_version(
                                &Subject::new(&r.subject),
                                SchemaVersion::new(r.version),
                            )
                            .await?
                            .ok_or_else(|| RegistryError::ReferenceNotFound {
                                name: r.name.clone(),
                                subject: r.subject.clone(),
                                version: r.version,
                            })?;

                        debug!(
                            "resolved reference '{}' -> {}:{} (id {})",
                            r.name, r.subject, r.version, sv.id
                        );
                        resolved.push(ResolvedReference {
                            reference: r.clone(),
                            schema_id: sv.id,
                        });

                        path.push(key);
                        work.push(Frame::Exit);

                        let child_refs = match self.storage.get_schema(sv.id).await? {
                            Some(schema) => schema.references,
                            None => Vec::new(),
                        };
                        for child in child_refs.into_iter().rev() {
                            work.push(Frame::Enter(child));
                        }
                    }
                    Frame::Exit => {
                        if let Some(key) = path.pop() {
                            done.insert(key);
                        }
                    }
                }
            }
        }

        Ok(resolved)
    }
}
