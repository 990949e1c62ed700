//! # Schemaforge
//!
//! A content-addressed schema registry: subjects hold ordered version logs,
//! schema ids are global and deduplicated by content, and schemas may
//! reference each other by exact (subject, version).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Schemaforge                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  REST API (feature "server")                             │
//! │  ├── POST /subjects/{subject}/versions                   │
//! │  ├── POST /subjects/{subject}            (lookup)        │
//! │  ├── GET  /schemas/ids/{id}                              │
//! │  ├── GET  /subjects                                      │
//! │  └── GET  /subjects/{subject}/versions[/{version}]       │
//! ├──────────────────────────────────────────────────────────┤
//! │  SchemaRegistry                                          │
//! │  ├── content validation (per schema type)                │
//! │  ├── reference resolution (existence, closure, cycles)   │
//! │  ├── fingerprint dedup (in-subject and global)           │
//! │  └── id allocation + version append                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  StorageBackend                                          │
//! │  └── Memory (DashMap-based, development/testing)         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use schemaforge::{RegistryConfig, SchemaRegistry, SchemaType};
//!
//! let registry = SchemaRegistry::new(RegistryConfig::memory()).await?;
//!
//! let schema = "syntax = \"proto3\";\nmessage Reading { string id = 1; }\n";
//! let id = registry.register("readings-value", SchemaType::Protobuf, schema).await?;
//!
//! let stored = registry.get_by_id(id).await?;
//! assert_eq!(stored.schema.trim(), schema.trim());
//! ```
//!
//! ## Invariants
//!
//! - Version numbers within a subject start at 1, increase monotonically and
//!   are never reused, even after deletion.
//! - One schema id per distinct (type, trimmed content, ordered references);
//!   the same id may appear in many subjects.
//! - Every reference must resolve to an already-registered (subject,
//!   version) at registration time - no forward or circular references.
//! - Registration is idempotent on identical content, so retries are safe.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod proto;
pub mod references;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use config::{RegistryConfig, StorageConfig};
pub use error::{error_codes, RegistryError, RegistryResult};
pub use fingerprint::SchemaFingerprint;
pub use references::{ReferenceResolver, ResolvedReference};
pub use registry::{RegistryStats, SchemaRegistry};
#[cfg(feature = "server")]
pub use server::{SchemaServer, ServerConfig};
pub use storage::{MemoryStorage, Storage, StorageBackend};
pub use types::{
    Schema, SchemaId, SchemaReference, SchemaType, SchemaVersion, Subject, SubjectVersion,
};
