//! Core types for the registry
//!
//! - [`SchemaId`], [`Subject`], [`SchemaVersion`] - Core identifiers
//! - [`Schema`], [`SchemaReference`], [`SubjectVersion`] - Schema data structures
//! - [`SchemaType`] - Supported schema formats

use serde::{Deserialize, Serialize};

/// Schema type (format) accepted by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    /// Apache Avro
    #[default]
    #[serde(alias = "avro", alias = "AVRO")]
    Avro,

    /// JSON Schema
    #[serde(alias = "json", alias = "JSON")]
    Json,

    /// Protocol Buffers
    #[serde(alias = "protobuf", alias = "PROTOBUF")]
    Protobuf,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Json => "JSON",
            SchemaType::Protobuf => "PROTOBUF",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchemaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVRO" => Ok(SchemaType::Avro),
            "JSON" | "JSONSCHEMA" | "JSON_SCHEMA" => Ok(SchemaType::Json),
            "PROTOBUF" | "PROTO" => Ok(SchemaType::Protobuf),
            _ => Err(format!("Unknown schema type: {}", s)),
        }
    }
}

/// Unique identifier for a schema (global across all subjects)
///
/// Ids are content-addressed: the same schema content registered under any
/// number of subjects carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaId(pub u32);

impl SchemaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Subject: a named, independently versioned stream of schema evolutions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject(pub String);

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create a key subject for a topic
    pub fn key(topic: &str) -> Self {
        Self(format!("{}-key", topic))
    }

    /// Create a value subject for a topic
    pub fn value(topic: &str) -> Self {
        Self(format!("{}-value", topic))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Version number within a subject (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self(version)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaVersion {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Reference to another registered schema
///
/// `name` is the import path as it appears inside the referencing schema
/// (e.g. the path of a protobuf `import` statement); `subject`/`version`
/// pin the exact registered schema it resolves to. The reference list of a
/// schema is ordered, and the order is part of the schema's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Reference name (import path used in the schema)
    pub name: String,
    /// Subject containing the referenced schema
    pub subject: String,
    /// Version of the referenced schema
    pub version: u32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }
}

/// A registered schema. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema ID (global)
    pub id: SchemaId,
    /// Schema type/format
    pub schema_type: SchemaType,
    /// The schema definition, stored verbatim as submitted
    pub schema: String,
    /// MD5 fingerprint over the canonical form (type + trimmed content + references)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Schema references, in submitted order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl Schema {
    pub fn new(id: SchemaId, schema_type: SchemaType, schema: String) -> Self {
        Self {
            id,
            schema_type,
            schema,
            fingerprint: None,
            references: Vec::new(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_references(mut self, references: Vec<SchemaReference>) -> Self {
        self.references = references;
        self
    }
}

/// A subject version combines subject, version, schema id and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectVersion {
    /// Subject name
    pub subject: Subject,
    /// Version number
    pub version: SchemaVersion,
    /// Schema ID
    pub id: SchemaId,
    /// Schema type
    pub schema_type: SchemaType,
    /// The schema definition
    pub schema: String,
}

impl SubjectVersion {
    pub fn new(
        subject: Subject,
        version: SchemaVersion,
        id: SchemaId,
        schema_type: SchemaType,
        schema: String,
    ) -> Self {
        Self {
            subject,
            version,
            id,
            schema_type,
            schema,
        }
    }
}
