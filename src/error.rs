//! Registry errors

use thiserror::Error;

/// Wire-level error codes surfaced to REST callers
pub mod error_codes {
    // Subject/schema not found
    pub const SUBJECT_NOT_FOUND: u32 = 40401;
    pub const VERSION_NOT_FOUND: u32 = 40402;
    pub const SCHEMA_NOT_FOUND: u32 = 40403;

    // Invalid schema: bad syntax, undeclared import, unresolved or cyclic reference
    pub const INVALID_SCHEMA: u32 = 42201;
    pub const INVALID_VERSION: u32 = 42202;

    // Reserved for compatibility-rule rejection
    pub const INCOMPATIBLE_SCHEMA: u32 = 409;

    // Internal errors
    pub const INTERNAL_ERROR: u32 = 50001;
    pub const STORAGE_ERROR: u32 = 50002;
}

/// Registry error types
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Version not found: {subject} version {version}")]
    VersionNotFound { subject: String, version: u32 },

    #[error("Schema reference not found: {name} references {subject} version {version}")]
    ReferenceNotFound {
        name: String,
        subject: String,
        version: u32,
    },

    #[error("Cyclic schema reference: {0}")]
    CyclicReference(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Schema parse error: {0}")]
    ParseError(String),

    /// Reserved for compatibility-rule rejection; the registry core never
    /// raises it.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Get the wire-level error code
    ///
    /// All registration-blocking schema problems (syntax, undeclared imports,
    /// unresolved or cyclic references) collapse into the single
    /// INVALID_SCHEMA class callers observe.
    pub fn error_code(&self) -> u32 {
        match self {
            RegistryError::SchemaNotFound(_) => error_codes::SCHEMA_NOT_FOUND,
            RegistryError::SubjectNotFound(_) => error_codes::SUBJECT_NOT_FOUND,
            RegistryError::VersionNotFound { .. } => error_codes::VERSION_NOT_FOUND,
            RegistryError::ReferenceNotFound { .. } => error_codes::INVALID_SCHEMA,
            RegistryError::CyclicReference(_) => error_codes::INVALID_SCHEMA,
            RegistryError::InvalidSchema(_) => error_codes::INVALID_SCHEMA,
            RegistryError::ParseError(_) => error_codes::INVALID_SCHEMA,
            RegistryError::Conflict(_) => error_codes::INCOMPATIBLE_SCHEMA,
            RegistryError::Storage(_) => error_codes::STORAGE_ERROR,
            RegistryError::Config(_) => error_codes::INTERNAL_ERROR,
            RegistryError::Serialization(_) => error_codes::INTERNAL_ERROR,
            RegistryError::Io(_) => error_codes::INTERNAL_ERROR,
            RegistryError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Get the HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            RegistryError::SchemaNotFound(_)
            | RegistryError::SubjectNotFound(_)
            | RegistryError::VersionNotFound { .. } => 404,
            RegistryError::ReferenceNotFound { .. }
            | RegistryError::CyclicReference(_)
            | RegistryError::InvalidSchema(_)
            | RegistryError::ParseError(_) => 422,
            RegistryError::Conflict(_) => 409,
            _ => 500,
        }
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}
