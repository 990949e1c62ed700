//! Registry configuration

use serde::{Deserialize, Serialize};

/// Configuration for the schema registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Check protobuf `import` statements against the declared reference list
    #[serde(default = "default_true")]
    pub verify_imports: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            verify_imports: true,
        }
    }
}

impl RegistryConfig {
    /// Create config with in-memory storage
    pub fn memory() -> Self {
        Self::default()
    }

    /// Enable or disable the protobuf import check
    pub fn with_verify_imports(mut self, verify: bool) -> Self {
        self.verify_imports = verify;
        self
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage
    #[default]
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert!(config.verify_imports);
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::memory().with_verify_imports(false);
        assert!(!config.verify_imports);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = RegistryConfig::memory();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.verify_imports);
    }
}
