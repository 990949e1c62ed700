//! Schema fingerprinting for deduplication
//!
//! A fingerprint covers the schema type, the content with insignificant
//! surrounding whitespace trimmed, and the ordered reference list. Two
//! registrations are the same schema exactly when their fingerprints match,
//! regardless of which subject they were submitted under.

use crate::types::{SchemaReference, SchemaType};
use sha2::{Digest, Sha256};

/// Schema fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint {
    /// MD5 hash (16 bytes) - compact identifier used as the dedup key
    pub md5: [u8; 16],
    /// SHA-256 hash (32 bytes)
    pub sha256: [u8; 32],
}

impl SchemaFingerprint {
    /// Compute the fingerprint of a schema plus its reference list
    pub fn compute(schema_type: SchemaType, content: &str, references: &[SchemaReference]) -> Self {
        let canonical = canonical_form(schema_type, content, references);

        let md5_hash = md5::compute(canonical.as_bytes());
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&md5_hash.0);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let sha256_result = hasher.finalize();
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&sha256_result);

        Self { md5, sha256 }
    }

    /// Get MD5 fingerprint as hex string
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    /// Get SHA-256 fingerprint as hex string
    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    /// Get MD5 fingerprint as base64 string
    pub fn md5_base64(&self) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, self.md5)
    }
}

/// Build the canonical form that gets hashed.
///
/// JSON-shaped formats (Avro, JSON Schema) are normalized by a parse and
/// re-serialize pass so formatting differences don't produce distinct
/// fingerprints; protobuf text is compared trim-level only. References are
/// appended in submitted order: the same content with reordered references
/// is a different schema.
fn canonical_form(schema_type: SchemaType, content: &str, references: &[SchemaReference]) -> String {
    let body = match schema_type {
        SchemaType::Avro | SchemaType::Json => normalize_json(content),
        SchemaType::Protobuf => content.trim().to_string(),
    };

    let mut canonical = String::with_capacity(body.len() + 64);
    canonical.push_str(schema_type.as_str());
    canonical.push('\n');
    canonical.push_str(&body);
    for r in references {
        canonical.push('\n');
        canonical.push_str(&r.name);
        canonical.push('|');
        canonical.push_str(&r.subject);
        canonical.push('|');
        canonical.push_str(&r.version.to_string());
    }
    canonical
}

fn normalize_json(json: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| json.trim().to_string()),
        Err(_) => json.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTO: &str = "syntax = \"proto3\";\n\nmessage Reading {\n  string id = 1;\n}\n";

    #[test]
    fn test_fingerprint_deterministic() {
        let fp = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &[]);
        let fp2 = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &[]);
        assert_eq!(fp.md5, fp2.md5);
        assert_eq!(fp.sha256, fp2.sha256);
    }

    #[test]
    fn test_fingerprint_trims_surrounding_whitespace() {
        let padded = format!("\n\n{}   \n", PROTO);
        let fp1 = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &[]);
        let fp2 = SchemaFingerprint::compute(SchemaType::Protobuf, &padded, &[]);
        assert_eq!(fp1.md5, fp2.md5);
    }

    #[test]
    fn test_fingerprint_json_normalization() {
        let schema1 = r#"{"type":"string"}"#;
        let schema2 = r#"{ "type" : "string" }"#;
        let fp1 = SchemaFingerprint::compute(SchemaType::Avro, schema1, &[]);
        let fp2 = SchemaFingerprint::compute(SchemaType::Avro, schema2, &[]);
        assert_eq!(fp1.md5, fp2.md5);
    }

    #[test]
    fn test_fingerprint_type_distinguishes() {
        let schema = r#"{"type":"string"}"#;
        let avro = SchemaFingerprint::compute(SchemaType::Avro, schema, &[]);
        let json = SchemaFingerprint::compute(SchemaType::Json, schema, &[]);
        assert_ne!(avro.md5, json.md5);
    }

    #[test]
    fn test_fingerprint_references_participate() {
        let no_refs = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &[]);
        let refs = vec![SchemaReference::new("a.proto", "a", 1)];
        let with_refs = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &refs);
        assert_ne!(no_refs.md5, with_refs.md5);

        // Reference order is part of the identity
        let ab = vec![
            SchemaReference::new("a.proto", "a", 1),
            SchemaReference::new("b.proto", "b", 1),
        ];
        let ba = vec![
            SchemaReference::new("b.proto", "b", 1),
            SchemaReference::new("a.proto", "a", 1),
        ];
        let fp_ab = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &ab);
        let fp_ba = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &ba);
        assert_ne!(fp_ab.md5, fp_ba.md5);
    }

    #[test]
    fn test_fingerprint_hex_lengths() {
        let fp = SchemaFingerprint::compute(SchemaType::Protobuf, PROTO, &[]);
        assert_eq!(fp.md5_hex().len(), 32);
        assert_eq!(fp.sha256_hex().len(), 64);
    }
}
