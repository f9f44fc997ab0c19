//! Fingerprints: SHA-256 of a descriptor's canonical JSON.
//!
//! The fingerprint is the cache key and the hash component of every artifact
//! filename, so equal descriptors share one build and any change in path,
//! operation order, operation name or argument value yields a new file.

use crate::descriptor::{Descriptor, DescriptorError};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest (64 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(descriptor: &Descriptor) -> Result<Self, DescriptorError> {
        Ok(Self::of_canonical(&descriptor.to_json()?))
    }

    /// Hash already-canonical descriptor text.
    pub fn of_canonical(json: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(json.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Operation;
    use serde_json::json;

    fn fp(d: &Descriptor) -> Fingerprint {
        Fingerprint::of(d).unwrap()
    }

    #[test]
    fn deterministic() {
        let a = Descriptor::new("photo.jpg").resize(Some(50), Some(50)).avif();
        let b = Descriptor::new("photo.jpg").resize(Some(50), Some(50)).avif();
        assert_eq!(fp(&a), fp(&b));
        assert_eq!(fp(&a).as_str().len(), 64);
    }

    #[test]
    fn same_from_reparsed_serialization() {
        let a = Descriptor::new("photo.jpg").resize(Some(50), None).jpeg(Some(70));
        let reparsed: Descriptor = serde_json::from_str(&a.to_json().unwrap()).unwrap();
        assert_eq!(fp(&a), fp(&reparsed));
    }

    #[test]
    fn argument_key_order_does_not_matter() {
        let a: Descriptor = serde_json::from_str(
            r#"{"inputPath":"a.jpg","operations":[{"name":"resize","args":[{"width":1,"height":2}]}]}"#,
        )
        .unwrap();
        let b: Descriptor = serde_json::from_str(
            r#"{"inputPath":"a.jpg","operations":[{"name":"resize","args":[{"height":2,"width":1}]}]}"#,
        )
        .unwrap();
        assert_eq!(fp(&a), fp(&b));
    }

    #[test]
    fn sensitive_to_operation_order() {
        let a = Descriptor::new("a.jpg").grayscale().rotate(90);
        let b = Descriptor::new("a.jpg").rotate(90).grayscale();
        assert_ne!(fp(&a), fp(&b));
    }

    #[test]
    fn sensitive_to_operation_name() {
        let a = Descriptor::new("a.jpg").webp();
        let b = Descriptor::new("a.jpg").avif();
        assert_ne!(fp(&a), fp(&b));
    }

    #[test]
    fn sensitive_to_single_argument() {
        let a = Descriptor::new("a.jpg").resize(Some(50), Some(50));
        let b = Descriptor::new("a.jpg").resize(Some(50), Some(51));
        assert_ne!(fp(&a), fp(&b));

        let c = Descriptor::new("a.jpg").with(Operation {
            name: "blur".into(),
            args: vec![json!(1.5)],
        });
        let d = Descriptor::new("a.jpg").with(Operation {
            name: "blur".into(),
            args: vec![json!(2)],
        });
        assert_ne!(fp(&c), fp(&d));
    }

    #[test]
    fn sensitive_to_input_path() {
        assert_ne!(fp(&Descriptor::new("a.jpg")), fp(&Descriptor::new("b.jpg")));
    }
}
