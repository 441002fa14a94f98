//! Shared configuration model for the regatta server and its clients.
//!
//! The configuration is a single document of pipeline groups, templates,
//! environments, package repositories, config repos and users. Entities keep
//! their validation errors embedded, so an invalid entity can be returned to
//! the caller with the offending fields annotated.

pub mod config_repo;
pub mod document;
pub mod environment;
pub mod errors;
pub mod job;
pub mod material;
pub mod name;
pub mod params;
pub mod package;
pub mod pipeline;
pub mod stage;
pub mod task;
pub mod template;
pub mod user;
pub mod variables;

pub use document::{ConfigDocument, PipelineGroup};
pub use errors::ConfigErrors;
pub use name::CaseInsensitiveString;

/// Media type clients must send in `Accept` to reach the versioned API.
pub const MEDIA_TYPE: &str = "application/vnd.regatta.v1+json";

/// Body shape shared by API error and confirmation responses.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiMessage {
    pub message: String,
    /// Offending entity with embedded errors, present on validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> ApiMessage {
        ApiMessage {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: serde_json::Value) -> ApiMessage {
        ApiMessage {
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Hex MD5 of the canonical JSON serialization of a value.
///
/// Entity tags and stored revision checksums both use this digest. Field
/// order is fixed by the struct declarations and maps are ordered, so the
/// serialization is stable for equal values.
pub fn digest<T: serde::Serialize>(value: &T) -> String {
    use md5::{Digest, Md5};
    let serialized = serde_json::to_string(value).expect("config entities serialize to JSON");
    let mut hasher = Md5::new();
    hasher.update(serialized.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digest_is_stable_for_equal_values() {
        let first = digest(&vec!["a", "b"]);
        let second = digest(&vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn digest_changes_with_content() {
        assert_ne!(digest(&"one"), digest(&"two"));
    }

    #[test]
    fn digest_is_hex_md5() {
        let value = digest(&serde_json::json!({"name": "build"}));
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn message_without_data_omits_the_field() {
        let message = ApiMessage::new("done");
        let serialized = serde_json::to_string(&message).unwrap();
        assert_eq!(serialized, r#"{"message":"done"}"#);
    }
}
