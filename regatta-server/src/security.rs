use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;

/// Credential check for the admin API.
///
/// Built from an optional JSON password file mapping logins to MD5 hex
/// digests of their passwords. Without a file every request is allowed.
#[derive(Debug, Clone, Default)]
pub struct Security {
    credentials: Option<Arc<HashMap<String, String>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("could not read password file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse password file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl Security {
    pub fn disabled() -> Security {
        Security { credentials: None }
    }

    pub fn from_password_file(path: &str) -> Result<Security, SecurityError> {
        let content = std::fs::read_to_string(path).map_err(|source| SecurityError::Read {
            path: path.to_string(),
            source,
        })?;
        let credentials: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|source| SecurityError::Parse {
                path: path.to_string(),
                source,
            })?;
        Ok(Security {
            credentials: Some(Arc::new(credentials)),
        })
    }

    /// Whether the Authorization header carries valid Basic credentials.
    pub fn allows(&self, authorization: Option<&str>) -> bool {
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => return true,
        };
        let encoded = match authorization.and_then(|header| header.strip_prefix("Basic ")) {
            Some(encoded) => encoded.trim(),
            None => return false,
        };
        let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(decoded) => decoded,
            Err(_) => return false,
        };
        let decoded = match String::from_utf8(decoded) {
            Ok(decoded) => decoded,
            Err(_) => return false,
        };
        let (login, password) = match decoded.split_once(':') {
            Some(pair) => pair,
            None => return false,
        };
        credentials.get(login).map(String::as_str) == Some(md5_hex(password).as_str())
    }
}

pub fn md5_hex(input: &str) -> String {
    use md5::{Digest, Md5};
    Md5::digest(input.as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
