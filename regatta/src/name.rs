use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier that keeps its original spelling but compares, orders and
/// hashes case-insensitively, the way entity names behave throughout the
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveString(String);

impl CaseInsensitiveString {
    pub fn new(value: impl Into<String>) -> CaseInsensitiveString {
        CaseInsensitiveString(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for CaseInsensitiveString {}

impl PartialOrd for CaseInsensitiveString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaseInsensitiveString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(&other.folded())
    }
}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state)
    }
}

impl fmt::Display for CaseInsensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseInsensitiveString {
    fn from(value: &str) -> CaseInsensitiveString {
        CaseInsensitiveString(value.to_string())
    }
}

impl From<String> for CaseInsensitiveString {
    fn from(value: String) -> CaseInsensitiveString {
        CaseInsensitiveString(value)
    }
}

impl serde::Serialize for CaseInsensitiveString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for CaseInsensitiveString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(CaseInsensitiveString)
    }
}

/// Name rule shared by pipelines, stages, jobs, templates, environments,
/// materials and params: alphanumeric plus underscores, hyphens and periods,
/// not starting with a period, at most 255 characters.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > 255 {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' || first == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

pub fn invalid_name_message(what: &str, name: &str) -> String {
    format!(
        "Invalid {} name '{}'. This must be alphanumeric and can contain underscores, \
         hyphens and periods (however, it cannot start with a period). The maximum \
         allowed length is 255 characters.",
        what, name
    )
}
