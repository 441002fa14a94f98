use crate::errors::ConfigErrors;

/// User record managed through the admin API.
///
/// Authentication credentials live in the server's password file; this is
/// the directory entry (display name, mail routing, checkin aliases).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub login_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_me: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkin_aliases: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn validate(&mut self) {
        self.errors.clear();
        if self.login_name.trim().is_empty() {
            self.errors.add("login_name", "Login name cannot be blank");
        }
    }
}
