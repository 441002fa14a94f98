use crate::errors::ConfigErrors;
use crate::name::{self, CaseInsensitiveString};
use crate::variables::ConfigurationProperty;

/// Identifier of the plugin that understands this repository's format.
/// Carried as data only; nothing here invokes plugins.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PluginMetadata {
    pub id: String,
    pub version: String,
}

/// Package definition inside a repository, referenced by package materials.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Package {
    pub id: String,
    pub name: CaseInsensitiveString,
    #[serde(default = "default_true")]
    pub auto_update: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationProperty>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PackageRepository {
    pub repo_id: String,
    pub name: CaseInsensitiveString,
    pub plugin_metadata: PluginMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

impl Package {
    pub fn validate(&mut self) {
        self.errors.clear();
        if self.id.trim().is_empty() {
            self.errors.add("id", "Package id cannot be blank");
        }
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors
                .add("name", name::invalid_name_message("package", self.name.as_str()));
        }
    }
}

impl PackageRepository {
    pub fn find_package(&self, package_id: &str) -> Option<&Package> {
        self.packages.iter().find(|package| package.id == package_id)
    }

    pub fn validate(&mut self) {
        self.errors.clear();
        if self.repo_id.trim().is_empty() {
            self.errors.add("repo_id", "Repository id cannot be blank");
        }
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors.add(
                "name",
                name::invalid_name_message("repository", self.name.as_str()),
            );
        }
        if self.plugin_metadata.id.trim().is_empty() {
            self.errors
                .add("plugin_metadata", "Plugin id cannot be blank");
        }
        for package in self.packages.iter_mut() {
            package.validate();
        }
    }
}
