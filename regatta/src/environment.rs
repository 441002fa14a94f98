use crate::errors::ConfigErrors;
use crate::name::{self, CaseInsensitiveString};
use crate::variables::EnvironmentVariable;

/// Named grouping of pipelines and agents with shared variables.
///
/// Agents are carried as opaque uuid strings; there is no agent registry to
/// check them against.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Environment {
    pub name: CaseInsensitiveString,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<CaseInsensitiveString>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

impl Environment {
    pub fn new(name: impl Into<CaseInsensitiveString>) -> Environment {
        Environment {
            name: name.into(),
            environment_variables: Vec::new(),
            pipelines: Vec::new(),
            agents: Vec::new(),
            errors: ConfigErrors::default(),
        }
    }

    pub fn has_pipeline(&self, name: &CaseInsensitiveString) -> bool {
        self.pipelines.iter().any(|pipeline| pipeline == name)
    }

    pub fn validate(&mut self) {
        self.errors.clear();
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors.add(
                "name",
                name::invalid_name_message("environment", self.name.as_str()),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pipeline_membership_ignores_case() {
        let mut environment = Environment::new("uat");
        environment.pipelines.push("Deploy".into());
        assert!(environment.has_pipeline(&"deploy".into()));
        assert!(!environment.has_pipeline(&"other".into()));
    }

    #[test]
    fn invalid_environment_name_is_reported() {
        let mut environment = Environment::new("bad env");
        environment.validate();
        assert!(environment.errors.on("name")[0].starts_with("Invalid environment name"));
    }
}
