use std::collections::BTreeSet;

use crate::errors::ConfigErrors;
use crate::name::{self, CaseInsensitiveString};
use crate::stage::Stage;

/// Reusable stage layout a pipeline can reference instead of defining its own.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Template {
    pub name: CaseInsensitiveString,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

impl Template {
    pub fn validate(&mut self) {
        self.errors.clear();
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors
                .add("name", name::invalid_name_message("template", self.name.as_str()));
        }
        if self.stages.is_empty() {
            self.errors.add(
                "stages",
                format!(
                    "Template '{}' does not have any stages configured. A template must \
                     have at least one stage.",
                    self.name
                ),
            );
        }
        let mut seen = BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.clone()) {
                self.errors.add(
                    "stages",
                    format!(
                        "You have defined multiple stages called '{}'. Stage names are \
                         case-insensitive and must be unique.",
                        stage.name
                    ),
                );
            }
        }
        for stage in self.stages.iter_mut() {
            stage.validate();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn a_template_needs_at_least_one_stage() {
        let mut template = Template {
            name: "deploy-template".into(),
            stages: Vec::new(),
            errors: ConfigErrors::default(),
        };
        template.validate();
        assert_eq!(
            template.errors.on("stages"),
            ["Template 'deploy-template' does not have any stages configured. A \
              template must have at least one stage."]
        );
    }

    #[test]
    fn a_template_with_stages_is_valid() {
        let mut template = Template {
            name: "deploy-template".into(),
            stages: vec![serde_json::from_str(
                r#"{"name":"build","jobs":[{"name":"compile"}]}"#,
            )
            .unwrap()],
            errors: ConfigErrors::default(),
        };
        template.validate();
        assert!(template.errors.is_empty());
    }
}
