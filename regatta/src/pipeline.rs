use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ConfigErrors;
use crate::material::Material;
use crate::name::{self, CaseInsensitiveString};
use crate::params;
use crate::stage::Stage;
use crate::variables::{EnvironmentVariable, Param};

/// Cron-style trigger. The `spec` string is carried opaquely.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timer {
    pub spec: String,
    #[serde(default)]
    pub only_on_changes: bool,
}

/// Issue-tracker link pattern applied to commit messages.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "attributes", rename_all = "snake_case")]
pub enum TrackingTool {
    Generic { link: String, regex: String },
}

/// Where a definition came from. Entities owned by a config repo cannot be
/// edited through the API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Origin {
    Local,
    ConfigRepo { url: String, revision: String },
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

impl Default for Origin {
    fn default() -> Origin {
        Origin::Local
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Local => write!(f, "local configuration"),
            Origin::ConfigRepo { url, revision } => {
                write!(f, "{} at revision {}", url, revision)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pipeline {
    #[serde(default = "default_label_template")]
    pub label_template: String,
    #[serde(default)]
    pub enable_pipeline_locking: bool,
    pub name: CaseInsensitiveString,
    /// Stage layout borrowed from a named template instead of local stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<CaseInsensitiveString>,
    #[serde(default, skip_serializing_if = "Origin::is_local")]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_tool: Option<TrackingTool>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

fn default_label_template() -> String {
    "${COUNT}".to_string()
}

impl Pipeline {
    pub fn new(name: impl Into<CaseInsensitiveString>) -> Pipeline {
        Pipeline {
            label_template: default_label_template(),
            enable_pipeline_locking: false,
            name: name.into(),
            template: None,
            origin: Origin::Local,
            params: Vec::new(),
            environment_variables: Vec::new(),
            materials: Vec::new(),
            stages: Vec::new(),
            timer: None,
            tracking_tool: None,
            errors: ConfigErrors::default(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }

    /// Parameter definitions as a lowercase-keyed lookup map.
    pub fn param_map(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .map(|param| (param.name.to_lowercase(), param.value.clone()))
            .collect()
    }

    /// Names the label template may reference as material revisions.
    pub fn material_names(&self) -> Vec<CaseInsensitiveString> {
        self.materials.iter().filter_map(Material::name).collect()
    }

    /// Upstream pipelines this one depends on.
    pub fn upstream_pipelines(&self) -> Vec<&CaseInsensitiveString> {
        self.materials
            .iter()
            .filter_map(|material| match material {
                Material::Dependency { pipeline, .. } => Some(pipeline),
                _ => None,
            })
            .collect()
    }

    /// Local checks only; cross-entity rules run on the whole document.
    pub fn validate(&mut self) {
        self.errors.clear();
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors
                .add("name", name::invalid_name_message("pipeline", self.name.as_str()));
        }
        for param in &self.params {
            if !name::is_valid_identifier(&param.name) {
                self.errors
                    .add("params", name::invalid_name_message("param", &param.name));
            }
        }
        match &self.template {
            Some(template) if !self.stages.is_empty() => {
                let message = format!(
                    "Cannot add stages to pipeline '{}' which already references template '{}'",
                    self.name, template
                );
                self.errors.add("stages", message);
            }
            None if self.stages.is_empty() => {
                self.errors.add(
                    "stages",
                    format!(
                        "Pipeline '{}' does not have any stages configured. A pipeline \
                         must have at least one stage.",
                        self.name
                    ),
                );
            }
            _ => {}
        }
        self.validate_materials();
        self.validate_label();
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

    fn validate_materials(&mut self) {
        for material in &self.materials {
            material.validate(&mut self.errors);
        }
        let mut names = BTreeSet::new();
        for material in &self.materials {
            if let Some(name) = material.name() {
                if !names.insert(name.clone()) {
                    self.errors.add(
                        "materials",
                        format!(
                            "You have defined multiple materials called '{}'. Material \
                             names are case-insensitive and must be unique. Note that for \
                             dependency materials the default materialName is the name of \
                             the upstream pipeline. You can override this by setting the \
                             materialName explicitly for the upstream pipeline.",
                            name
                        ),
                    );
                }
            }
        }
        let scm_materials: Vec<&Material> =
            self.materials.iter().filter(|m| m.is_scm()).collect();
        if scm_materials.len() > 1 {
            let mut destinations = BTreeSet::new();
            for material in &scm_materials {
                match material.destination() {
                    None => self.errors.add(
                        "materials",
                        "Destination directory is required when a pipeline has multiple \
                         SCM materials.",
                    ),
                    Some(destination) => {
                        if !destinations.insert(destination.to_string()) {
                            self.errors.add(
                                "materials",
                                "The destination directory must be unique across materials.",
                            );
                        }
                    }
                }
            }
        }
    }

    fn validate_label(&mut self) {
        let resolved = match params::substitute(&self.label_template, &self.param_map()) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.errors.add("label_template", error.to_string());
                return;
            }
        };
        let known: Vec<CaseInsensitiveString> = self.material_names();
        let mut rest = resolved.as_str();
        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let end = match after.find('}') {
                Some(end) => end,
                None => {
                    self.add_label_error();
                    return;
                }
            };
            let token = &after[..end];
            if !self.label_token_is_valid(token, &known) {
                self.add_label_error();
                return;
            }
            rest = &after[end + 1..];
        }
    }

    fn label_token_is_valid(&self, token: &str, materials: &[CaseInsensitiveString]) -> bool {
        if token.eq_ignore_ascii_case("COUNT") {
            return true;
        }
        if token.starts_with("env:") {
            return token.len() > "env:".len();
        }
        // A material reference, optionally truncated as name[:length].
        let base = match token.find("[:") {
            Some(open) => {
                if !token.ends_with(']') {
                    return false;
                }
                let length = &token[open + 2..token.len() - 1];
                if length.parse::<usize>().is_err() {
                    return false;
                }
                &token[..open]
            }
            None => token,
        };
        let base = CaseInsensitiveString::from(base);
        materials.iter().any(|name| name == &base)
    }

    fn add_label_error(&mut self) {
        let message = format!(
            "Invalid label '{}'. Label should be composed of alphanumeric text, it can \
             contain the build number as ${{COUNT}}, can contain a material revision as \
             ${{<material-name>}} of ${{<material-name>[:<length>]}}, or use params as \
             #{{<param-name>}}.",
            self.label_template
        );
        self.errors.add("label_template", message);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::material::Filter;

    fn pipeline_with_stage(name: &str) -> Pipeline {
        let mut pipeline = Pipeline::new(name);
        pipeline.stages = vec![serde_json::from_str(
            r#"{"name":"build","jobs":[{"name":"compile"}]}"#,
        )
        .unwrap()];
        pipeline
    }

    fn git_material(name: Option<&str>, destination: Option<&str>) -> Material {
        Material::Git {
            url: "https://example.com/repo.git".to_string(),
            branch: "master".to_string(),
            destination: destination.map(str::to_string),
            name: name.map(CaseInsensitiveString::from),
            auto_update: true,
            filter: Filter::default(),
            shallow_clone: false,
        }
    }

    #[test]
    fn label_template_defaults_to_count() {
        let pipeline: Pipeline =
            serde_json::from_str(r#"{"name":"build-linux"}"#).unwrap();
        assert_eq!(pipeline.label_template, "${COUNT}");
    }

    #[test]
    fn count_label_is_valid_in_any_case() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.label_template = "release-${COUNT}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());
        pipeline.label_template = "release-${count}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());
    }

    #[test]
    fn material_revision_labels_check_the_material_names() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.materials = vec![git_material(Some("svnMaterial"), None)];
        pipeline.label_template = "1.3-${svnMaterial}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());

        pipeline.label_template = "1.3-${unknownMaterial}".to_string();
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("label_template"),
            [format!(
                "Invalid label '1.3-${{unknownMaterial}}'. Label should be composed of \
                 alphanumeric text, it can contain the build number as ${{COUNT}}, can \
                 contain a material revision as ${{<material-name>}} of \
                 ${{<material-name>[:<length>]}}, or use params as #{{<param-name>}}."
            )]
        );
    }

    #[test]
    fn truncated_material_labels_are_valid() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.materials = vec![git_material(Some("git"), None)];
        pipeline.label_template = "${git[:7]}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());

        pipeline.label_template = "${git[:seven]}".to_string();
        pipeline.validate();
        assert!(!pipeline.errors.on("label_template").is_empty());
    }

    #[test]
    fn env_labels_are_valid() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.label_template = "${env:TAG}-${COUNT}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());
    }

    #[test]
    fn params_resolve_before_the_label_is_checked() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.params = vec![Param {
            name: "prefix".to_string(),
            value: "release".to_string(),
        }];
        pipeline.label_template = "#{prefix}-${COUNT}".to_string();
        pipeline.validate();
        assert!(pipeline.errors.is_empty());
    }

    #[test]
    fn undefined_label_params_are_reported() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.label_template = "#{prefix}-${COUNT}".to_string();
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("label_template"),
            ["Parameter 'prefix' is not defined. All pipelines using this parameter \
              directly or via a template must define it."]
        );
    }

    #[test]
    fn template_and_stages_are_mutually_exclusive() {
        let mut pipeline = pipeline_with_stage("wholelottalove");
        pipeline.template = Some("fancy-template".into());
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("stages"),
            ["Cannot add stages to pipeline 'wholelottalove' which already references \
              template 'fancy-template'"]
        );
    }

    #[test]
    fn a_pipeline_without_template_needs_stages() {
        let mut pipeline = Pipeline::new("empty");
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("stages"),
            ["Pipeline 'empty' does not have any stages configured. A pipeline must \
              have at least one stage."]
        );
    }

    #[test]
    fn multiple_scm_materials_need_unique_destinations() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.materials = vec![git_material(None, None), git_material(None, Some("lib"))];
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("materials"),
            ["Destination directory is required when a pipeline has multiple SCM \
              materials."]
        );

        pipeline.materials = vec![
            git_material(None, Some("lib")),
            git_material(None, Some("lib")),
        ];
        pipeline.validate();
        assert_eq!(
            pipeline.errors.on("materials"),
            ["The destination directory must be unique across materials."]
        );
    }

    #[test]
    fn duplicate_material_names_are_reported() {
        let mut pipeline = pipeline_with_stage("p1");
        pipeline.materials = vec![
            git_material(Some("repo"), Some("a")),
            git_material(Some("repo"), Some("b")),
        ];
        pipeline.validate();
        let messages = pipeline.errors.on("materials");
        assert!(messages[0].starts_with("You have defined multiple materials called 'repo'."));
    }

    #[test]
    fn remote_origin_displays_url_and_revision() {
        let origin = Origin::ConfigRepo {
            url: "https://example.com/config.git".to_string(),
            revision: "5a1b3f".to_string(),
        };
        assert_eq!(
            origin.to_string(),
            "https://example.com/config.git at revision 5a1b3f"
        );
    }

    #[test]
    fn local_origin_is_not_serialized() {
        let pipeline = pipeline_with_stage("p1");
        let serialized = serde_json::to_string(&pipeline).unwrap();
        assert!(!serialized.contains("origin"));
    }
}
