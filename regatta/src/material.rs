use crate::errors::ConfigErrors;
use crate::name::{self, CaseInsensitiveString};

/// Patterns excluded from change detection on an SCM material.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.ignore.is_empty()
    }
}

/// Source a pipeline builds from.
///
/// Serialized as `{ "type": ..., "attributes": { ... } }`. Dependency
/// materials link pipelines together; package materials point at a package
/// definition by id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "attributes", rename_all = "snake_case")]
pub enum Material {
    Git {
        url: String,
        #[serde(default = "default_branch")]
        branch: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<CaseInsensitiveString>,
        #[serde(default = "default_true")]
        auto_update: bool,
        #[serde(default, skip_serializing_if = "Filter::is_empty")]
        filter: Filter,
        #[serde(default)]
        shallow_clone: bool,
    },
    Svn {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default)]
        check_externals: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<CaseInsensitiveString>,
        #[serde(default = "default_true")]
        auto_update: bool,
        #[serde(default, skip_serializing_if = "Filter::is_empty")]
        filter: Filter,
    },
    Hg {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<CaseInsensitiveString>,
        #[serde(default = "default_true")]
        auto_update: bool,
        #[serde(default, skip_serializing_if = "Filter::is_empty")]
        filter: Filter,
    },
    Dependency {
        pipeline: CaseInsensitiveString,
        stage: CaseInsensitiveString,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<CaseInsensitiveString>,
    },
    Package {
        #[serde(rename = "ref")]
        package_ref: String,
    },
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "master".to_string()
}

impl Material {
    /// Explicit name, or the upstream pipeline for unnamed dependencies.
    pub fn name(&self) -> Option<CaseInsensitiveString> {
        match self {
            Material::Git { name, .. } | Material::Svn { name, .. } | Material::Hg { name, .. } => {
                name.clone()
            }
            Material::Dependency { pipeline, name, .. } => {
                name.clone().or_else(|| Some(pipeline.clone()))
            }
            Material::Package { .. } => None,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            Material::Git { destination, .. }
            | Material::Svn { destination, .. }
            | Material::Hg { destination, .. } => destination.as_deref(),
            _ => None,
        }
    }

    /// Whether the material is a version-control checkout.
    pub fn is_scm(&self) -> bool {
        matches!(
            self,
            Material::Git { .. } | Material::Svn { .. } | Material::Hg { .. }
        )
    }

    fn url(&self) -> Option<&str> {
        match self {
            Material::Git { url, .. } | Material::Svn { url, .. } | Material::Hg { url, .. } => {
                Some(url)
            }
            _ => None,
        }
    }

    /// Local checks; messages land on the owner's `materials` field.
    pub fn validate(&self, errors: &mut ConfigErrors) {
        if let Some(url) = self.url() {
            if url.trim().is_empty() {
                errors.add("materials", "URL cannot be blank");
            }
        }
        if let Material::Package { package_ref } = self {
            if package_ref.trim().is_empty() {
                errors.add("materials", "Package reference cannot be blank");
            }
        }
        if let Some(name) = self.explicit_name() {
            if !name::is_valid_identifier(name.as_str()) {
                errors.add("materials", name::invalid_name_message("material", name.as_str()));
            }
        }
    }

    fn explicit_name(&self) -> Option<&CaseInsensitiveString> {
        match self {
            Material::Git { name, .. }
            | Material::Svn { name, .. }
            | Material::Hg { name, .. }
            | Material::Dependency { name, .. } => name.as_ref(),
            Material::Package { .. } => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn git_material_fills_in_defaults() {
        let material: Material =
            serde_json::from_str(r#"{"type":"git","attributes":{"url":"https://example.com/repo.git"}}"#)
                .unwrap();
        match &material {
            Material::Git {
                branch,
                auto_update,
                shallow_clone,
                ..
            } => {
                assert_eq!(branch, "master");
                assert!(auto_update);
                assert!(!shallow_clone);
            }
            other => panic!("expected a git material, got {:?}", other),
        }
    }

    #[test]
    fn dependency_material_defaults_its_name_to_the_upstream_pipeline() {
        let material = Material::Dependency {
            pipeline: "upstream".into(),
            stage: "build".into(),
            name: None,
        };
        assert_eq!(material.name(), Some("upstream".into()));
    }

    #[test]
    fn package_material_serializes_the_ref_key() {
        let material = Material::Package {
            package_ref: "pkg-id".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&material).unwrap(),
            r#"{"type":"package","attributes":{"ref":"pkg-id"}}"#
        );
    }

    #[test]
    fn blank_url_is_reported() {
        let material = Material::Git {
            url: " ".to_string(),
            branch: "master".to_string(),
            destination: None,
            name: None,
            auto_update: true,
            filter: Filter::default(),
            shallow_clone: false,
        };
        let mut errors = ConfigErrors::default();
        material.validate(&mut errors);
        assert_eq!(errors.on("materials"), ["URL cannot be blank"]);
    }

    #[test]
    fn invalid_material_name_is_reported() {
        let material = Material::Hg {
            url: "https://example.com/hg".to_string(),
            destination: None,
            name: Some("bad name".into()),
            auto_update: true,
            filter: Filter::default(),
        };
        let mut errors = ConfigErrors::default();
        material.validate(&mut errors);
        assert_eq!(errors.on("materials").len(), 1);
        assert!(errors.on("materials")[0].starts_with("Invalid material name 'bad name'."));
    }
}
