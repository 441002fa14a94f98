use crate::errors::ConfigErrors;
use crate::material::Material;
use crate::variables::ConfigurationProperty;

/// Version-control location that owns part of the configuration.
///
/// Pipelines defined by a config repo show up with a remote origin and are
/// read-only through the admin API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigRepo {
    pub id: String,
    pub material: Material,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationProperty>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

impl ConfigRepo {
    pub fn validate(&mut self) {
        self.errors.clear();
        if self.id.trim().is_empty() {
            self.errors.add("id", "Configuration repository id cannot be blank");
        }
        if !self.material.is_scm() {
            self.errors.add(
                "material",
                "Config repositories can only use version-control materials",
            );
        }
        self.material.validate(&mut self.errors);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::material::Filter;

    #[test]
    fn scm_backed_repo_is_valid() {
        let mut repo = ConfigRepo {
            id: "team-config".to_string(),
            material: Material::Git {
                url: "https://example.com/config.git".to_string(),
                branch: "master".to_string(),
                destination: None,
                name: None,
                auto_update: true,
                filter: Filter::default(),
                shallow_clone: false,
            },
            configuration: Vec::new(),
            errors: ConfigErrors::default(),
        };
        repo.validate();
        assert!(repo.errors.is_empty());
    }

    #[test]
    fn dependency_material_is_rejected() {
        let mut repo = ConfigRepo {
            id: "team-config".to_string(),
            material: Material::Dependency {
                pipeline: "upstream".into(),
                stage: "build".into(),
                name: None,
            },
            configuration: Vec::new(),
            errors: ConfigErrors::default(),
        };
        repo.validate();
        assert_eq!(
            repo.errors.on("material"),
            ["Config repositories can only use version-control materials"]
        );
    }
}
