use serde::ser::SerializeStruct;

/// Environment variable attached to a pipeline, stage, job or environment.
///
/// Secure variables never serialize their value. A submitted secure variable
/// without a value means "keep whatever is stored", resolved by
/// [`keep_secret_values`] before the update is applied.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

impl serde::Serialize for EnvironmentVariable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let fields = if self.secure { 2 } else { 3 };
        let mut state = serializer.serialize_struct("EnvironmentVariable", fields)?;
        state.serialize_field("name", &self.name)?;
        if !self.secure {
            state.serialize_field("value", self.value.as_deref().unwrap_or(""))?;
        }
        state.serialize_field("secure", &self.secure)?;
        state.end()
    }
}

/// Carries stored secure values over to an update that omitted them.
pub fn keep_secret_values(submitted: &mut [EnvironmentVariable], stored: &[EnvironmentVariable]) {
    for variable in submitted.iter_mut() {
        if variable.secure && variable.value.is_none() {
            variable.value = stored
                .iter()
                .find(|previous| previous.secure && previous.name == variable.name)
                .and_then(|previous| previous.value.clone());
        }
    }
}

/// Parameter definition on a pipeline, substituted into `#{name}` patterns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Key/value property of a package repository, package or config repo.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigurationProperty {
    pub key: String,
    pub value: String,
}
