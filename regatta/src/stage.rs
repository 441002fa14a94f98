use std::collections::BTreeSet;

use crate::errors::ConfigErrors;
use crate::job::Job;
use crate::name::{self, CaseInsensitiveString};
use crate::variables::EnvironmentVariable;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    /// Triggered by the previous stage passing.
    Success,
    /// Triggered by hand.
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Authorization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

impl Authorization {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.users.is_empty()
    }
}

/// How a stage gets triggered and who may trigger it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Approval {
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    #[serde(default, skip_serializing_if = "Authorization::is_empty")]
    pub authorization: Authorization,
}

impl Default for Approval {
    fn default() -> Approval {
        Approval {
            approval_type: ApprovalType::Success,
            authorization: Authorization::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    pub name: CaseInsensitiveString,
    #[serde(default = "default_true")]
    pub fetch_materials: bool,
    #[serde(default)]
    pub clean_working_directory: bool,
    #[serde(default)]
    pub never_cleanup_artifacts: bool,
    #[serde(default)]
    pub approval: Approval,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

fn default_true() -> bool {
    true
}

impl Stage {
    pub fn find_job(&self, name: &CaseInsensitiveString) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.name == name)
    }

    pub fn validate(&mut self) {
        self.errors.clear();
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors
                .add("name", name::invalid_name_message("stage", self.name.as_str()));
        }
        if self.jobs.is_empty() {
            self.errors.add("jobs", "A stage must have at least one job");
        }
        let mut seen = BTreeSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.clone()) {
                self.errors.add(
                    "jobs",
                    format!(
                        "You have defined multiple jobs called '{}'. Job names are \
                         case-insensitive and must be unique.",
                        job.name
                    ),
                );
            }
        }
        for job in self.jobs.iter_mut() {
            job.validate();
        }
    }
}
