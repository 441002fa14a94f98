use crate::errors::ConfigErrors;
use crate::name::{self, CaseInsensitiveString};
use crate::task::Task;
use crate::variables::EnvironmentVariable;

/// How many instances of a job run per stage trigger.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum RunInstanceCount {
    Fixed(i64),
    /// Only `"all"` is meaningful; anything else fails validation.
    Keyword(String),
}

/// Job cancellation timeout: minutes, or the `"never"` keyword.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Timeout {
    Minutes(i64),
    Keyword(String),
}

/// Custom tab shown on the job detail page of downstream UIs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tab {
    pub name: String,
    pub path: String,
}

/// File the job publishes after a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Build {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
    },
    Test {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub name: CaseInsensitiveString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_instance_count: Option<RunInstanceCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Timeout>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<Tab>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

impl Job {
    pub fn validate(&mut self) {
        self.errors.clear();
        if !name::is_valid_identifier(self.name.as_str()) {
            self.errors
                .add("name", name::invalid_name_message("job", self.name.as_str()));
        }
        match &self.run_instance_count {
            Some(RunInstanceCount::Fixed(count)) if *count < 0 => {
                self.errors.add(
                    "run_instance_count",
                    "'Run Instance Count' cannot be a negative number as it represents \
                     number of instances to spawn.",
                );
            }
            Some(RunInstanceCount::Keyword(keyword)) if keyword != "all" => {
                self.errors.add(
                    "run_instance_count",
                    "'Run Instance Count' should be a valid positive integer or 'all'.",
                );
            }
            _ => {}
        }
        match &self.timeout {
            Some(Timeout::Minutes(minutes)) if *minutes < 0 => {
                self.errors.add(
                    "timeout",
                    "Timeout cannot be a negative number as it represents number of minutes.",
                );
            }
            Some(Timeout::Keyword(keyword)) if keyword != "never" => {
                self.errors.add(
                    "timeout",
                    "Timeout should be a valid number as it represents number of minutes.",
                );
            }
            _ => {}
        }
        for task in &self.tasks {
            task.validate(&mut self.errors);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn job(name: &str) -> Job {
        Job {
            name: name.into(),
            run_instance_count: None,
            timeout: None,
            environment_variables: Vec::new(),
            resources: Vec::new(),
            tabs: Vec::new(),
            artifacts: Vec::new(),
            tasks: Vec::new(),
            errors: ConfigErrors::default(),
        }
    }

    #[test]
    fn a_plain_job_is_valid() {
        let mut job = job("compile");
        job.validate();
        assert!(job.errors.is_empty());
    }

    #[test]
    fn negative_run_instance_count_is_reported() {
        let mut job = job("compile");
        job.run_instance_count = Some(RunInstanceCount::Fixed(-2));
        job.validate();
        assert_eq!(
            job.errors.on("run_instance_count"),
            ["'Run Instance Count' cannot be a negative number as it represents \
              number of instances to spawn."]
        );
    }

    #[test]
    fn run_instance_count_accepts_all() {
        let mut job = job("compile");
        job.run_instance_count = Some(RunInstanceCount::Keyword("all".to_string()));
        job.validate();
        assert!(job.errors.is_empty());
    }

    #[test]
    fn negative_timeout_is_reported() {
        let mut job = job("compile");
        job.timeout = Some(Timeout::Minutes(-1));
        job.validate();
        assert_eq!(
            job.errors.on("timeout"),
            ["Timeout cannot be a negative number as it represents number of minutes."]
        );
    }

    #[test]
    fn timeout_rejects_junk_keywords() {
        let mut job = job("compile");
        job.timeout = Some(Timeout::Keyword("sometimes".to_string()));
        job.validate();
        assert_eq!(
            job.errors.on("timeout"),
            ["Timeout should be a valid number as it represents number of minutes."]
        );
    }

    #[test]
    fn timeout_accepts_never() {
        let mut job = job("compile");
        job.timeout = Some(Timeout::Keyword("never".to_string()));
        job.validate();
        assert!(job.errors.is_empty());
    }

    #[test]
    fn run_instance_count_round_trips_both_shapes() {
        let fixed: RunInstanceCount = serde_json::from_str("3").unwrap();
        assert_eq!(fixed, RunInstanceCount::Fixed(3));
        let all: RunInstanceCount = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, RunInstanceCount::Keyword("all".to_string()));
        assert_eq!(serde_json::to_string(&fixed).unwrap(), "3");
    }
}
