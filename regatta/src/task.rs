use crate::errors::ConfigErrors;
use crate::name::CaseInsensitiveString;

/// Condition under which a task runs, relative to the job's state so far.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunIf {
    Passed,
    Failed,
    Any,
}

/// Unit of work inside a job, serialized as `{ "type": ..., "attributes": ... }`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "attributes", rename_all = "snake_case")]
pub enum Task {
    Exec {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        arguments: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        run_if: Vec<RunIf>,
    },
    Ant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        build_file: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        run_if: Vec<RunIf>,
    },
    Rake {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        build_file: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        run_if: Vec<RunIf>,
    },
    /// Pulls an artifact produced by an upstream (or earlier own) stage.
    Fetch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pipeline: Option<CaseInsensitiveString>,
        stage: CaseInsensitiveString,
        job: CaseInsensitiveString,
        source: String,
        #[serde(default)]
        is_source_a_file: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        run_if: Vec<RunIf>,
    },
}

impl Task {
    /// Local checks; messages land on the owning job's `tasks` field.
    pub fn validate(&self, errors: &mut ConfigErrors) {
        match self {
            Task::Exec { command, .. } => {
                if command.trim().is_empty() {
                    errors.add("tasks", "Command cannot be empty");
                }
            }
            Task::Fetch { source, .. } => {
                if source.trim().is_empty() {
                    errors.add("tasks", "Source of the fetched artifact cannot be empty");
                }
            }
            Task::Ant { .. } | Task::Rake { .. } => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exec_task_serializes_type_and_attributes() {
        let task = Task::Exec {
            command: "make".to_string(),
            arguments: vec!["-j4".to_string()],
            working_directory: None,
            run_if: vec![RunIf::Passed],
        };
        assert_eq!(
            serde_json::to_string(&task).unwrap(),
            r#"{"type":"exec","attributes":{"command":"make","arguments":["-j4"],"run_if":["passed"]}}"#
        );
    }

    #[test]
    fn fetch_task_pipeline_defaults_to_absent() {
        let task: Task = serde_json::from_str(
            r#"{"type":"fetch","attributes":{"stage":"build","job":"dist","source":"pkg.zip"}}"#,
        )
        .unwrap();
        match task {
            Task::Fetch { pipeline, is_source_a_file, .. } => {
                assert!(pipeline.is_none());
                assert!(!is_source_a_file);
            }
            other => panic!("expected a fetch task, got {:?}", other),
        }
    }

    #[test]
    fn empty_exec_command_is_reported() {
        let task = Task::Exec {
            command: "".to_string(),
            arguments: Vec::new(),
            working_directory: None,
            run_if: Vec::new(),
        };
        let mut errors = ConfigErrors::default();
        task.validate(&mut errors);
        assert_eq!(errors.on("tasks"), ["Command cannot be empty"]);
    }
}
