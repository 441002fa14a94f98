use std::collections::BTreeSet;

use crate::config_repo::ConfigRepo;
use crate::environment::Environment;
use crate::errors::ConfigErrors;
use crate::material::Material;
use crate::name::{self, CaseInsensitiveString};
use crate::package::{Package, PackageRepository};
use crate::params;
use crate::pipeline::Pipeline;
use crate::stage::Stage;
use crate::task::Task;
use crate::template::Template;
use crate::user::User;

/// Named group of pipelines.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineGroup {
    pub name: CaseInsensitiveString,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<Pipeline>,
    #[serde(default, skip_serializing_if = "ConfigErrors::is_empty")]
    pub errors: ConfigErrors,
}

/// The whole configuration: everything the admin API manages.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<PipelineGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<PackageRepository>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_repos: Vec<ConfigRepo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
}

/// Cross-entity finding recorded during the read-only pass and attached to
/// its node after the local validations ran (those clear the error maps).
struct Pending {
    target: Target,
    field: &'static str,
    message: String,
}

enum Target {
    Group(usize),
    Pipeline(usize, usize),
    Job {
        group: usize,
        pipeline: usize,
        stage: usize,
        job: usize,
    },
    Template(usize),
    Environment(usize),
    Repository(usize),
    Package {
        repository: usize,
        package: usize,
    },
    ConfigRepo(usize),
    User(usize),
}

impl ConfigDocument {
    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.groups.iter().flat_map(|group| group.pipelines.iter())
    }

    pub fn find_pipeline(&self, name: &CaseInsensitiveString) -> Option<&Pipeline> {
        self.pipelines().find(|pipeline| &pipeline.name == name)
    }

    pub fn find_template(&self, name: &CaseInsensitiveString) -> Option<&Template> {
        self.templates.iter().find(|template| &template.name == name)
    }

    pub fn find_environment(&self, name: &CaseInsensitiveString) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|environment| &environment.name == name)
    }

    pub fn find_repository(&self, repo_id: &str) -> Option<&PackageRepository> {
        self.repositories
            .iter()
            .find(|repository| repository.repo_id == repo_id)
    }

    pub fn find_package(&self, package_id: &str) -> Option<&Package> {
        self.repositories
            .iter()
            .find_map(|repository| repository.find_package(package_id))
    }

    pub fn repository_of_package(&self, package_id: &str) -> Option<&PackageRepository> {
        self.repositories
            .iter()
            .find(|repository| repository.find_package(package_id).is_some())
    }

    pub fn find_config_repo(&self, id: &str) -> Option<&ConfigRepo> {
        self.config_repos.iter().find(|repo| repo.id == id)
    }

    pub fn find_user(&self, login_name: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|user| user.login_name.eq_ignore_ascii_case(login_name))
    }

    /// Stages the pipeline actually runs: its own, or its template's.
    pub fn effective_stages<'a>(&'a self, pipeline: &'a Pipeline) -> &'a [Stage] {
        if !pipeline.stages.is_empty() {
            return &pipeline.stages;
        }
        match &pipeline.template {
            Some(template) => self
                .find_template(template)
                .map(|template| template.stages.as_slice())
                .unwrap_or(&[]),
            None => &[],
        }
    }

    /// Names of pipelines referencing the template, for delete protection.
    pub fn pipelines_using_template(&self, name: &CaseInsensitiveString) -> Vec<String> {
        self.pipelines()
            .filter(|pipeline| pipeline.template.as_ref() == Some(name))
            .map(|pipeline| pipeline.name.to_string())
            .collect()
    }

    /// Names of pipelines whose materials reference the package.
    pub fn pipelines_using_package(&self, package_id: &str) -> Vec<String> {
        self.pipelines()
            .filter(|pipeline| {
                pipeline.materials.iter().any(|material| {
                    matches!(material, Material::Package { package_ref } if package_ref == package_id)
                })
            })
            .map(|pipeline| pipeline.name.to_string())
            .collect()
    }

    pub fn add_pipeline(&mut self, group_name: &str, pipeline: Pipeline) {
        let group_name = CaseInsensitiveString::from(group_name);
        match self.groups.iter_mut().find(|group| group.name == group_name) {
            Some(group) => group.pipelines.push(pipeline),
            None => self.groups.push(PipelineGroup {
                name: group_name,
                pipelines: vec![pipeline],
                errors: ConfigErrors::default(),
            }),
        }
    }

    pub fn replace_pipeline(&mut self, updated: Pipeline) -> bool {
        for group in self.groups.iter_mut() {
            for pipeline in group.pipelines.iter_mut() {
                if pipeline.name == updated.name {
                    *pipeline = updated;
                    return true;
                }
            }
        }
        false
    }

    pub fn remove_pipeline(&mut self, name: &CaseInsensitiveString) -> Option<Pipeline> {
        for group in self.groups.iter_mut() {
            if let Some(position) = group
                .pipelines
                .iter()
                .position(|pipeline| &pipeline.name == name)
            {
                return Some(group.pipelines.remove(position));
            }
        }
        None
    }

    /// Validates everything and returns the flattened messages, leaving the
    /// per-node error maps populated for serialization.
    pub fn validate(&mut self) -> Vec<String> {
        let pending = self.cross_checks();
        self.run_local_validation();
        self.apply(pending);
        self.error_messages()
    }

    /// All embedded error messages, in document order.
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for group in &self.groups {
            messages.extend(group.errors.flatten());
            for pipeline in &group.pipelines {
                messages.extend(pipeline.errors.flatten());
                stage_messages(&pipeline.stages, &mut messages);
            }
        }
        for template in &self.templates {
            messages.extend(template.errors.flatten());
            stage_messages(&template.stages, &mut messages);
        }
        for environment in &self.environments {
            messages.extend(environment.errors.flatten());
        }
        for repository in &self.repositories {
            messages.extend(repository.errors.flatten());
            for package in &repository.packages {
                messages.extend(package.errors.flatten());
            }
        }
        for config_repo in &self.config_repos {
            messages.extend(config_repo.errors.flatten());
        }
        for user in &self.users {
            messages.extend(user.errors.flatten());
        }
        messages
    }

    fn run_local_validation(&mut self) {
        for group in self.groups.iter_mut() {
            group.errors.clear();
            for pipeline in group.pipelines.iter_mut() {
                pipeline.validate();
            }
        }
        for template in self.templates.iter_mut() {
            template.validate();
        }
        for environment in self.environments.iter_mut() {
            environment.validate();
        }
        for repository in self.repositories.iter_mut() {
            repository.validate();
        }
        for config_repo in self.config_repos.iter_mut() {
            config_repo.validate();
        }
        for user in self.users.iter_mut() {
            user.validate();
        }
    }

    fn apply(&mut self, pending: Vec<Pending>) {
        for Pending {
            target,
            field,
            message,
        } in pending
        {
            let errors = match target {
                Target::Group(group) => &mut self.groups[group].errors,
                Target::Pipeline(group, pipeline) => {
                    &mut self.groups[group].pipelines[pipeline].errors
                }
                Target::Job {
                    group,
                    pipeline,
                    stage,
                    job,
                } => &mut self.groups[group].pipelines[pipeline].stages[stage].jobs[job].errors,
                Target::Template(template) => &mut self.templates[template].errors,
                Target::Environment(environment) => &mut self.environments[environment].errors,
                Target::Repository(repository) => &mut self.repositories[repository].errors,
                Target::Package {
                    repository,
                    package,
                } => &mut self.repositories[repository].packages[package].errors,
                Target::ConfigRepo(repo) => &mut self.config_repos[repo].errors,
                Target::User(user) => &mut self.users[user].errors,
            };
            errors.add(field, message);
        }
    }

    fn cross_checks(&self) -> Vec<Pending> {
        let mut pending = Vec::new();
        let mut group_names = BTreeSet::new();
        for (gi, group) in self.groups.iter().enumerate() {
            if !name::is_valid_identifier(group.name.as_str()) {
                pending.push(Pending {
                    target: Target::Group(gi),
                    field: "name",
                    message: name::invalid_name_message("group", group.name.as_str()),
                });
            }
            if !group_names.insert(group.name.clone()) {
                pending.push(Pending {
                    target: Target::Group(gi),
                    field: "name",
                    message: format!(
                        "You have defined multiple pipeline groups called '{}'. Pipeline \
                         group names are case-insensitive and must be unique.",
                        group.name
                    ),
                });
            }
        }
        let mut pipeline_names = BTreeSet::new();
        for (gi, group) in self.groups.iter().enumerate() {
            for (pi, pipeline) in group.pipelines.iter().enumerate() {
                if !pipeline_names.insert(pipeline.name.clone()) {
                    pending.push(Pending {
                        target: Target::Pipeline(gi, pi),
                        field: "name",
                        message: format!(
                            "You have defined multiple pipelines called '{}'. Pipeline \
                             names are case-insensitive and must be unique.",
                            pipeline.name
                        ),
                    });
                }
                self.check_pipeline(gi, pi, pipeline, &mut pending);
            }
        }
        self.check_environments(&mut pending);
        self.check_unique_names(&mut pending);
        pending
    }

    fn check_pipeline(&self, gi: usize, pi: usize, pipeline: &Pipeline, pending: &mut Vec<Pending>) {
        let origin_suffix = if pipeline.is_local() {
            String::new()
        } else {
            format!(" ({})", pipeline.origin)
        };
        if let Some(template) = &pipeline.template {
            if self.find_template(template).is_none() {
                pending.push(Pending {
                    target: Target::Pipeline(gi, pi),
                    field: "template",
                    message: format!(
                        "Pipeline '{}' refers to non-existent template '{}'.",
                        pipeline.name, template
                    ),
                });
            }
        }
        for material in &pipeline.materials {
            match material {
                Material::Dependency {
                    pipeline: upstream,
                    stage,
                    ..
                } => match self.find_pipeline(upstream) {
                    None => pending.push(Pending {
                        target: Target::Pipeline(gi, pi),
                        field: "materials",
                        message: format!(
                            "Pipeline with name '{}' does not exist, it is defined as a \
                             dependency for pipeline '{}'{}",
                            upstream, pipeline.name, origin_suffix
                        ),
                    }),
                    Some(up) => {
                        let stages = self.effective_stages(up);
                        if !stages.iter().any(|s| &s.name == stage) {
                            pending.push(Pending {
                                target: Target::Pipeline(gi, pi),
                                field: "materials",
                                message: format!(
                                    "Stage with name '{}' does not exist on pipeline '{}', \
                                     it is being referred to from pipeline '{}'",
                                    stage, upstream, pipeline.name
                                ),
                            });
                        }
                    }
                },
                Material::Package { package_ref } if !package_ref.trim().is_empty() => {
                    if self.find_package(package_ref).is_none() {
                        pending.push(Pending {
                            target: Target::Pipeline(gi, pi),
                            field: "materials",
                            message: format!(
                                "Package with id '{}' does not exist, it is referred to \
                                 from pipeline '{}'",
                                package_ref, pipeline.name
                            ),
                        });
                    }
                }
                _ => {}
            }
        }
        let upstreams: BTreeSet<&CaseInsensitiveString> =
            pipeline.upstream_pipelines().into_iter().collect();
        let local_stages = !pipeline.stages.is_empty();
        for (si, stage) in self.effective_stages(pipeline).iter().enumerate() {
            for (ji, job) in stage.jobs.iter().enumerate() {
                for task in &job.tasks {
                    if let Task::Fetch {
                        pipeline: target,
                        stage: target_stage,
                        job: target_job,
                        ..
                    } = task
                    {
                        if let Some(message) = self.check_fetch(
                            pipeline,
                            target.as_ref(),
                            target_stage,
                            target_job,
                            &upstreams,
                        ) {
                            let target = if local_stages {
                                Target::Job {
                                    group: gi,
                                    pipeline: pi,
                                    stage: si,
                                    job: ji,
                                }
                            } else {
                                Target::Pipeline(gi, pi)
                            };
                            pending.push(Pending {
                                target,
                                field: "tasks",
                                message,
                            });
                        }
                    }
                }
            }
        }
        // Every parameter used anywhere in the pipeline must be defined.
        // Definitions themselves are excluded from the scan.
        let mut probe = pipeline.clone();
        probe.params = Vec::new();
        probe.errors.clear();
        if let Ok(text) = serde_json::to_string(&probe) {
            if let Err(error) = params::substitute(&text, &pipeline.param_map()) {
                pending.push(Pending {
                    target: Target::Pipeline(gi, pi),
                    field: "params",
                    message: error.to_string(),
                });
            }
        }
    }

    fn check_fetch(
        &self,
        pipeline: &Pipeline,
        target: Option<&CaseInsensitiveString>,
        stage: &CaseInsensitiveString,
        job: &CaseInsensitiveString,
        upstreams: &BTreeSet<&CaseInsensitiveString>,
    ) -> Option<String> {
        match target {
            None => self.check_fetch_source(pipeline, &pipeline.name, pipeline, stage, job),
            Some(target) if target == &pipeline.name => {
                self.check_fetch_source(pipeline, &pipeline.name, pipeline, stage, job)
            }
            Some(target) => {
                if !upstreams.contains(target) {
                    return Some(format!(
                        "Pipeline \"{}\" tries to fetch artifact from pipeline \"{}\" \
                         which is not an upstream pipeline",
                        pipeline.name, target
                    ));
                }
                // A missing upstream is already reported by the material check.
                let upstream = self.find_pipeline(target)?;
                self.check_fetch_source(pipeline, target, upstream, stage, job)
            }
        }
    }

    fn check_fetch_source(
        &self,
        pipeline: &Pipeline,
        source_name: &CaseInsensitiveString,
        source: &Pipeline,
        stage_name: &CaseInsensitiveString,
        job_name: &CaseInsensitiveString,
    ) -> Option<String> {
        let stages = self.effective_stages(source);
        match stages.iter().find(|stage| &stage.name == stage_name) {
            None => Some(format!(
                "Pipeline \"{}\" tries to fetch artifact from stage \"{} :: {}\" which \
                 does not exist.",
                pipeline.name, source_name, stage_name
            )),
            Some(stage) => match stage.find_job(job_name) {
                None => Some(format!(
                    "Pipeline \"{}\" tries to fetch artifact from job \"{} :: {} :: {}\" \
                     which does not exist.",
                    pipeline.name, source_name, stage_name, job_name
                )),
                Some(_) => None,
            },
        }
    }

    fn check_environments(&self, pending: &mut Vec<Pending>) {
        let mut names = BTreeSet::new();
        for (ei, environment) in self.environments.iter().enumerate() {
            if !names.insert(environment.name.clone()) {
                pending.push(Pending {
                    target: Target::Environment(ei),
                    field: "name",
                    message: format!(
                        "You have defined multiple environments called '{}'. Environment \
                         names are case-insensitive and must be unique.",
                        environment.name
                    ),
                });
            }
            for pipeline_name in &environment.pipelines {
                if self.find_pipeline(pipeline_name).is_none() {
                    pending.push(Pending {
                        target: Target::Environment(ei),
                        field: "pipelines",
                        message: format!(
                            "Environment '{}' refers to an unknown pipeline '{}'.",
                            environment.name, pipeline_name
                        ),
                    });
                }
            }
        }
    }

    fn check_unique_names(&self, pending: &mut Vec<Pending>) {
        let mut template_names = BTreeSet::new();
        for (ti, template) in self.templates.iter().enumerate() {
            if !template_names.insert(template.name.clone()) {
                pending.push(Pending {
                    target: Target::Template(ti),
                    field: "name",
                    message: format!(
                        "You have defined multiple templates called '{}'. Template names \
                         are case-insensitive and must be unique.",
                        template.name
                    ),
                });
            }
        }
        let mut repository_ids = BTreeSet::new();
        let mut package_ids = BTreeSet::new();
        for (ri, repository) in self.repositories.iter().enumerate() {
            if !repository_ids.insert(repository.repo_id.clone()) {
                pending.push(Pending {
                    target: Target::Repository(ri),
                    field: "repo_id",
                    message: format!(
                        "You have defined multiple repositories with id '{}'. Repository \
                         ids must be unique.",
                        repository.repo_id
                    ),
                });
            }
            for (pi, package) in repository.packages.iter().enumerate() {
                if !package_ids.insert(package.id.clone()) {
                    pending.push(Pending {
                        target: Target::Package {
                            repository: ri,
                            package: pi,
                        },
                        field: "id",
                        message: format!(
                            "You have defined multiple packages with id '{}'. Package ids \
                             must be unique.",
                            package.id
                        ),
                    });
                }
            }
        }
        let mut config_repo_ids = BTreeSet::new();
        for (ci, config_repo) in self.config_repos.iter().enumerate() {
            if !config_repo_ids.insert(config_repo.id.clone()) {
                pending.push(Pending {
                    target: Target::ConfigRepo(ci),
                    field: "id",
                    message: format!(
                        "You have defined multiple config repositories with id '{}'. \
                         Config repository ids must be unique.",
                        config_repo.id
                    ),
                });
            }
        }
        let mut logins = BTreeSet::new();
        for (ui, user) in self.users.iter().enumerate() {
            if !logins.insert(user.login_name.to_lowercase()) {
                pending.push(Pending {
                    target: Target::User(ui),
                    field: "login_name",
                    message: format!(
                        "You have defined multiple users called '{}'. Login names are \
                         case-insensitive and must be unique.",
                        user.login_name
                    ),
                });
            }
        }
    }
}

fn stage_messages(stages: &[Stage], messages: &mut Vec<String>) {
    for stage in stages {
        messages.extend(stage.errors.flatten());
        for job in &stage.jobs {
            messages.extend(job.errors.flatten());
        }
    }
}
