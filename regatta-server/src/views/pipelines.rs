use std::convert::Infallible;

use regatta::pipeline::{Origin, Pipeline};
use regatta::variables::keep_secret_values;
use regatta::{CaseInsensitiveString, ConfigDocument};

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "pipeline";

#[derive(Debug, serde::Deserialize)]
struct CreateRequest {
    group: String,
    pipeline: Pipeline,
}

pub async fn list(
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(list_groups(context, service).await))
}

async fn list_groups(
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    Ok(views::plain_json(&snapshot.document.groups))
}

pub async fn get(
    name: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(fetch(name, context, service).await))
}

async fn fetch(
    name: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let name = CaseInsensitiveString::from(name);
    let snapshot = service.snapshot().await;
    let pipeline = snapshot
        .document
        .find_pipeline(&name)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(pipeline);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(pipeline, &digest))
}

pub async fn create(
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(insert(context, body, service).await))
}

async fn insert(
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let request: CreateRequest = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let CreateRequest {
                group,
                mut pipeline,
            } = request;
            if document.find_pipeline(&pipeline.name).is_some() {
                pipeline.errors.clear();
                pipeline.errors.add(
                    "name",
                    format!("Pipeline name '{}' is already in use", pipeline.name),
                );
                return Err(AdminError::validation(
                    KIND,
                    &pipeline.name,
                    &pipeline.errors.flatten(),
                    &pipeline,
                ));
            }
            pipeline.origin = Origin::Local;
            let name = pipeline.name.clone();
            document.add_pipeline(group.as_str(), pipeline);
            saved_pipeline(document, &name)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn update(
    name: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(replace(name, context, body, service).await))
}

async fn replace(
    name: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let name = CaseInsensitiveString::from(name);
    let submitted: Pipeline = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let current = document
                .find_pipeline(&name)
                .ok_or(AdminError::NotFound)?
                .clone();
            if !current.is_local() {
                return Err(AdminError::remote(KIND, &name, &current.origin));
            }
            context.check_if_match(KIND, &name, &regatta::digest(&current))?;
            if submitted.name != name {
                return Err(AdminError::rename(KIND));
            }
            let mut updated = submitted;
            updated.origin = Origin::Local;
            keep_pipeline_secrets(&mut updated, &current);
            document.replace_pipeline(updated);
            saved_pipeline(document, &name)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn delete(
    name: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(remove(name, context, service).await))
}

async fn remove(
    name: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let name = CaseInsensitiveString::from(name);
    let message = service
        .update(move |document| {
            let pipeline = document.find_pipeline(&name).ok_or(AdminError::NotFound)?;
            if !pipeline.is_local() {
                return Err(AdminError::remote(KIND, &name, &pipeline.origin));
            }
            let downstream: Vec<String> = document
                .pipelines()
                .filter(|candidate| {
                    candidate
                        .upstream_pipelines()
                        .iter()
                        .any(|upstream| **upstream == name)
                })
                .map(|candidate| candidate.name.to_string())
                .collect();
            if !downstream.is_empty() {
                return Err(AdminError::Unprocessable {
                    message: format!(
                        "Cannot delete pipeline '{}' as pipeline(s) [{}] depend on it.",
                        name,
                        downstream.join(", ")
                    ),
                    data: None,
                });
            }
            if let Some(environment) = document
                .environments
                .iter()
                .find(|environment| environment.has_pipeline(&name))
            {
                return Err(AdminError::Unprocessable {
                    message: format!(
                        "Cannot delete pipeline '{}' as it is present in environment '{}'.",
                        name, environment.name
                    ),
                    data: None,
                });
            }
            document.remove_pipeline(&name);
            Ok(format!(
                "The pipeline '{}' was deleted successfully.",
                name
            ))
        })
        .await?;
    Ok(views::confirmation(message))
}

/// Validation tail of every save: the document must come out valid, and the
/// reply needs the saved entity either way.
fn saved_pipeline(
    document: &mut ConfigDocument,
    name: &CaseInsensitiveString,
) -> Result<Pipeline, AdminError> {
    let messages = document.validate();
    let pipeline = document
        .find_pipeline(name)
        .cloned()
        .ok_or_else(|| AdminError::Internal(format!("pipeline '{}' vanished during save", name)))?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, name, &messages, &pipeline));
    }
    Ok(pipeline)
}

/// Secure variable values omitted by the submission keep their stored
/// values, at the pipeline, stage and job level.
fn keep_pipeline_secrets(updated: &mut Pipeline, current: &Pipeline) {
    keep_secret_values(
        &mut updated.environment_variables,
        &current.environment_variables,
    );
    for stage in updated.stages.iter_mut() {
        let previous = match current.stages.iter().find(|s| s.name == stage.name) {
            Some(previous) => previous,
            None => continue,
        };
        keep_secret_values(
            &mut stage.environment_variables,
            &previous.environment_variables,
        );
        for job in stage.jobs.iter_mut() {
            if let Some(previous_job) = previous.jobs.iter().find(|j| j.name == job.name) {
                keep_secret_values(
                    &mut job.environment_variables,
                    &previous_job.environment_variables,
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use regatta::variables::EnvironmentVariable;

    fn secure(name: &str, value: Option<&str>) -> EnvironmentVariable {
        EnvironmentVariable {
            name: name.to_string(),
            value: value.map(String::from),
            secure: true,
        }
    }

    #[test]
    fn stage_and_job_secrets_are_kept_across_updates() {
        let mut current = Pipeline::new("p1");
        current.stages = vec![serde_json::from_str(
            r#"{"name":"build","jobs":[{"name":"compile"}]}"#,
        )
        .unwrap()];
        current.environment_variables = vec![secure("TOP", Some("kept-top"))];
        current.stages[0].environment_variables = vec![secure("MID", Some("kept-mid"))];
        current.stages[0].jobs[0].environment_variables = vec![secure("LOW", Some("kept-low"))];

        let mut updated = current.clone();
        updated.environment_variables = vec![secure("TOP", None)];
        updated.stages[0].environment_variables = vec![secure("MID", None)];
        updated.stages[0].jobs[0].environment_variables = vec![secure("LOW", None)];

        keep_pipeline_secrets(&mut updated, &current);
        assert_eq!(
            updated.environment_variables[0].value.as_deref(),
            Some("kept-top")
        );
        assert_eq!(
            updated.stages[0].environment_variables[0].value.as_deref(),
            Some("kept-mid")
        );
        assert_eq!(
            updated.stages[0].jobs[0].environment_variables[0]
                .value
                .as_deref(),
            Some("kept-low")
        );
    }

    #[test]
    fn renamed_stages_do_not_inherit_secrets() {
        let mut current = Pipeline::new("p1");
        current.stages = vec![serde_json::from_str(
            r#"{"name":"build","jobs":[{"name":"compile"}]}"#,
        )
        .unwrap()];
        current.stages[0].environment_variables = vec![secure("MID", Some("old"))];

        let mut updated = current.clone();
        updated.stages[0].name = "renamed".into();
        updated.stages[0].environment_variables = vec![secure("MID", None)];

        keep_pipeline_secrets(&mut updated, &current);
        assert_eq!(updated.stages[0].environment_variables[0].value, None);
    }
}
