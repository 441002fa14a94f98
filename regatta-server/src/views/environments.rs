use std::convert::Infallible;

use regatta::environment::Environment;
use regatta::variables::keep_secret_values;
use regatta::{CaseInsensitiveString, ConfigDocument};

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "environment";

/// Merge-style update: membership changes without replacing the whole
/// environment, so no If-Match round-trip is needed.
#[derive(Debug, Default, serde::Deserialize)]
struct PatchRequest {
    #[serde(default)]
    pipelines: PatchList,
    #[serde(default)]
    agents: PatchList,
}

#[derive(Debug, Default, serde::Deserialize)]
struct PatchList {
    #[serde(default)]
    add: Vec<String>,
    #[serde(default)]
    remove: Vec<String>,
}

pub async fn list(
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(list_all(context, service).await))
}

async fn list_all(
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    Ok(views::plain_json(&snapshot.document.environments))
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
    let environment = snapshot
        .document
        .find_environment(&name)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(environment);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(environment, &digest))
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
    let mut environment: Environment = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            if document.find_environment(&environment.name).is_some() {
                environment.errors.clear();
                environment.errors.add(
                    "name",
                    format!("Environment name '{}' is already in use", environment.name),
                );
                return Err(AdminError::validation(
                    KIND,
                    &environment.name,
                    &environment.errors.flatten(),
                    &environment,
                ));
            }
            let name = environment.name.clone();
            document.environments.push(environment);
            saved_environment(document, &name)
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
    let submitted: Environment = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .environments
                .iter()
                .position(|environment| environment.name == name)
                .ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.environments[position]);
            context.check_if_match(KIND, &name, &digest)?;
            if submitted.name != name {
                return Err(AdminError::rename(KIND));
            }
            let mut updated = submitted;
            keep_secret_values(
                &mut updated.environment_variables,
                &document.environments[position].environment_variables,
            );
            document.environments[position] = updated;
            saved_environment(document, &name)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn patch(
    name: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(merge(name, context, body, service).await))
}

async fn merge(
    name: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let name = CaseInsensitiveString::from(name);
    let request: PatchRequest = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .environments
                .iter()
                .position(|environment| environment.name == name)
                .ok_or(AdminError::NotFound)?;
            let unknown: Vec<&String> = request
                .pipelines
                .add
                .iter()
                .filter(|pipeline| {
                    document
                        .find_pipeline(&CaseInsensitiveString::from(pipeline.as_str()))
                        .is_none()
                })
                .collect();
            if !unknown.is_empty() {
                let names: Vec<&str> = unknown.iter().map(|name| name.as_str()).collect();
                return Err(AdminError::BadRequest(format!(
                    "Pipelines(s) with name(s) [{}] not found.",
                    names.join(", ")
                )));
            }
            let environment = &mut document.environments[position];
            for pipeline in &request.pipelines.add {
                let pipeline = CaseInsensitiveString::from(pipeline.as_str());
                if !environment.has_pipeline(&pipeline) {
                    environment.pipelines.push(pipeline);
                }
            }
            for pipeline in &request.pipelines.remove {
                let pipeline = CaseInsensitiveString::from(pipeline.as_str());
                environment.pipelines.retain(|member| member != &pipeline);
            }
            for agent in &request.agents.add {
                if !environment.agents.contains(agent) {
                    environment.agents.push(agent.clone());
                }
            }
            for agent in &request.agents.remove {
                environment.agents.retain(|member| member != agent);
            }
            saved_environment(document, &name)
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
            let position = document
                .environments
                .iter()
                .position(|environment| environment.name == name)
                .ok_or(AdminError::NotFound)?;
            document.environments.remove(position);
            Ok(format!(
                "The environment '{}' was deleted successfully.",
                name
            ))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn saved_environment(
    document: &mut ConfigDocument,
    name: &CaseInsensitiveString,
) -> Result<Environment, AdminError> {
    let messages = document.validate();
    let environment = document.find_environment(name).cloned().ok_or_else(|| {
        AdminError::Internal(format!("environment '{}' vanished during save", name))
    })?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, name, &messages, &environment));
    }
    Ok(environment)
}
