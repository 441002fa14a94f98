use std::convert::Infallible;

use regatta::config_repo::ConfigRepo;
use regatta::ConfigDocument;

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "config repo";

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
    Ok(views::plain_json(&snapshot.document.config_repos))
}

pub async fn get(
    id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(fetch(id, context, service).await))
}

async fn fetch(
    id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    let repo = snapshot
        .document
        .find_config_repo(&id)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(repo);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(repo, &digest))
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
    let mut repo: ConfigRepo = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            if document.find_config_repo(&repo.id).is_some() {
                repo.errors.clear();
                repo.errors
                    .add("id", format!("Config repo id '{}' is already in use", repo.id));
                return Err(AdminError::validation(
                    KIND,
                    &repo.id,
                    &repo.errors.flatten(),
                    &repo,
                ));
            }
            let id = repo.id.clone();
            document.config_repos.push(repo);
            saved_config_repo(document, &id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn update(
    id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(replace(id, context, body, service).await))
}

async fn replace(
    id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let submitted: ConfigRepo = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .config_repos
                .iter()
                .position(|repo| repo.id == id)
                .ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.config_repos[position]);
            context.check_if_match(KIND, &id, &digest)?;
            if submitted.id != id {
                return Err(AdminError::rename(KIND));
            }
            document.config_repos[position] = submitted;
            saved_config_repo(document, &id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn delete(
    id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(remove(id, context, service).await))
}

async fn remove(
    id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let message = service
        .update(move |document| {
            let position = document
                .config_repos
                .iter()
                .position(|repo| repo.id == id)
                .ok_or(AdminError::NotFound)?;
            document.config_repos.remove(position);
            Ok(format!("The config repo '{}' was deleted successfully.", id))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn saved_config_repo(document: &mut ConfigDocument, id: &str) -> Result<ConfigRepo, AdminError> {
    let messages = document.validate();
    let repo = document
        .find_config_repo(id)
        .cloned()
        .ok_or_else(|| AdminError::Internal(format!("config repo '{}' vanished during save", id)))?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, id, &messages, &repo));
    }
    Ok(repo)
}
