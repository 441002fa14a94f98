use std::convert::Infallible;

use regatta::package::PackageRepository;
use regatta::ConfigDocument;

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "package repository";

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
    Ok(views::plain_json(&snapshot.document.repositories))
}

pub async fn get(
    repo_id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(fetch(repo_id, context, service).await))
}

async fn fetch(
    repo_id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    let repository = snapshot
        .document
        .find_repository(&repo_id)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(repository);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(repository, &digest))
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
    let mut repository: PackageRepository = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            if document.find_repository(&repository.repo_id).is_some() {
                repository.errors.clear();
                repository.errors.add(
                    "repo_id",
                    format!("Repository id '{}' is already in use", repository.repo_id),
                );
                return Err(AdminError::validation(
                    KIND,
                    &repository.repo_id,
                    &repository.errors.flatten(),
                    &repository,
                ));
            }
            let repo_id = repository.repo_id.clone();
            document.repositories.push(repository);
            saved_repository(document, &repo_id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn update(
    repo_id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(replace(repo_id, context, body, service).await))
}

async fn replace(
    repo_id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let submitted: PackageRepository = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .repositories
                .iter()
                .position(|repository| repository.repo_id == repo_id)
                .ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.repositories[position]);
            context.check_if_match(KIND, &repo_id, &digest)?;
            if submitted.repo_id != repo_id {
                return Err(AdminError::rename(KIND));
            }
            document.repositories[position] = submitted;
            saved_repository(document, &repo_id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn delete(
    repo_id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(remove(repo_id, context, service).await))
}

async fn remove(
    repo_id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let message = service
        .update(move |document| {
            let position = document
                .repositories
                .iter()
                .position(|repository| repository.repo_id == repo_id)
                .ok_or(AdminError::NotFound)?;
            let packages: Vec<String> = document.repositories[position]
                .packages
                .iter()
                .map(|package| package.name.to_string())
                .collect();
            if !packages.is_empty() {
                return Err(AdminError::Unprocessable {
                    message: format!(
                        "The repository '{}' has package(s) defined in it: [{}]",
                        repo_id,
                        packages.join(", ")
                    ),
                    data: None,
                });
            }
            document.repositories.remove(position);
            Ok(format!(
                "The package repository '{}' was deleted successfully.",
                repo_id
            ))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn saved_repository(
    document: &mut ConfigDocument,
    repo_id: &str,
) -> Result<PackageRepository, AdminError> {
    let messages = document.validate();
    let repository = document.find_repository(repo_id).cloned().ok_or_else(|| {
        AdminError::Internal(format!("repository '{}' vanished during save", repo_id))
    })?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, repo_id, &messages, &repository));
    }
    Ok(repository)
}
