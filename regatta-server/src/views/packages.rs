use std::convert::Infallible;

use regatta::package::Package;
use regatta::ConfigDocument;

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "package";

#[derive(Debug, serde::Deserialize)]
struct CreateRequest {
    repo_id: String,
    package: Package,
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
    let packages: Vec<&Package> = snapshot
        .document
        .repositories
        .iter()
        .flat_map(|repository| repository.packages.iter())
        .collect();
    Ok(views::plain_json(&packages))
}

pub async fn get(
    package_id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(fetch(package_id, context, service).await))
}

async fn fetch(
    package_id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    let package = snapshot
        .document
        .find_package(&package_id)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(package);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(package, &digest))
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
                repo_id,
                mut package,
            } = request;
            if document.find_package(&package.id).is_some() {
                package.errors.clear();
                package.errors.add(
                    "id",
                    format!("Package id '{}' is already in use", package.id),
                );
                return Err(AdminError::validation(
                    KIND,
                    &package.id,
                    &package.errors.flatten(),
                    &package,
                ));
            }
            let position = document
                .repositories
                .iter()
                .position(|repository| repository.repo_id == repo_id)
                .ok_or_else(|| AdminError::Unprocessable {
                    message: format!("Package Repository '{}' not found.", repo_id),
                    data: None,
                })?;
            let package_id = package.id.clone();
            document.repositories[position].packages.push(package);
            saved_package(document, &package_id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn update(
    package_id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(
        replace(package_id, context, body, service).await,
    ))
}

async fn replace(
    package_id: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let submitted: Package = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let (repository, position) =
                locate(document, &package_id).ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.repositories[repository].packages[position]);
            context.check_if_match(KIND, &package_id, &digest)?;
            if submitted.id != package_id {
                return Err(AdminError::rename(KIND));
            }
            document.repositories[repository].packages[position] = submitted;
            saved_package(document, &package_id)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn delete(
    package_id: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(remove(package_id, context, service).await))
}

async fn remove(
    package_id: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let message = service
        .update(move |document| {
            let (repository, position) =
                locate(document, &package_id).ok_or(AdminError::NotFound)?;
            let users = document.pipelines_using_package(&package_id);
            if !users.is_empty() {
                return Err(AdminError::Unprocessable {
                    message: format!(
                        "The package '{}' is being referenced by pipeline(s): [{}]",
                        package_id,
                        users.join(", ")
                    ),
                    data: None,
                });
            }
            document.repositories[repository].packages.remove(position);
            Ok(format!(
                "The package '{}' was deleted successfully.",
                package_id
            ))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn locate(document: &ConfigDocument, package_id: &str) -> Option<(usize, usize)> {
    document
        .repositories
        .iter()
        .enumerate()
        .find_map(|(repository, entry)| {
            entry
                .packages
                .iter()
                .position(|package| package.id == package_id)
                .map(|position| (repository, position))
        })
}

fn saved_package(document: &mut ConfigDocument, package_id: &str) -> Result<Package, AdminError> {
    let messages = document.validate();
    let package = document.find_package(package_id).cloned().ok_or_else(|| {
        AdminError::Internal(format!("package '{}' vanished during save", package_id))
    })?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, package_id, &messages, &package));
    }
    Ok(package)
}
