use std::convert::Infallible;

use regatta::user::User;
use regatta::ConfigDocument;

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "user";

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
    Ok(views::plain_json(&snapshot.document.users))
}

pub async fn get(
    login: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(fetch(login, context, service).await))
}

async fn fetch(
    login: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let snapshot = service.snapshot().await;
    let user = snapshot
        .document
        .find_user(&login)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(user);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(user, &digest))
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
    let mut user: User = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            if document.find_user(&user.login_name).is_some() {
                user.errors.clear();
                user.errors.add(
                    "login_name",
                    format!("Login name '{}' is already in use", user.login_name),
                );
                return Err(AdminError::validation(
                    KIND,
                    &user.login_name,
                    &user.errors.flatten(),
                    &user,
                ));
            }
            let login = user.login_name.clone();
            document.users.push(user);
            saved_user(document, &login)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn update(
    login: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(replace(login, context, body, service).await))
}

async fn replace(
    login: String,
    context: Context,
    body: warp::hyper::body::Bytes,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let submitted: User = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .users
                .iter()
                .position(|user| user.login_name.eq_ignore_ascii_case(&login))
                .ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.users[position]);
            context.check_if_match(KIND, &login, &digest)?;
            if !submitted.login_name.eq_ignore_ascii_case(&login) {
                return Err(AdminError::rename(KIND));
            }
            document.users[position] = submitted;
            saved_user(document, &login)
        })
        .await?;
    let digest = regatta::digest(&saved);
    Ok(views::tagged_json(&saved, &digest))
}

pub async fn delete(
    login: String,
    context: Context,
    service: ConfigService,
) -> Result<impl warp::Reply, Infallible> {
    Ok(views::respond(remove(login, context, service).await))
}

async fn remove(
    login: String,
    context: Context,
    service: ConfigService,
) -> Result<warp::reply::Response, AdminError> {
    context.authorize()?;
    let message = service
        .update(move |document| {
            let position = document
                .users
                .iter()
                .position(|user| user.login_name.eq_ignore_ascii_case(&login))
                .ok_or(AdminError::NotFound)?;
            let login = document.users.remove(position).login_name;
            Ok(format!("The user '{}' was deleted successfully.", login))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn saved_user(document: &mut ConfigDocument, login: &str) -> Result<User, AdminError> {
    let messages = document.validate();
    let user = document
        .find_user(login)
        .cloned()
        .ok_or_else(|| AdminError::Internal(format!("user '{}' vanished during save", login)))?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, login, &messages, &user));
    }
    Ok(user)
}
