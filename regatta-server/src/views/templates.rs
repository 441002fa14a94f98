use std::convert::Infallible;

use regatta::template::Template;
use regatta::{CaseInsensitiveString, ConfigDocument};

use crate::service::ConfigService;
use crate::views::{self, AdminError, Context};

const KIND: &str = "template";

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
    Ok(views::plain_json(&snapshot.document.templates))
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
    let template = snapshot
        .document
        .find_template(&name)
        .ok_or(AdminError::NotFound)?;
    let digest = regatta::digest(template);
    if context.skip_unchanged(&digest) {
        return Ok(views::unchanged(&digest));
    }
    Ok(views::tagged_json(template, &digest))
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
    let mut template: Template = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            if document.find_template(&template.name).is_some() {
                template.errors.clear();
                template.errors.add(
                    "name",
                    format!("Template name '{}' is already in use", template.name),
                );
                return Err(AdminError::validation(
                    KIND,
                    &template.name,
                    &template.errors.flatten(),
                    &template,
                ));
            }
            let name = template.name.clone();
            document.templates.push(template);
            saved_template(document, &name)
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
    let submitted: Template = views::parse_body(&body)?;
    let saved = service
        .update(move |document| {
            let position = document
                .templates
                .iter()
                .position(|template| template.name == name)
                .ok_or(AdminError::NotFound)?;
            let digest = regatta::digest(&document.templates[position]);
            context.check_if_match(KIND, &name, &digest)?;
            if submitted.name != name {
                return Err(AdminError::rename(KIND));
            }
            document.templates[position] = submitted;
            saved_template(document, &name)
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
                .templates
                .iter()
                .position(|template| template.name == name)
                .ok_or(AdminError::NotFound)?;
            let users = document.pipelines_using_template(&name);
            if !users.is_empty() {
                return Err(AdminError::Unprocessable {
                    message: format!(
                        "The template '{}' is being referenced by pipeline(s): [{}]",
                        name,
                        users.join(", ")
                    ),
                    data: None,
                });
            }
            document.templates.remove(position);
            Ok(format!(
                "The template '{}' was deleted successfully.",
                name
            ))
        })
        .await?;
    Ok(views::confirmation(message))
}

fn saved_template(
    document: &mut ConfigDocument,
    name: &CaseInsensitiveString,
) -> Result<Template, AdminError> {
    let messages = document.validate();
    let template = document
        .find_template(name)
        .cloned()
        .ok_or_else(|| AdminError::Internal(format!("template '{}' vanished during save", name)))?;
    if !messages.is_empty() {
        return Err(AdminError::validation(KIND, name, &messages, &template));
    }
    Ok(template)
}
