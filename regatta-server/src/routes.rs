use warp::Filter;
use warp::Reply;

use crate::security::Security;
use crate::service::{self, ConfigService};
use crate::views;

pub fn routes(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    pipelines(service.clone(), security.clone())
        .or(templates(service.clone(), security.clone()))
        .or(environments(service.clone(), security.clone()))
        .or(repositories(service.clone(), security.clone()))
        .or(packages(service.clone(), security.clone()))
        .or(config_repos(service.clone(), security.clone()))
        .or(users(service, security))
        .or(unresolved())
}

fn pipelines(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "pipelines")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::pipelines::list);
    let get = warp::path!("api" / "admin" / "pipelines" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::pipelines::get);
    let create = warp::path!("api" / "admin" / "pipelines")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::pipelines::create);
    let update = warp::path!("api" / "admin" / "pipelines" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::pipelines::update);
    let delete = warp::path!("api" / "admin" / "pipelines" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::pipelines::delete);
    list.or(get).or(create).or(update).or(delete)
}

fn templates(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "templates")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::templates::list);
    let get = warp::path!("api" / "admin" / "templates" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::templates::get);
    let create = warp::path!("api" / "admin" / "templates")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::templates::create);
    let update = warp::path!("api" / "admin" / "templates" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::templates::update);
    let delete = warp::path!("api" / "admin" / "templates" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::templates::delete);
    list.or(get).or(create).or(update).or(delete)
}

fn environments(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "environments")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::environments::list);
    let get = warp::path!("api" / "admin" / "environments" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::environments::get);
    let create = warp::path!("api" / "admin" / "environments")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::environments::create);
    let update = warp::path!("api" / "admin" / "environments" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::environments::update);
    let patch = warp::path!("api" / "admin" / "environments" / String)
        .and(warp::patch())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::environments::patch);
    let delete = warp::path!("api" / "admin" / "environments" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::environments::delete);
    list.or(get).or(create).or(update).or(patch).or(delete)
}

fn repositories(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "repositories")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::repositories::list);
    let get = warp::path!("api" / "admin" / "repositories" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::repositories::get);
    let create = warp::path!("api" / "admin" / "repositories")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::repositories::create);
    let update = warp::path!("api" / "admin" / "repositories" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::repositories::update);
    let delete = warp::path!("api" / "admin" / "repositories" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::repositories::delete);
    list.or(get).or(create).or(update).or(delete)
}

fn packages(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "packages")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::packages::list);
    let get = warp::path!("api" / "admin" / "packages" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::packages::get);
    let create = warp::path!("api" / "admin" / "packages")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::packages::create);
    let update = warp::path!("api" / "admin" / "packages" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::packages::update);
    let delete = warp::path!("api" / "admin" / "packages" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::packages::delete);
    list.or(get).or(create).or(update).or(delete)
}

fn config_repos(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "config_repos")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::config_repos::list);
    let get = warp::path!("api" / "admin" / "config_repos" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::config_repos::get);
    let create = warp::path!("api" / "admin" / "config_repos")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::config_repos::create);
    let update = warp::path!("api" / "admin" / "config_repos" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::config_repos::update);
    let delete = warp::path!("api" / "admin" / "config_repos" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::config_repos::delete);
    list.or(get).or(create).or(update).or(delete)
}

fn users(
    service: ConfigService,
    security: Security,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "admin" / "users")
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::users::list);
    let get = warp::path!("api" / "admin" / "users" / String)
        .and(warp::get())
        .and(with_context(security.clone()))
        .and(service::with(service.clone()))
        .and_then(views::users::get);
    let create = warp::path!("api" / "admin" / "users")
        .and(warp::post())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::users::create);
    let update = warp::path!("api" / "admin" / "users" / String)
        .and(warp::put())
        .and(with_context(security.clone()))
        .and(warp::body::bytes())
        .and(service::with(service.clone()))
        .and_then(views::users::update);
    let delete = warp::path!("api" / "admin" / "users" / String)
        .and(warp::delete())
        .and(with_context(security))
        .and(service::with(service))
        .and_then(views::users::delete);
    list.or(get).or(create).or(update).or(delete)
}

/// Headers every handler consults, bundled with the credential check.
fn with_context(
    security: Security,
) -> impl Filter<Extract = (views::Context,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("accept")
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::header::optional::<String>("if-match"))
        .and(warp::header::optional::<String>("if-none-match"))
        .map(
            move |accept: Option<String>,
                  authorization: Option<String>,
                  if_match: Option<String>,
                  if_none_match: Option<String>| {
                views::Context {
                    security: security.clone(),
                    accept,
                    authorization,
                    if_match,
                    if_none_match,
                }
            },
        )
}

/// Requests nothing matched share the body of an unauthorized lookup, so
/// probing paths reveals nothing about what exists.
fn unresolved() -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::any().and_then(|| async { Ok::<_, warp::Rejection>(views::AdminError::NotFound.to_reply()) })
}
