use log::error;
use regatta::ApiMessage;
use warp::http::StatusCode;
use warp::Reply;

use crate::security::Security;

pub use regatta::MEDIA_TYPE;

/// Request headers each handler checks before touching the document.
#[derive(Debug, Clone)]
pub struct Context {
    pub security: Security,
    pub accept: Option<String>,
    pub authorization: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
}

impl Context {
    /// Media-type gate first, credentials second: a request without the
    /// vendored Accept gets the generic 404 and learns nothing.
    pub fn authorize(&self) -> Result<(), AdminError> {
        if !accepts_api(self.accept.as_deref()) {
            return Err(AdminError::NotFound);
        }
        if !self.security.allows(self.authorization.as_deref()) {
            return Err(AdminError::Unauthorized);
        }
        Ok(())
    }

    /// If-Match must carry the current digest; quotes around it are ignored.
    pub fn check_if_match(
        &self,
        kind: &'static str,
        name: impl std::fmt::Display,
        digest: &str,
    ) -> Result<(), AdminError> {
        match self.if_match.as_deref() {
            Some(provided) if strip_quotes(provided) == digest => Ok(()),
            _ => Err(AdminError::Stale {
                kind,
                name: name.to_string(),
            }),
        }
    }

    pub fn skip_unchanged(&self, digest: &str) -> bool {
        self.if_none_match.as_deref().map(strip_quotes) == Some(digest)
    }
}

fn accepts_api(accept: Option<&str>) -> bool {
    match accept {
        Some(header) => header
            .split(',')
            .filter_map(|part| part.trim().split(';').next())
            .any(|mime| mime == MEDIA_TYPE),
        None => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(
        "Either the resource you requested was not found, or you are not authorized \
         to perform this action."
    )]
    NotFound,
    #[error("You are not authorized to perform this action.")]
    Unauthorized,
    #[error(
        "Someone has modified the configuration for {kind} '{name}'. Please update \
         your copy of the config with the changes."
    )]
    Stale { kind: &'static str, name: String },
    #[error("{message}")]
    Unprocessable {
        message: String,
        data: Option<serde_json::Value>,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl AdminError {
    pub fn rename(kind: &str) -> AdminError {
        AdminError::Unprocessable {
            message: format!("Renaming of {} is not supported by this API.", kind),
            data: None,
        }
    }

    pub fn remote(
        kind: &str,
        name: impl std::fmt::Display,
        origin: impl std::fmt::Display,
    ) -> AdminError {
        AdminError::Unprocessable {
            message: format!(
                "Can not operate on {} '{}' as it is defined remotely in '{}'.",
                kind, name, origin
            ),
            data: None,
        }
    }

    /// The 422 body of a failed save: the flattened messages plus the entity
    /// with its embedded errors.
    pub fn validation<T: serde::Serialize>(
        kind: &str,
        name: impl std::fmt::Display,
        messages: &[String],
        entity: &T,
    ) -> AdminError {
        AdminError::Unprocessable {
            message: format!(
                "Validations failed for {} '{}'. Error(s): [{}]. Please correct and resubmit.",
                kind,
                name,
                messages.join(", ")
            ),
            data: serde_json::to_value(entity).ok(),
        }
    }

    pub fn to_reply(self) -> warp::reply::Response {
        if let AdminError::Internal(detail) = &self {
            error!("{}", detail);
        }
        let status = match &self {
            AdminError::NotFound => StatusCode::NOT_FOUND,
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::Stale { .. } => StatusCode::PRECONDITION_FAILED,
            AdminError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            AdminError::Unprocessable {
                message,
                data: Some(data),
            } => ApiMessage::with_data(message, data),
            AdminError::Internal(_) => ApiMessage::new("Internal server error"),
            other => ApiMessage::new(other.to_string()),
        };
        let reply = warp::reply::with_status(warp::reply::json(&message), status);
        if status == StatusCode::UNAUTHORIZED {
            warp::reply::with_header(reply, "WWW-Authenticate", "Basic realm=\"regatta\"")
                .into_response()
        } else {
            reply.into_response()
        }
    }
}

/// Quoted entity tag for a digest.
pub fn etag(digest: &str) -> String {
    format!("\"{}\"", digest)
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"')
}

pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AdminError> {
    serde_json::from_slice(body)
        .map_err(|err| AdminError::BadRequest(format!("Could not parse the request body: {}", err)))
}

/// 200 entity body carrying its tag.
pub fn tagged_json<T: serde::Serialize>(entity: &T, digest: &str) -> warp::reply::Response {
    warp::reply::with_header(warp::reply::json(entity), "ETag", etag(digest)).into_response()
}

/// 304 with the tag and no body.
pub fn unchanged(digest: &str) -> warp::reply::Response {
    warp::reply::with_status(
        warp::reply::with_header(warp::reply::reply(), "ETag", etag(digest)),
        StatusCode::NOT_MODIFIED,
    )
    .into_response()
}

/// Plain 200 JSON, for collection listings.
pub fn plain_json<T: serde::Serialize>(body: &T) -> warp::reply::Response {
    warp::reply::json(body).into_response()
}

/// 200 confirmation message.
pub fn confirmation(message: impl Into<String>) -> warp::reply::Response {
    warp::reply::json(&ApiMessage::new(message)).into_response()
}

pub fn respond(result: Result<warp::reply::Response, AdminError>) -> warp::reply::Response {
    match result {
        Ok(reply) => reply,
        Err(err) => err.to_reply(),
    }
}

pub mod config_repos;
pub mod environments;
pub mod packages;
pub mod pipelines;
pub mod repositories;
pub mod templates;
pub mod users;

#[cfg(test)]
mod test {
    use super::*;

    fn context(accept: Option<&str>) -> Context {
        Context {
            security: Security::disabled(),
            accept: accept.map(String::from),
            authorization: None,
            if_match: None,
            if_none_match: None,
        }
    }

    #[test]
    fn the_vendored_media_type_is_required() {
        assert!(context(Some(MEDIA_TYPE)).authorize().is_ok());
        assert!(context(Some("application/json")).authorize().is_err());
        assert!(context(None).authorize().is_err());
    }

    #[test]
    fn the_media_type_may_come_with_others() {
        let header = format!("application/json, {};q=0.9", MEDIA_TYPE);
        assert!(context(Some(&header)).authorize().is_ok());
    }

    #[test]
    fn if_match_comparison_ignores_quotes() {
        let mut ctx = context(Some(MEDIA_TYPE));
        ctx.if_match = Some("\"abc123\"".to_string());
        assert!(ctx.check_if_match("pipeline", "build", "abc123").is_ok());
        ctx.if_match = Some("abc123".to_string());
        assert!(ctx.check_if_match("pipeline", "build", "abc123").is_ok());
        ctx.if_match = Some("\"stale\"".to_string());
        let err = ctx.check_if_match("pipeline", "build", "abc123").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Someone has modified the configuration for pipeline 'build'. Please \
             update your copy of the config with the changes."
        );
    }

    #[test]
    fn missing_if_match_is_stale() {
        let ctx = context(Some(MEDIA_TYPE));
        assert!(ctx.check_if_match("pipeline", "build", "abc123").is_err());
    }
}
