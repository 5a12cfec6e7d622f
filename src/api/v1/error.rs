use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, error};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{self, MethodNotAllowed};
use warp::Rejection;

/// Error body shared by every route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
        }
    }
}

/// An `AuthError` carried through warp's rejection machinery.
#[derive(Debug)]
pub struct ApiRejection(pub AuthError);

impl reject::Reject for ApiRejection {}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        ApiRejection(error)
    }
}

pub fn status_of(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Conflict => StatusCode::CONFLICT,
        AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::BadInput(_) => StatusCode::BAD_REQUEST,
        AuthError::Store(_) | AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error_of(error: &AuthError) -> ApiError {
    let status = status_of(error);
    match error {
        AuthError::Conflict => ApiError::new(status, error.to_string()),
        AuthError::Unauthorized(message)
        | AuthError::Forbidden(message)
        | AuthError::BadInput(message) => ApiError::new(status, message.clone()),
        AuthError::Store(_) | AuthError::InternalError(_) => {
            error!(%error, "request failed");
            ApiError::new(status, "Internal server error")
        }
    }
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let body = if let Some(ApiRejection(error)) = err.find::<ApiRejection>() {
        api_error_of(error)
    } else if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "Cannot find the requested resource")
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        debug!(error = %e, "malformed request body");
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<MethodNotAllowed>().is_some() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!(?err, "unhandled rejection");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    let status =
        StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
