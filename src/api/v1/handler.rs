use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// A provider ID token, e.g. the credential returned by Google Sign-In.
#[derive(Debug, Deserialize)]
pub struct IdTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

pub async fn sign_up(
    body: SignUpRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignUpInput {
        email: body.email,
        password: body.password,
        role: body.role,
        permissions: body.permissions,
    };
    let id = auth_service
        .sign_up(input)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&SignUpResponse { id }),
        StatusCode::CREATED,
    ))
}

pub async fn sign_in(
    body: SignInRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignInInput {
        email: body.email,
        password: body.password,
    };
    let tokens = auth_service
        .sign_in(input)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

pub async fn google_sign_in(
    body: IdTokenRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .authenticate_external(&body.token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

pub async fn refresh_tokens(
    body: RefreshTokenRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh_tokens(&body.refresh_token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

pub async fn sign_out(
    body: RefreshTokenRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .sign_out(&body.refresh_token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(authentication: Authentication) -> Result<impl warp::Reply, warp::Rejection> {
    let user = authentication
        .user()
        .ok_or_else(|| reject::custom(ApiRejection::from(AuthError::unauthorized())))?;

    Ok(warp::reply::json(user))
}
