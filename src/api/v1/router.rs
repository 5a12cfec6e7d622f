use super::error::*;
use super::handler;
use crate::application_impl::AuthorizationChain;
use crate::application_port::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

/// Bodies above this size are rejected before deserialization.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let sign_up = warp::post()
        .and(warp::path!("authentication" / "sign-up"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::sign_up);

    let sign_in = warp::post()
        .and(warp::path!("authentication" / "sign-in"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::sign_in);

    let refresh_tokens = warp::post()
        .and(warp::path!("authentication" / "refresh-tokens"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh_tokens);

    let sign_out = warp::post()
        .and(warp::path!("authentication" / "sign-out"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::sign_out);

    let google = warp::post()
        .and(warp::path!("authentication" / "google"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::google_sign_in);

    let me = warp::get()
        .and(warp::path!("authentication" / "me"))
        .and(with_authorization(
            server.authorization.clone(),
            EndpointRequirements::bearer(),
        ))
        .and_then(handler::me);

    sign_up
        .or(sign_in)
        .or(refresh_tokens)
        .or(sign_out)
        .or(google)
        .or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Runs the authorization chain against the request's `Authorization`
/// header and extracts the resulting identity.
pub fn with_authorization(
    chain: Arc<AuthorizationChain>,
    requirements: EndpointRequirements,
) -> impl Filter<Extract = (Authentication,), Error = warp::Rejection> + Clone {
    let requirements = Arc::new(requirements);
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |header: Option<String>| {
            let chain = chain.clone();
            let requirements = requirements.clone();
            async move {
                chain
                    .authorize(&requirements, header.as_deref())
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)
            }
        },
    )
}
