use super::error::*;
use super::extractor::{Extractor, MAX_BODY_BYTES, credential};
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::Identity;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let user = warp::get()
        .and(warp::path("user"))
        .and(warp::path::end())
        .and(with_identity(
            server.auth_service.clone(),
            server.access_extractor.clone(),
        ))
        .and_then(handler::user);

    let refresh = warp::get()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(credential(server.refresh_extractor.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(credential(server.access_extractor.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    mount(&server.base_path).and(login.or(register).or(user).or(refresh).or(logout))
}

/// Match each non-empty segment of `base_path` in turn.
fn mount(base_path: &str) -> BoxedFilter<()> {
    base_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |prefix, segment| {
            prefix.and(warp::path(segment.to_string())).boxed()
        })
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_identity(
    auth_service: Arc<dyn AuthService>,
    extractor: Extractor,
) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
    credential(extractor).and_then(move |credential: Option<String>| {
        let auth_service = auth_service.clone();
        async move {
            auth_service
                .authenticate(credential.as_deref())
                .await
                .map_err(ApiError::from)
                .map_err(reject::custom)
        }
    })
}
