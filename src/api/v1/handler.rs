use super::error::*;
use crate::application_port::*;
use crate::domain_model::Identity;
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: Identity,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

fn created(login_result: LoginResult) -> impl warp::Reply {
    let response = SessionResponse {
        identity: login_result.identity,
        tokens: login_result.tokens,
    };
    warp::reply::with_status(warp::reply::json(&response), StatusCode::CREATED)
}

pub async fn login(
    body: serde_json::Value,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .login(body)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(created(login_result))
}

pub async fn register(
    body: serde_json::Value,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .register(body)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(created(login_result))
}

pub async fn user(identity: Identity) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&IdentityResponse { identity }))
}

pub async fn refresh(
    credential: Option<String>,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .rotate(credential.as_deref())
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

pub async fn logout(
    credential: Option<String>,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = auth_service
        .revoke(credential.as_deref())
        .await
        .map_err(ApiError::for_logout)
        .map_err(reject::custom)?;

    let message = match outcome {
        RevokeOutcome::Revoked => "Session ended",
        RevokeOutcome::AlreadyRevoked => "Session already ended",
        RevokeOutcome::AlreadyExpired => "Session already expired",
    };
    Ok(warp::reply::json(&LogoutResponse { message }))
}
