use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let api_error = if let Some(api_error) = err.find::<ApiError>() {
        api_error.clone()
    } else if err.is_not_found() {
        ApiError::new(ApiErrorCode::NotFound, "Not Found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(ApiErrorCode::BadRequest, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::new(ApiErrorCode::PayloadTooLarge, "Payload Too Large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ApiError::new(ApiErrorCode::LengthRequired, "Length Required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(ApiErrorCode::MethodNotAllowed, "Method Not Allowed")
    } else {
        error!("unhandled rejection: {:?}", err);
        ApiError::new(ApiErrorCode::InternalError, "Internal error")
    };

    let status = api_error.code.status();
    let json = warp::reply::json(&ErrorResponse {
        success: false,
        error: api_error,
    });
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Token was not provided")]
    MissingCredential,
    #[error("Invalid Token")]
    InvalidToken,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Bad Session Request")]
    BadSessionRequest,
    #[error("Bad Request")]
    BadRequest,
    #[error("Not Found")]
    NotFound,
    #[error("Payload Too Large")]
    PayloadTooLarge,
    #[error("Length Required")]
    LengthRequired,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Service Unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingCredential
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorCode::BadSessionRequest => StatusCode::FORBIDDEN,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::LengthRequired => StatusCode::LENGTH_REQUIRED,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> ApiError {
        warn!("Internal error: {}", error);
        ApiError::new(ApiErrorCode::InternalError, ApiErrorCode::InternalError.to_string())
    }

    pub fn unavailable<E: std::fmt::Display>(error: E) -> ApiError {
        warn!("Dependency unavailable: {}", error);
        ApiError::new(
            ApiErrorCode::ServiceUnavailable,
            ApiErrorCode::ServiceUnavailable.to_string(),
        )
    }

    /// Logout reports unusable tokens as a bad session request instead of a 401.
    pub fn for_logout(error: AuthError) -> ApiError {
        match error {
            AuthError::InvalidToken => ApiError::new(
                ApiErrorCode::BadSessionRequest,
                ApiErrorCode::BadSessionRequest.to_string(),
            ),
            other => other.into(),
        }
    }
}

impl reject::Reject for ApiError {}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredential => ApiError::new(
                ApiErrorCode::MissingCredential,
                ApiErrorCode::MissingCredential.to_string(),
            ),
            AuthError::InvalidToken => ApiError::new(
                ApiErrorCode::InvalidToken,
                ApiErrorCode::InvalidToken.to_string(),
            ),
            // reasons come from the identity provider and are meant for clients
            AuthError::Unauthorized(reason) => ApiError::new(ApiErrorCode::Unauthorized, reason),
            AuthError::DependencyUnavailable(e) => ApiError::unavailable(e),
            AuthError::Configuration(e) => ApiError::internal(e),
        }
    }
}
