use serde::Deserialize;
use std::collections::HashMap;
use warp::Filter;
use warp::filters::BoxedFilter;
use warp::http::HeaderMap;
use warp::http::header::AUTHORIZATION;
use warp::hyper::body::Bytes;

/// The parts of a request a credential can be pulled from.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub headers: HeaderMap,
    pub query: String,
    pub body: Option<serde_json::Value>,
}

/// Where to find the bearer credential in a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum Extractor {
    /// Raw value of a named header.
    Header { name: String },
    /// String field of a JSON body.
    BodyField { field: String },
    /// URL query parameter.
    QueryParam { param: String },
    /// `Authorization: <scheme> <value>`, scheme compared case-insensitively.
    AuthScheme { scheme: String },
}

impl Default for Extractor {
    fn default() -> Self {
        Self::bearer()
    }
}

impl Extractor {
    pub fn bearer() -> Self {
        Extractor::AuthScheme {
            scheme: "bearer".to_string(),
        }
    }

    pub fn extract(&self, parts: &RequestParts) -> Option<String> {
        match self {
            Extractor::Header { name } => parts
                .headers
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            Extractor::BodyField { field } => parts
                .body
                .as_ref()
                .and_then(|body| body.get(field))
                .and_then(|value| value.as_str())
                .map(str::to_string),
            Extractor::QueryParam { param } => {
                serde_urlencoded::from_str::<HashMap<String, String>>(&parts.query)
                    .ok()
                    .and_then(|mut query| query.remove(param))
            }
            Extractor::AuthScheme { scheme } => {
                let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
                let (found, value) = parse_auth_header(header)?;
                found
                    .eq_ignore_ascii_case(scheme)
                    .then(|| value.to_string())
            }
        }
    }
}

/// Split `<scheme> <value>` on whitespace.
fn parse_auth_header(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split_whitespace();
    Some((parts.next()?, parts.next()?))
}

/// Largest request body read while looking for a credential or a login.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Filter yielding the credential `extractor` finds, if any.
///
/// Only `BodyField` reads the body, and only up to `MAX_BODY_BYTES` with a
/// declared `Content-Length`.
pub fn credential(extractor: Extractor) -> BoxedFilter<(Option<String>,)> {
    let query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();
    let parts = warp::header::headers_cloned()
        .and(query)
        .map(|headers: HeaderMap, query: String| RequestParts {
            headers,
            query,
            body: None,
        });

    match extractor {
        Extractor::BodyField { .. } => parts
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::bytes())
            .map(move |parts: RequestParts, body: Bytes| {
                let parts = RequestParts {
                    body: serde_json::from_slice(&body).ok(),
                    ..parts
                };
                extractor.extract(&parts)
            })
            .boxed(),
        _ => parts
            .map(move |parts: RequestParts| extractor.extract(&parts))
            .boxed(),
    }
}
