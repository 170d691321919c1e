use crate::application_port::IdentityRejection;
use crate::domain_model::*;
use crate::domain_port::TokenStoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors surfaced by the token lifecycle.
///
/// `InvalidToken` deliberately covers every reason a token is refused, so
/// callers cannot probe token state.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credential presented")]
    MissingCredential,
    #[error("token invalid")]
    InvalidToken,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<TokenStoreError> for AuthError {
    fn from(error: TokenStoreError) -> Self {
        match error {
            // a record that cannot be read back cannot be honored
            TokenStoreError::Corrupt(_) => AuthError::InvalidToken,
            TokenStoreError::Unavailable(e) => AuthError::DependencyUnavailable(e),
        }
    }
}

impl From<IdentityRejection> for AuthError {
    fn from(rejection: IdentityRejection) -> Self {
        AuthError::Unauthorized(rejection.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud.clone()],
            Audience::Many(auds) => auds.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Audience::One(aud) => aud.is_empty(),
            Audience::Many(auds) => auds.iter().all(|aud| aud.is_empty()),
        }
    }
}

/// Decoded token payload.
///
/// `jti` and `tokenType` are optional on the wire so that tokens minted
/// without them still decode; the engine rejects them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<TokenId>,
    #[serde(
        rename = "tokenType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_type: Option<TokenKind>,
    #[serde(flatten)]
    pub extra: ClaimsMap,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub identity: Identity,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    AlreadyExpired,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    /// Sign a token of `kind` with that kind's secret and lifetime.
    async fn sign(
        &self,
        kind: TokenKind,
        jti: &TokenId,
        sub: &str,
        extra: &ClaimsMap,
    ) -> Result<SignedToken, CodecError>;

    /// Check signature, expiry, issuer and audience against `kind`'s secret.
    async fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, CodecError>;

    /// Configured lifetime of tokens of `kind`.
    fn lifetime(&self, kind: TokenKind) -> Duration;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, secret: &str) -> Result<String, AuthError>;
    async fn verify(&self, digest: &str, secret: &str) -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn issue(&self, identity: &Identity) -> Result<AuthTokens, AuthError>;
    async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError>;
    async fn rotate(&self, credential: Option<&str>) -> Result<AuthTokens, AuthError>;
    async fn revoke(&self, credential: Option<&str>) -> Result<RevokeOutcome, AuthError>;
    async fn login(&self, body: serde_json::Value) -> Result<LoginResult, AuthError>;
    async fn register(&self, body: serde_json::Value) -> Result<LoginResult, AuthError>;
}
