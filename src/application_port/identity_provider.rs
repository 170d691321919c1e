use crate::application_port::TokenClaims;
use crate::domain_model::*;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct IdentityRejection {
    pub reason: String,
}

impl IdentityRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        IdentityRejection {
            reason: reason.into(),
        }
    }
}

/// The caller-supplied side of authentication. The engine hands request
/// bodies and decoded claims over and gets an identity or a rejection back.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn validate_login(&self, body: serde_json::Value) -> Result<Identity, IdentityRejection>;

    async fn validate_register(
        &self,
        body: serde_json::Value,
    ) -> Result<Identity, IdentityRejection>;

    async fn validate_claims(&self, claims: &TokenClaims) -> Result<Identity, IdentityRejection>;

    /// Claims to embed in both tokens. Must contain a string `sub`.
    fn map_to_claims(&self, identity: &Identity) -> ClaimsMap;
}
