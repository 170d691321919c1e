use crate::domain_model::*;
use std::time::Duration;

/// Key-value backing for token records, addressed by kind and id.
///
/// Each kind lives in its own keyspace. Every record carries a store-level
/// TTL set independently of the `expires_at` it mirrors.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Write a record that the store drops after `ttl`.
    async fn save(&self, record: &TokenRecord, ttl: Duration) -> Result<(), TokenStoreError>;

    async fn exists(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError>;

    async fn get(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<TokenRecord>, TokenStoreError>;

    /// Remove a record. Returns `true` only for the caller whose delete
    /// actually removed it.
    async fn delete(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError>;

    /// Remaining store TTL, `None` when the key is absent or has no expiry.
    async fn ttl_remaining(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<Duration>, TokenStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
