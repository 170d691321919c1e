use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const FIELD_SUBJECT: &str = "sub";
const FIELD_HASHED_TOKEN: &str = "hashed_token";
const FIELD_KIND: &str = "kind";
const FIELD_EXPIRES_AT: &str = "expires_at";

/// Token records stored as Redis hashes under `<prefix>:<keyspace>:<jti>`.
///
/// `ConnectionManager` reconnects on its own; a failed command surfaces as
/// `TokenStoreError::Unavailable` and is not retried here.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, kind: TokenKind, id: &TokenId) -> String {
        record_key(&self.prefix, kind, id)
    }
}

fn record_key(prefix: &str, kind: TokenKind, id: &TokenId) -> String {
    format!("{}:{}:{}", prefix, kind.keyspace(), id)
}

fn record_fields(record: &TokenRecord) -> [(&'static str, String); 4] {
    [
        (FIELD_SUBJECT, record.subject.clone()),
        (FIELD_HASHED_TOKEN, record.hashed_secret.clone()),
        (FIELD_KIND, record.kind.to_string()),
        (FIELD_EXPIRES_AT, record.expires_at.to_rfc3339()),
    ]
}

fn record_from_fields(
    id: &TokenId,
    mut fields: HashMap<String, String>,
) -> Result<Option<TokenRecord>, TokenStoreError> {
    if fields.is_empty() {
        return Ok(None);
    }
    let mut take = |name: &str| {
        fields
            .remove(name)
            .ok_or_else(|| TokenStoreError::Corrupt(format!("{}: missing field {}", id, name)))
    };
    let subject = take(FIELD_SUBJECT)?;
    let hashed_secret = take(FIELD_HASHED_TOKEN)?;
    let kind = take(FIELD_KIND)?
        .parse::<TokenKind>()
        .map_err(|e| TokenStoreError::Corrupt(format!("{}: {}", id, e)))?;
    let expires_at = DateTime::parse_from_rfc3339(&take(FIELD_EXPIRES_AT)?)
        .map_err(|e| TokenStoreError::Corrupt(format!("{}: expires_at: {}", id, e)))?
        .with_timezone(&Utc);

    Ok(Some(TokenRecord {
        id: id.clone(),
        subject,
        hashed_secret,
        kind,
        expires_at,
    }))
}

/// Redis expiry is whole seconds; round up so a record never expires early.
fn ttl_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1) as i64
}

fn unavailable(e: redis::RedisError) -> TokenStoreError {
    TokenStoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn save(&self, record: &TokenRecord, ttl: Duration) -> Result<(), TokenStoreError> {
        let key = self.key(record.kind, &record.id);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &record_fields(record))
            .ignore()
            .expire(&key, ttl_secs(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        debug!(%key, ttl_secs = ttl_secs(ttl), "saved token record");
        Ok(())
    }

    async fn exists(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
        let key = self.key(kind, id);
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(&key).await.map_err(unavailable)?;
        Ok(found)
    }

    async fn get(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        let key = self.key(kind, id);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await.map_err(unavailable)?;
        record_from_fields(id, fields)
    }

    async fn delete(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
        let key = self.key(kind, id);
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(&key).await.map_err(unavailable)?;
        debug!(%key, removed, "deleted token record");
        Ok(removed > 0)
    }

    async fn ttl_remaining(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<Duration>, TokenStoreError> {
        let key = self.key(kind, id);
        let mut conn = self.conn.clone();
        // -2: no such key, -1: no expiry
        let secs: i64 = conn.ttl(&key).await.map_err(unavailable)?;
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }
}
