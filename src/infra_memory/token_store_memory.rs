use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    record: TokenRecord,
    deadline: Instant,
}

/// Every this many saves, expired entries nobody touched are swept.
const SWEEP_EVERY: usize = 256;

/// In-process token store with per-key expiry.
///
/// Expired entries are dropped when touched, and swept in bulk every
/// `SWEEP_EVERY` saves. Removal goes through a single `DashMap::remove`, so
/// concurrent deletes of one key have exactly one winner.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, Entry>,
    saves: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.deadline > now);
        before.saturating_sub(self.entries.len())
    }

    fn key(kind: TokenKind, id: &TokenId) -> String {
        format!("{}:{}", kind.keyspace(), id)
    }

    fn live(&self, key: &str) -> Option<(TokenRecord, Instant)> {
        let now = Instant::now();
        let entry = self
            .entries
            .get(key)
            .map(|e| (e.record.clone(), e.deadline));
        match entry {
            Some((record, deadline)) if deadline > now => Some((record, deadline)),
            Some(_) => {
                self.entries.remove_if(key, |_, e| e.deadline <= now);
                None
            }
            None => None,
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, record: &TokenRecord, ttl: Duration) -> Result<(), TokenStoreError> {
        self.entries.insert(
            Self::key(record.kind, &record.id),
            Entry {
                record: record.clone(),
                deadline: Instant::now() + ttl,
            },
        );
        if (self.saves.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn exists(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
        Ok(self.live(&Self::key(kind, id)).is_some())
    }

    async fn get(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        Ok(self.live(&Self::key(kind, id)).map(|(record, _)| record))
    }

    async fn delete(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
        let now = Instant::now();
        match self.entries.remove(&Self::key(kind, id)) {
            Some((_, entry)) => Ok(entry.deadline > now),
            None => Ok(false),
        }
    }

    async fn ttl_remaining(
        &self,
        kind: TokenKind,
        id: &TokenId,
    ) -> Result<Option<Duration>, TokenStoreError> {
        Ok(self
            .live(&Self::key(kind, id))
            .map(|(_, deadline)| deadline - Instant::now()))
    }
}
