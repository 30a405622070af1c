//! In-memory [`TokenStore`] implementations.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use super::traits::{StoreError, TokenStore};
use crate::types::{SessionId, TokenPair};

#[derive(Debug)]
struct StoredTokens {
    tokens: TokenPair,
    stored_at: OffsetDateTime,
}

/// Per-session token store with a time-to-live.
///
/// Entries older than the TTL read as absent; [`purge_expired`](Self::purge_expired)
/// drops them. Clones share the same map.
#[derive(Debug, Clone)]
pub struct SessionTokenStore {
    entries: Arc<RwLock<HashMap<SessionId, StoredTokens>>>,
    ttl: Duration,
}

impl SessionTokenStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            ttl,
        }
    }

    fn is_live(&self, entry: &StoredTokens, now: OffsetDateTime) -> bool {
        now - entry.stored_at < self.ttl
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl TokenStore for SessionTokenStore {
    async fn get(&self, session: &SessionId) -> Result<Option<TokenPair>, StoreError> {
        let now = OffsetDateTime::now_utc();
        let entries = self.entries.read().await;
        Ok(entries
            .get(session)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.tokens.clone()))
    }

    async fn set(&self, session: &SessionId, tokens: TokenPair) -> Result<(), StoreError> {
        let entry = StoredTokens {
            tokens,
            stored_at: OffsetDateTime::now_utc(),
        };
        self.entries.write().await.insert(session.clone(), entry);
        Ok(())
    }

    async fn remove(&self, session: &SessionId) -> Result<(), StoreError> {
        self.entries.write().await.remove(session);
        Ok(())
    }
}

/// A single token pair shared by every session.
///
/// Whoever authenticated last wins; every browser then acts as that athlete.
/// Only meant for single-user deployments. Refreshes are serialized across
/// all sessions since they rotate the same pair.
#[derive(Debug, Clone, Default)]
pub struct SharedTokenStore {
    slot: Arc<RwLock<Option<TokenPair>>>,
}

impl SharedTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for SharedTokenStore {
    async fn get(&self, _session: &SessionId) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, _session: &SessionId, tokens: TokenPair) -> Result<(), StoreError> {
        *self.slot.write().await = Some(tokens);
        Ok(())
    }

    async fn remove(&self, _session: &SessionId) -> Result<(), StoreError> {
        *self.slot.write().await = None;
        Ok(())
    }

    fn refresh_key(&self, _session: &SessionId) -> SessionId {
        SessionId::from(SHARED_REFRESH_KEY)
    }
}

const SHARED_REFRESH_KEY: &str = "shared";
