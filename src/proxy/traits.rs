use std::future::Future;
use std::pin::Pin;

use crate::types::{SessionId, TokenPair};

/// Error type returned by [`TokenStore`] implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Token pair persistence, keyed by browser session.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for RedisTokens {
///     async fn get(&self, session: &SessionId) -> Result<Option<TokenPair>, StoreError> {
///         self.redis.hget(session.as_str()).await
///     }
///     // ...
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    /// Look up the pair stored for `session`.
    fn get(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<Option<TokenPair>, StoreError>> + Send;

    /// Store `tokens` for `session`, replacing any previous pair.
    fn set(
        &self,
        session: &SessionId,
        tokens: TokenPair,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Forget the pair of `session` (logout).
    fn remove(&self, session: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Key under which refreshes of `session`'s pair are serialized.
    ///
    /// Stores that share one pair between sessions must map every session
    /// to the same key.
    fn refresh_key(&self, session: &SessionId) -> SessionId {
        session.clone()
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe wrapper for TokenStore (needed for Arc<dyn>).
pub(super) trait TokenStoreDyn: Send + Sync {
    fn get_dyn<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<TokenPair>, StoreError>>;

    fn set_dyn<'a>(
        &'a self,
        session: &'a SessionId,
        tokens: TokenPair,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn remove_dyn<'a>(&'a self, session: &'a SessionId) -> BoxFuture<'a, Result<(), StoreError>>;

    fn refresh_key_dyn(&self, session: &SessionId) -> SessionId;
}

impl<T: TokenStore> TokenStoreDyn for T {
    fn get_dyn<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<TokenPair>, StoreError>> {
        Box::pin(self.get(session))
    }

    fn set_dyn<'a>(
        &'a self,
        session: &'a SessionId,
        tokens: TokenPair,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.set(session, tokens))
    }

    fn remove_dyn<'a>(&'a self, session: &'a SessionId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.remove(session))
    }

    fn refresh_key_dyn(&self, session: &SessionId) -> SessionId {
        self.refresh_key(session)
    }
}
