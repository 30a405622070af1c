use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ProxyError;
use super::state::ProxyState;
use crate::types::{SessionId, TokenPair};

/// Session of the current request, as resolved by the session middleware.
#[derive(Debug, Clone)]
pub(super) struct CurrentSession(pub(super) SessionId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ProxyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .map(Self)
            .ok_or(ProxyError::Unauthenticated)
    }
}

/// Session that has a stored token pair.
///
/// Use as an Axum extractor in route handlers. Rejects with
/// `401 Unauthorized` before any upstream call when no tokens are stored.
#[derive(Debug, Clone)]
pub(super) struct Authenticated {
    pub(super) session_id: SessionId,
    pub(super) tokens: TokenPair,
}

impl FromRequestParts<ProxyState> for Authenticated {
    type Rejection = ProxyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ProxyState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentSession(session_id) = CurrentSession::from_request_parts(parts, state).await?;

        let tokens = state
            .store
            .get_dyn(&session_id)
            .await
            .map_err(|e| ProxyError::Store(e.to_string()))?
            .ok_or(ProxyError::Unauthenticated)?;

        Ok(Self { session_id, tokens })
    }
}
