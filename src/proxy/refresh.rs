//! Refresh-and-retry-once around authenticated upstream calls.
//!
//! An expired or rejected access token is refreshed at most once per
//! request; the call is then re-issued in-process with the new token and
//! its outcome returned directly.

use std::future::Future;

use time::OffsetDateTime;

use super::error::ProxyError;
use super::extractor::Authenticated;
use super::state::ProxyState;
use crate::error::Error;
use crate::types::{SessionId, TokenPair};

/// Run `call` with the session's access token, refreshing once on 401.
pub(super) async fn with_refresh<T, F, Fut>(
    state: &ProxyState,
    auth: Authenticated,
    call: F,
) -> Result<T, ProxyError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let Authenticated { session_id, tokens } = auth;

    if tokens.is_expired(OffsetDateTime::now_utc()) {
        tracing::debug!(session_id = %session_id, "Access token expired, refreshing before call");
        let fresh = refresh(state, &session_id, &tokens).await?;
        return call(fresh.access_token).await.map_err(into_proxy_error);
    }

    match call(tokens.access_token.clone()).await {
        Err(e) if e.is_unauthorized() => {
            tracing::info!(session_id = %session_id, "Access token rejected, refreshing");
            let fresh = refresh(state, &session_id, &tokens).await?;
            call(fresh.access_token).await.map_err(into_proxy_error)
        }
        result => result.map_err(ProxyError::Upstream),
    }
}

/// A 401 after a fresh token means the grant itself is gone.
fn into_proxy_error(e: Error) -> ProxyError {
    if e.is_unauthorized() {
        tracing::warn!(error = %e, "Refreshed access token rejected");
        ProxyError::SessionExpired
    } else {
        ProxyError::Upstream(e)
    }
}

/// Replace `stale` with a fresh pair, serialized per stored pair.
async fn refresh(
    state: &ProxyState,
    session_id: &SessionId,
    stale: &TokenPair,
) -> Result<TokenPair, ProxyError> {
    let key = state.store.refresh_key_dyn(session_id);
    let guard = state.refresh_guards.guard(&key);
    let result = {
        let _singleflight = guard.lock().await;
        refresh_locked(state, session_id, stale).await
    };
    drop(guard);
    state.refresh_guards.release(&key);
    result
}

async fn refresh_locked(
    state: &ProxyState,
    session_id: &SessionId,
    stale: &TokenPair,
) -> Result<TokenPair, ProxyError> {
    let current = state
        .store
        .get_dyn(session_id)
        .await
        .map_err(|e| ProxyError::Store(e.to_string()))?;

    // A concurrent request already rotated the pair while we waited.
    if let Some(current) = current {
        if current.access_token != stale.access_token {
            return Ok(current);
        }
    }

    match state.client.refresh_token(&stale.refresh_token).await {
        Ok(fresh) => {
            state
                .store
                .set_dyn(session_id, fresh.clone())
                .await
                .map_err(|e| ProxyError::Store(e.to_string()))?;
            tracing::info!(session_id = %session_id, "Access token refreshed");
            Ok(fresh)
        }
        Err(e) => {
            tracing::error!(error = %e, session_id = %session_id, "Token refresh failed");
            if e.is_client_rejection() {
                if let Err(e) = state.store.remove_dyn(session_id).await {
                    tracing::warn!(error = %e, "Token removal failed after refresh rejection");
                }
            }
            Err(ProxyError::SessionExpired)
        }
    }
}
