use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::ProxySettings;
use super::traits::TokenStoreDyn;
use crate::oauth::StravaClient;
use crate::types::SessionId;

/// Shared state for proxy route handlers.
#[derive(Clone)]
pub(super) struct ProxyState {
    pub(super) client: Arc<StravaClient>,
    pub(super) store: Arc<dyn TokenStoreDyn>,
    pub(super) refresh_guards: Arc<RefreshGuards>,
    pub(super) settings: ProxySettings,
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<ProxyState> for Key {
    fn from_ref(state: &ProxyState) -> Self {
        state.settings.cookie_key.clone()
    }
}

/// Per-session locks serializing token refreshes.
#[derive(Default)]
pub(super) struct RefreshGuards {
    guards: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RefreshGuards {
    /// Lock handle for `session`, created on first use.
    pub(super) fn guard(&self, session: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        guards.entry(session.clone()).or_default().clone()
    }

    /// Drop the lock handle for `session` once no request holds it.
    pub(super) fn release(&self, session: &SessionId) {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        if guards
            .get(session)
            .is_some_and(|guard| Arc::strong_count(guard) == 1)
        {
            guards.remove(session);
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
