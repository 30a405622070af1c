use derive_more::{Display, From, Into};
use serde::Deserialize;
use time::OffsetDateTime;

/// Access/refresh token pair issued by the Strava token endpoint.
///
/// Replaced wholesale on every successful code exchange or refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, when the token endpoint reported one.
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the access token is known to have expired at `now`.
    ///
    /// Pairs without a reported expiry are never considered expired; the
    /// upstream 401 is the only signal for those.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Opaque identifier of a browser session (value of the session cookie).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into)]
pub struct SessionId(pub String);

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl SessionId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pagination parameters forwarded verbatim to the starred segments endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub per_page: Option<String>,
}

impl PageParams {
    /// Query pairs for the parameters that were actually supplied.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(page) = &self.page {
            pairs.push(("page", page.as_str()));
        }
        if let Some(per_page) = &self.per_page {
            pairs.push(("per_page", per_page.as_str()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn pair_without_expiry_never_expires() {
        let pair = TokenPair::new("A1", "R1");
        assert!(!pair.is_expired(OffsetDateTime::now_utc() + Duration::days(365)));
    }

    #[test]
    fn pair_expires_at_reported_time() {
        let now = OffsetDateTime::now_utc();
        let pair = TokenPair::new("A1", "R1").with_expires_at(now);
        assert!(pair.is_expired(now));
        assert!(!pair.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn session_id_from_string() {
        let id = SessionId::from("sess-abc".to_string());
        assert_eq!(id.to_string(), "sess-abc");
        assert_eq!(id.as_str(), "sess-abc");
    }

    #[test]
    fn page_params_skip_missing_values() {
        let params = PageParams {
            page: Some("2".into()),
            per_page: None,
        };
        assert_eq!(params.query_pairs(), vec![("page", "2")]);
        assert!(PageParams::default().query_pairs().is_empty());
    }

    #[test]
    fn page_params_are_kept_verbatim() {
        let params: PageParams =
            serde_json::from_value(serde_json::json!({"page": "03", "per_page": "abc"})).unwrap();
        assert_eq!(params.query_pairs(), vec![("page", "03"), ("per_page", "abc")]);
    }
}
