use std::path::PathBuf;

use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use time::Duration;
use url::Url;

use super::error::ProxyError;
use crate::oauth::{OAuthConfig, StravaClient};

/// Where token pairs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenScope {
    /// One token pair per browser session.
    #[default]
    Session,
    /// A single token pair shared by every browser. Only suitable for
    /// single-user deployments: concurrent users overwrite each other.
    Global,
}

impl std::str::FromStr for TokenScope {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "global" => Ok(Self::Global),
            other => Err(ProxyError::Config(format!(
                "TOKEN_SCOPE must be `session` or `global`, got `{other}`"
            ))),
        }
    }
}

/// Shared settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct ProxySettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
    pub(crate) static_dir: Option<PathBuf>,
    pub(crate) token_scope: TokenScope,
}

impl ProxySettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "strava_proxy_sid".into(),
            session_ttl: Duration::hours(24),
            secure_cookies: false,
            auth_path: "/auth".into(),
            login_redirect: "/segments.html".into(),
            logout_redirect: "/".into(),
            error_redirect: "/".into(),
            static_dir: None,
            token_scope: TokenScope::Session,
        }
    }
}

/// Proxy configuration.
///
/// Use [`from_env()`](ProxyConfig::from_env) for convention-based setup,
/// or [`new()`](ProxyConfig::new) with `with_*` methods for full control.
pub struct ProxyConfig {
    pub(super) client: StravaClient,
    pub(super) settings: ProxySettings,
}

impl ProxyConfig {
    /// Create config with the required `StravaClient`.
    ///
    /// All optional fields use defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(client: StravaClient) -> Self {
        Self {
            client,
            settings: ProxySettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CLIENT_ID`, `CLIENT_SECRET`: Strava API application credentials
    /// - `REDIRECT_URI`: OAuth2 callback URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `SECRET`: cookie encryption secret (ephemeral key when unset)
    /// - `STATIC_DIR`: front-end asset directory (default `public`)
    /// - `TOKEN_SCOPE`: `session` (default) or `global`
    /// - `SESSION_TTL_HOURS`: session token lifetime (default 24)
    /// - `SECURE_COOKIES`: `"1"` or `"true"` to mark cookies `Secure`
    /// - `STRAVA_AUTH_URL`, `STRAVA_TOKEN_URL`, `STRAVA_API_URL`: endpoint overrides
    /// - `STRAVA_SCOPES`: comma-separated scopes
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, ProxyError> {
        let client_id = required_var("CLIENT_ID")?;
        let client_secret = required_var("CLIENT_SECRET")?;
        let redirect_uri: Url = required_var("REDIRECT_URI")?
            .parse()
            .map_err(|e| ProxyError::Config(format!("REDIRECT_URI: {e}")))?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, redirect_uri);
        if let Some(url) = url_var("STRAVA_AUTH_URL")? {
            oauth = oauth.with_auth_url(url);
        }
        if let Some(url) = url_var("STRAVA_TOKEN_URL")? {
            oauth = oauth.with_token_url(url);
        }
        if let Some(url) = url_var("STRAVA_API_URL")? {
            oauth = oauth.with_api_url(url);
        }
        if let Ok(scopes) = std::env::var("STRAVA_SCOPES") {
            oauth = oauth.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }

        let mut config = Self::new(StravaClient::new(oauth));

        match std::env::var("SECRET") {
            Ok(secret) if !secret.is_empty() => {
                config = config.with_cookie_key(cookie_key_from_secret(&secret)?);
            }
            _ => tracing::warn!("SECRET is not set; sessions will not survive a restart"),
        }

        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "public".into());
        config = config.with_static_dir(static_dir);

        if let Ok(scope) = std::env::var("TOKEN_SCOPE") {
            config = config.with_token_scope(scope.parse()?);
        }

        if let Ok(hours) = std::env::var("SESSION_TTL_HOURS") {
            config = config.with_session_ttl(parse_session_ttl(&hours)?);
        }

        let secure = matches!(
            std::env::var("SECURE_COOKIES").as_deref(),
            Ok("1") | Ok("true"),
        );

        Ok(config.with_secure_cookies(secure))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.settings.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.static_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_token_scope(mut self, scope: TokenScope) -> Self {
        self.settings.token_scope = scope;
        self
    }

    /// Configured token scope.
    #[must_use]
    pub fn token_scope(&self) -> TokenScope {
        self.settings.token_scope
    }

    /// Lifetime of a session's stored tokens.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.settings.session_ttl
    }
}

/// Derive the 64-byte cookie encryption key from an arbitrary-length secret.
///
/// # Errors
///
/// Returns [`ProxyError::Config`] if the derived key is rejected.
pub fn cookie_key_from_secret(secret: &str) -> Result<Key, ProxyError> {
    let digest = Sha512::digest(secret.as_bytes());
    Key::try_from(digest.as_slice())
        .map_err(|e| ProxyError::Config(format!("SECRET: {e}")))
}

/// Parse `SESSION_TTL_HOURS`: a positive whole number of hours.
fn parse_session_ttl(hours: &str) -> Result<Duration, ProxyError> {
    let hours: i64 = hours
        .trim()
        .parse()
        .map_err(|e| ProxyError::Config(format!("SESSION_TTL_HOURS: {e}")))?;
    if hours <= 0 {
        return Err(ProxyError::Config(format!(
            "SESSION_TTL_HOURS must be positive, got {hours}"
        )));
    }
    hours
        .checked_mul(3600)
        .map(Duration::seconds)
        .ok_or_else(|| ProxyError::Config(format!("SESSION_TTL_HOURS is too large: {hours}")))
}

fn required_var(name: &str) -> Result<String, ProxyError> {
    std::env::var(name).map_err(|_| ProxyError::Config(format!("{name} is required")))
}

fn url_var(name: &str) -> Result<Option<Url>, ProxyError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ProxyError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProxyConfig {
        let oauth = OAuthConfig::new(
            "id",
            "secret",
            "http://localhost:3000/auth/callback".parse().unwrap(),
        );
        ProxyConfig::new(StravaClient::new(oauth))
    }

    #[test]
    fn cookie_key_is_deterministic() {
        let k1 = cookie_key_from_secret("keyboard cat").unwrap();
        let k2 = cookie_key_from_secret("keyboard cat").unwrap();
        let k3 = cookie_key_from_secret("another secret").unwrap();
        assert_eq!(k1.master(), k2.master());
        assert_ne!(k1.master(), k3.master());
    }

    #[test]
    fn short_secrets_are_accepted() {
        assert!(cookie_key_from_secret("x").is_ok());
    }

    #[test]
    fn session_ttl_parsing() {
        assert_eq!(parse_session_ttl("24").unwrap(), Duration::hours(24));
        assert_eq!(parse_session_ttl(" 1 ").unwrap(), Duration::hours(1));
        for bad in ["0", "-5", "abc", "9223372036854775807"] {
            assert!(
                matches!(parse_session_ttl(bad), Err(ProxyError::Config(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn token_scope_parsing() {
        assert_eq!("session".parse::<TokenScope>().unwrap(), TokenScope::Session);
        assert_eq!(" Global ".parse::<TokenScope>().unwrap(), TokenScope::Global);
        assert!(matches!(
            "per-user".parse::<TokenScope>(),
            Err(ProxyError::Config(_))
        ));
    }

    #[test]
    fn defaults_match_the_front_end_contract() {
        let config = test_config();
        assert_eq!(config.settings.auth_path, "/auth");
        assert_eq!(config.settings.login_redirect, "/segments.html");
        assert_eq!(config.token_scope(), TokenScope::Session);
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert!(config.settings.static_dir.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = test_config()
            .with_auth_path("/oauth")
            .with_login_redirect("/app")
            .with_token_scope(TokenScope::Global)
            .with_session_ttl(Duration::hours(1))
            .with_static_dir("assets");
        assert_eq!(config.settings.auth_path, "/oauth");
        assert_eq!(config.settings.login_redirect, "/app");
        assert_eq!(config.token_scope(), TokenScope::Global);
        assert_eq!(config.session_ttl(), Duration::hours(1));
        assert_eq!(config.settings.static_dir, Some(PathBuf::from("assets")));
    }
}
