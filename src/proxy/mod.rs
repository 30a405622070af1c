//! Axum surface of the Strava proxy.
//!
//! Keeps Strava credentials and tokens on the server: the browser only ever
//! holds an encrypted session cookie.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use strava_proxy::proxy::{ProxyConfig, SessionTokenStore, proxy_routes};
//!
//! // 1. Configure from environment
//! let config = ProxyConfig::from_env()?;
//!
//! // 2. Pick a token store
//! let store = SessionTokenStore::new(config.session_ttl());
//!
//! // 3. Serve
//! let app = proxy_routes(config, store);
//! axum::serve(listener, app).await?;
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod refresh;
mod routes;
mod session;
mod state;
mod store;
mod traits;

pub use config::{ProxyConfig, TokenScope, cookie_key_from_secret};
pub use error::ProxyError;
pub use routes::proxy_routes;
pub use store::{SessionTokenStore, SharedTokenStore};
pub use traits::{StoreError, TokenStore};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
