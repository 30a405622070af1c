#![doc = include_str!("../README.md")]

pub mod error;
pub mod nonce;
pub mod oauth;
pub mod proxy;
pub mod types;

// Re-exports for convenient access
pub use error::Error;
pub use oauth::{OAuthConfig, StravaClient, TokenResponse};
pub use proxy::{ProxyConfig, ProxyError, TokenScope, proxy_routes};
pub use types::{PageParams, SessionId, TokenPair};
