use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

use crate::types::SessionId;

/// Generates a cryptographically random state parameter for `OAuth2`.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a fresh session identifier for the session cookie.
///
/// 32 random bytes, base64url encoded (43 characters).
#[must_use]
pub fn generate_session_id() -> SessionId {
    let random_bytes: [u8; 32] = rand::rng().random();
    SessionId(URL_SAFE_NO_PAD.encode(random_bytes))
}
