use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;

use super::cookies;
use super::state::ProxyState;
use crate::nonce;

/// Resolve the session cookie, issuing a new session when absent.
///
/// The [`SessionId`](crate::types::SessionId) is stored in the request
/// extensions for [`CurrentSession`](super::extractor::CurrentSession).
pub(super) async fn ensure_session(
    State(state): State<ProxyState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = &state.settings;

    let (session_id, issued) = match cookies::get_session_id(&jar, &settings.session_cookie_name)
    {
        Some(id) => (id, None),
        None => {
            let id = nonce::generate_session_id();
            let cookie = cookies::session_cookie(
                &settings.session_cookie_name,
                &id,
                settings.session_ttl,
                settings.secure_cookies,
            );
            (id, Some(jar.add(cookie)))
        }
    };

    request.extensions_mut().insert(session_id);
    let response = next.run(request).await;

    match issued {
        Some(jar) => (jar, response).into_response(),
        None => response,
    }
}
