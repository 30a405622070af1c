use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::config::ProxyConfig;
use super::cookies;
use super::error::{ProxyError, WithStatusCode};
use super::extractor::{Authenticated, CurrentSession};
use super::refresh::with_refresh;
use super::session::ensure_session;
use super::state::ProxyState;
use super::traits::TokenStore;
use crate::nonce;
use crate::types::PageParams;

const AUTH_FAILED_MESSAGE: &str = "Error autenticando con Strava.";

/// Create the proxy router: auth flow, API proxies, liveness probe and,
/// when configured, static assets.
pub fn proxy_routes<T: TokenStore>(config: ProxyConfig, store: T) -> Router {
    let settings = config.settings;
    let auth_path = settings.auth_path.clone();
    let static_dir = settings.static_dir.clone();

    let state = ProxyState {
        client: Arc::new(config.client),
        store: Arc::new(store),
        refresh_guards: Arc::default(),
        settings,
    };

    let mut router = Router::new()
        .route(&format!("{auth_path}/strava"), get(login))
        .route(&format!("{auth_path}/callback"), get(callback))
        .route(&format!("{auth_path}/logout"), get(logout).post(logout))
        .route("/api/userinfo", get(user_info))
        .route("/api/userSegmentsStarred", get(user_segments_starred))
        .route("/api/segmentInfo", get(segment_info));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), ensure_session))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login(
    State(state): State<ProxyState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Response) {
    let csrf_state = nonce::generate_state();
    let url = state.client.authorization_url(&csrf_state);

    let cookie = cookies::state_cookie(
        &csrf_state,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    (jar.add(cookie), found(&url))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<ProxyState>,
    CurrentSession(session_id): CurrentSession,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Response), Response> {
    let settings = &state.settings;

    if let Some(error) = &params.error {
        tracing::warn!(error = %error, "Authorization denied by Strava");
        return Err(login_error(&settings.error_redirect, error));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| login_error(&settings.error_redirect, "missing_code"))?;

    let stored_state = cookies::get_state(&jar)
        .ok_or_else(|| login_error(&settings.error_redirect, "state_mismatch"))?;

    if params.state.as_deref() != Some(stored_state.as_str()) {
        tracing::warn!("OAuth state mismatch");
        return Err(login_error(&settings.error_redirect, "state_mismatch"));
    }

    let jar = jar.remove(cookies::clear_state_cookie(&settings.auth_path));

    let tokens = state.client.exchange_code(&code).await.map_err(|e| {
        tracing::error!(error = %e, "Token exchange failed");
        (StatusCode::INTERNAL_SERVER_ERROR, AUTH_FAILED_MESSAGE).into_response()
    })?;

    // Drop the pre-login id before storing, so a shared slot keeps the new pair.
    if let Err(e) = state.store.remove_dyn(&session_id).await {
        tracing::warn!(error = %e, "Token removal failed for pre-login session");
    }

    let new_session_id = nonce::generate_session_id();
    state
        .store
        .set_dyn(&new_session_id, tokens)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Storing tokens failed");
            (StatusCode::INTERNAL_SERVER_ERROR, AUTH_FAILED_MESSAGE).into_response()
        })?;

    let session_cookie = cookies::session_cookie(
        &settings.session_cookie_name,
        &new_session_id,
        settings.session_ttl,
        settings.secure_cookies,
    );

    tracing::info!(session_id = %new_session_id, "Strava OAuth2 login successful");

    Ok((jar.add(session_cookie), found(&settings.login_redirect)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(
    State(state): State<ProxyState>,
    CurrentSession(session_id): CurrentSession,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Response) {
    if let Err(e) = state.store.remove_dyn(&session_id).await {
        tracing::warn!(error = %e, "Token removal failed during logout");
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (
        jar.remove(clear_cookie),
        found(&state.settings.logout_redirect),
    )
}

// ── API ────────────────────────────────────────────────────────────

async fn user_info(
    State(state): State<ProxyState>,
    auth: Authenticated,
) -> Result<Json<JsonValue>, ProxyError> {
    let client = state.client.as_ref();
    let athlete =
        with_refresh(&state, auth, |token| async move { client.athlete(&token).await }).await?;
    Ok(Json(athlete))
}

async fn user_segments_starred(
    State(state): State<ProxyState>,
    auth: Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<JsonValue>, ProxyError> {
    let client = state.client.as_ref();
    let params = &params;
    let segments = with_refresh(&state, auth, |token| async move {
        client.starred_segments(&token, params).await
    })
    .await?;
    Ok(Json(segments))
}

#[derive(Deserialize)]
struct SegmentParams {
    id: Option<String>,
}

async fn segment_info(
    State(state): State<ProxyState>,
    auth: Result<Authenticated, ProxyError>,
    Query(params): Query<SegmentParams>,
) -> Result<Json<JsonValue>, WithStatusCode> {
    let auth = auth?;
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ProxyError::MissingParam("id"))?;

    let client = state.client.as_ref();
    let id = id.as_str();
    let segment =
        with_refresh(&state, auth, |token| async move { client.segment(&token, id).await })
            .await?;
    Ok(Json(segment))
}

// ── Ping ───────────────────────────────────────────────────────────

async fn ping() -> &'static str {
    "OK"
}

// ── Helpers ────────────────────────────────────────────────────────

/// `302 Found` redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    found(&format!("{error_redirect}?error={encoded}"))
}
