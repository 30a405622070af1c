use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

const UNAUTHENTICATED_MESSAGE: &str = "Usuario no autenticado";
const UPSTREAM_MESSAGE: &str = "Error al obtener la información";

/// Errors surfaced by the proxy's HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No token pair stored for the requesting session.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Tokens were rejected and could not be refreshed.
    #[error("Session expired")]
    SessionExpired,

    /// A required query parameter is missing.
    #[error("Missing query parameter: {0}")]
    MissingParam(&'static str),

    /// Any upstream failure other than a rejected access token.
    #[error("Upstream error: {0}")]
    Upstream(#[from] crate::error::Error),

    /// Token store operation failed.
    #[error("Token store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated | Self::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": UNAUTHENTICATED_MESSAGE })),
            )
                .into_response(),
            Self::MissingParam(name) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Falta el parámetro {name}") })),
            )
                .into_response(),
            Self::Upstream(ref e) => {
                tracing::error!(error = %e, "Upstream request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": UPSTREAM_MESSAGE })),
                )
                    .into_response()
            }
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Proxy internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": UPSTREAM_MESSAGE })),
                )
                    .into_response()
            }
        }
    }
}

/// Response wrapper that also reports `status_code` in the 401 body,
/// as the segment endpoint's clients expect.
#[derive(Debug)]
pub(super) struct WithStatusCode(pub(super) ProxyError);

impl From<ProxyError> for WithStatusCode {
    fn from(e: ProxyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for WithStatusCode {
    fn into_response(self) -> Response {
        if self.0.is_unauthenticated() {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "status_code": 401, "error": UNAUTHENTICATED_MESSAGE })),
            )
                .into_response();
        }
        self.0.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should read");
        serde_json::from_slice(&body).expect("response body should be JSON")
    }

    #[tokio::test]
    async fn unauthenticated_is_401_with_error_body() {
        let response = ProxyError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Usuario no autenticado" })
        );
    }

    #[tokio::test]
    async fn upstream_detail_is_not_leaked() {
        let upstream = crate::error::Error::from_status("athlete request", 503, "secret detail");
        let response = ProxyError::Upstream(upstream).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Error al obtener la información" })
        );
    }

    #[tokio::test]
    async fn with_status_code_adds_field_to_401() {
        let response = WithStatusCode(ProxyError::SessionExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "status_code": 401, "error": "Usuario no autenticado" })
        );
    }

    #[tokio::test]
    async fn with_status_code_passes_other_errors_through() {
        let response = WithStatusCode(ProxyError::MissingParam("id")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Falta el parámetro id" })
        );
    }
}
