/// Maximum length for upstream error bodies kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors from calls to the Strava OAuth and resource endpoints.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The upstream rejected the access token (HTTP 401).
    #[error("{operation} rejected the access token")]
    Unauthorized { operation: &'static str },

    /// Any other non-success status from the upstream.
    #[error("{operation} failed with status {status}: {detail}")]
    Upstream {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// The upstream answered with a body we could not use.
    #[error("Invalid response from {operation}: {detail}")]
    InvalidResponse {
        operation: &'static str,
        detail: String,
    },

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build an error from a non-success upstream status and its body.
    pub(crate) fn from_status(operation: &'static str, status: u16, body: &str) -> Self {
        if status == 401 {
            return Self::Unauthorized { operation };
        }
        Self::Upstream {
            operation,
            status,
            detail: truncate_body(body),
        }
    }

    /// `true` when the access token itself was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// `true` when the upstream refused the request itself with a 4xx status.
    ///
    /// Timeouts (408) and rate limiting (429) are transient and do not count.
    #[must_use]
    pub fn is_client_rejection(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Upstream { status, .. } => {
                (400..500).contains(status) && !matches!(status, 408 | 429)
            }
            _ => false,
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_is_unauthorized() {
        let err = Error::from_status("athlete request", 401, "{}");
        assert!(err.is_unauthorized());
        assert!(err.is_client_rejection());
    }

    #[test]
    fn status_400_is_client_rejection_but_not_unauthorized() {
        let err = Error::from_status("token refresh", 400, "invalid_grant");
        assert!(!err.is_unauthorized());
        assert!(err.is_client_rejection());
    }

    #[test]
    fn rate_limits_and_timeouts_are_not_client_rejections() {
        for status in [408, 429] {
            let err = Error::from_status("token refresh", status, "Rate Limit Exceeded");
            assert!(!err.is_client_rejection(), "status {status}");
        }
        assert!(Error::from_status("token refresh", 403, "forbidden").is_client_rejection());
    }

    #[test]
    fn server_errors_are_not_client_rejections() {
        let err = Error::from_status("athlete request", 503, "down");
        assert!(!err.is_client_rejection());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let Error::Upstream { detail, .. } = Error::from_status("segment request", 500, &body)
        else {
            panic!("expected upstream error");
        };
        assert!(detail.starts_with(&"x".repeat(500)));
        assert!(detail.contains("2000 total bytes"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.contains("800 total bytes"));
    }
}
