use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::types::{PageParams, TokenPair};

/// Strava `OAuth2` and API configuration.
///
/// Required fields are constructor parameters; endpoints and scopes default to Strava's.
///
/// ```rust,ignore
/// use strava_proxy::OAuthConfig;
///
/// let config = OAuthConfig::new("12345", "secret", "http://localhost:3000/auth/callback".parse()?);
/// // Optional overrides via chaining:
/// let config = config
///     .with_api_url("http://127.0.0.1:9000/api/v3".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) api_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new Strava configuration.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            auth_url: "https://www.strava.com/oauth/authorize"
                .parse()
                .expect("valid default URL"),
            token_url: "https://www.strava.com/oauth/token"
                .parse()
                .expect("valid default URL"),
            api_url: "https://www.strava.com/api/v3"
                .parse()
                .expect("valid default URL"),
            scopes: vec!["read".into(), "activity:read_all".into()],
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the resource API base (`.../api/v3`).
    #[must_use]
    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = url;
        self
    }

    /// Override the requested scopes (default: `["read", "activity:read_all"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Client for the Strava token endpoint and the resource API.
pub struct StravaClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(flatten)]
    grant: Grant<'a>,
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum Grant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

/// Token response from the Strava token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a stored pair, keeping `previous_refresh` when the
    /// endpoint did not rotate the refresh token.
    fn into_pair(self, previous_refresh: Option<&str>) -> Result<TokenPair, Error> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_owned))
            .ok_or_else(|| Error::InvalidResponse {
                operation: "token exchange",
                detail: "missing refresh_token".into(),
            })?;

        let mut pair = TokenPair::new(self.access_token, refresh_token);
        if let Some(at) = self
            .expires_at
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        {
            pair = pair.with_expires_at(at);
        }
        Ok(pair)
    }
}

impl StravaClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL the browser is redirected to.
    ///
    /// `state` is echoed back by Strava on the callback.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = self.config.scopes.join(",");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", state);

        url.into()
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Upstream`] /
    /// [`Error::Unauthorized`] if the token endpoint refuses the code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair, Error> {
        let response = self
            .request_token(Grant::AuthorizationCode { code }, "token exchange")
            .await?;
        response.into_pair(None)
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Same as [`exchange_code`](Self::exchange_code).
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let response = self
            .request_token(Grant::RefreshToken { refresh_token }, "token refresh")
            .await?;
        response.into_pair(Some(refresh_token))
    }

    /// `GET /athlete`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the access token is rejected.
    pub async fn athlete(&self, access_token: &str) -> Result<JsonValue, Error> {
        let url = self.api_endpoint(&["athlete"])?;
        self.get_json(url, access_token, "athlete request").await
    }

    /// `GET /segments/starred`, forwarding the supplied paging parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the access token is rejected.
    pub async fn starred_segments(
        &self,
        access_token: &str,
        params: &PageParams,
    ) -> Result<JsonValue, Error> {
        let mut url = self.api_endpoint(&["segments", "starred"])?;
        let pairs = params.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.get_json(url, access_token, "starred segments request")
            .await
    }

    /// `GET /segments/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the access token is rejected.
    pub async fn segment(&self, access_token: &str, id: &str) -> Result<JsonValue, Error> {
        let url = self.api_endpoint(&["segments", id])?;
        self.get_json(url, access_token, "segment request").await
    }

    async fn request_token(
        &self,
        grant: Grant<'_>,
        operation: &'static str,
    ) -> Result<TokenResponse, Error> {
        let body = TokenRequest {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            grant,
        };

        let response = self
            .http
            .post(self.config.token_url.clone())
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    async fn get_json(
        &self,
        url: Url,
        access_token: &str,
        operation: &'static str,
    ) -> Result<JsonValue, Error> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<JsonValue>().await.map_err(Into::into)
    }

    /// Resource URL under the API base; each segment is percent-encoded.
    fn api_endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Url(format!("{} cannot be a base", self.config.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::from_status(operation, status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "test-client",
            "test-secret",
            "http://localhost:3000/auth/callback".parse().unwrap(),
        )
    }

    fn mock_client(server: &MockServer) -> StravaClient {
        let config = test_config()
            .with_token_url(format!("{}/oauth/token", server.uri()).parse().unwrap())
            .with_api_url(format!("{}/api/v3", server.uri()).parse().unwrap());
        StravaClient::new(config)
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let client = StravaClient::new(test_config());
        let url = client.authorization_url("xyz");

        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        let pairs = query(&url);
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("test-client"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(
            get("redirect_uri"),
            Some("http://localhost:3000/auth/callback")
        );
        assert_eq!(get("scope"), Some("read,activity:read_all"));
        assert_eq!(get("state"), Some("xyz"));
    }

    #[test]
    fn test_authorization_url_never_contains_secret() {
        let client = StravaClient::new(test_config());
        assert!(!client.authorization_url("s").contains("test-secret"));
    }

    #[test]
    fn test_config_constructor() {
        let config = test_config();

        assert_eq!(config.client_id(), "test-client");
        assert_eq!(config.token_url().as_str(), "https://www.strava.com/oauth/token");
        assert_eq!(config.api_url().as_str(), "https://www.strava.com/api/v3");
        assert_eq!(config.scopes(), &["read", "activity:read_all"]);
    }

    #[test]
    fn test_config_with_overrides() {
        let config = test_config()
            .with_auth_url("https://custom.example.com/authorize".parse().unwrap())
            .with_scopes(vec!["read".into()]);

        assert_eq!(
            config.auth_url().as_str(),
            "https://custom.example.com/authorize"
        );
        assert_eq!(config.scopes(), &["read"]);
    }

    #[test]
    fn test_segment_id_is_a_single_path_segment() {
        let client = StravaClient::new(test_config());
        let url = client.api_endpoint(&["segments", "../athlete"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.strava.com/api/v3/segments/..%2Fathlete"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_posts_json_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_json(serde_json::json!({
                "client_id": "test-client",
                "client_secret": "test-secret",
                "grant_type": "authorization_code",
                "code": "abc123",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "access_token": "A1",
                "refresh_token": "R1",
                "expires_at": 1_700_000_000,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pair = mock_client(&server).exchange_code("abc123").await.unwrap();
        assert_eq!(pair.access_token, "A1");
        assert_eq!(pair.refresh_token, "R1");
        assert_eq!(pair.expires_at.unwrap().unix_timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
            .mount(&server)
            .await;

        let err = mock_client(&server).exchange_code("bad").await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token_when_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_json(serde_json::json!({
                "client_id": "test-client",
                "client_secret": "test-secret",
                "grant_type": "refresh_token",
                "refresh_token": "R1",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "A2"})),
            )
            .mount(&server)
            .await;

        let pair = mock_client(&server).refresh_token("R1").await.unwrap();
        assert_eq!(pair, TokenPair::new("A2", "R1"));
    }

    #[tokio::test]
    async fn test_athlete_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/athlete"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let athlete = mock_client(&server).athlete("A1").await.unwrap();
        assert_eq!(athlete["id"], 42);
    }

    #[tokio::test]
    async fn test_athlete_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/athlete"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = mock_client(&server).athlete("expired").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_starred_segments_forwards_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/segments/starred"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "30"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 1}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = PageParams {
            page: Some("2".into()),
            per_page: Some("30".into()),
        };
        let segments = mock_client(&server)
            .starred_segments("A1", &params)
            .await
            .unwrap();
        assert_eq!(segments[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_segment_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/segments/229781"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 229781, "name": "Hawk Hill"})),
            )
            .mount(&server)
            .await;

        let segment = mock_client(&server).segment("A1", "229781").await.unwrap();
        assert_eq!(segment["name"], "Hawk Hill");
    }
}
