//! HTTP client for the backend REST API.
//!
//! Every call goes through [`ApiClient::request`], which attaches the bearer
//! token, tags the request with an `x-request-id`, and handles a rejected
//! token by running exactly one refresh exchange before retrying once.
//! The refresh token itself lives in an HTTP-only cookie; the client keeps a
//! cookie store and persists it to [`LocalStorage`] between runs.

pub mod endpoints;
mod health;

pub use health::ServerAvailability;

use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::storage::{LocalStorage, keys};

const REQUEST_ID_HEADER: &str = "x-request-id";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// RequestOptions
// =============================================================================

/// Method, body and auth requirement for one call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    body: Option<Value>,
    requires_auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    #[must_use]
    pub const fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            requires_auth: false,
        }
    }

    #[must_use]
    pub const fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            requires_auth: false,
        }
    }

    /// POST without a body.
    #[must_use]
    pub const fn post_empty() -> Self {
        Self {
            method: Method::POST,
            body: None,
            requires_auth: false,
        }
    }

    #[must_use]
    pub const fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            requires_auth: false,
        }
    }

    #[must_use]
    pub const fn delete() -> Self {
        Self {
            method: Method::DELETE,
            body: None,
            requires_auth: false,
        }
    }

    /// Serialize a typed body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if the body cannot be represented as JSON.
    pub fn json<B: Serialize + ?Sized>(method: Method, body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(Self {
            method,
            body: Some(body),
            requires_auth: false,
        })
    }

    /// Fail with `AuthenticationRequired` when no token is stored.
    #[must_use]
    pub const fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }
}

// =============================================================================
// Cookie store
// =============================================================================

/// Cookie jar that can be dropped wholesale on logout.
#[derive(Default)]
struct SessionCookies {
    jar: StdRwLock<Arc<Jar>>,
}

impl SessionCookies {
    fn current(&self) -> Arc<Jar> {
        let jar = self.jar.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&jar)
    }

    fn reset(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Jar::default());
    }

    fn restore(&self, saved: &str, url: &Url) {
        let jar = self.current();
        for pair in saved.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            jar.add_cookie_str(pair, url);
        }
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}

// =============================================================================
// ApiClient
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    code: Option<String>,
}

/// Client for the backend REST API.
///
/// Cheap to clone; clones share the token, cookie store and availability
/// state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    cookies: Arc<SessionCookies>,
    token: RwLock<Option<SecretString>>,
    availability: ServerAvailability,
    storage: LocalStorage,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client, restoring any stored token and cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, storage: LocalStorage) -> Result<Self, reqwest::Error> {
        let cookies = Arc::new(SessionCookies::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .timeout(config.request_timeout)
            .build()?;

        let token = storage
            .get::<String>(keys::ACCESS_TOKEN)
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let client = Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_url.clone(),
                cookies,
                token: RwLock::new(token),
                availability: ServerAvailability::new(config.health_check_interval),
                storage,
            }),
        };

        if let Some(saved) = client.inner.storage.get::<String>(keys::API_COOKIES)
            && let Ok(url) = client.url(endpoints::auth::REFRESH)
        {
            client.inner.cookies.restore(&saved, &url);
        }

        Ok(client)
    }

    /// Local storage shared with the session and stores.
    #[must_use]
    pub fn storage(&self) -> &LocalStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Execute a request and decode the JSON response.
    ///
    /// An empty success body decodes as JSON `null`, so `T = ()` or
    /// `Option<_>` fit endpoints that return nothing.
    ///
    /// # Errors
    ///
    /// - `AuthenticationRequired` if auth is required and no token is stored
    /// - `SessionExpired` if the token was rejected and refreshing failed
    /// - `Status` for any other non-2xx response, including a failed retry
    /// - `Network`/`Timeout`/`Decode` for transport and body failures
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, &options).await?;

        if response.status() != StatusCode::UNAUTHORIZED || is_credential_exchange(endpoint) {
            return self.decode(response).await;
        }

        debug!("Access token rejected, attempting refresh");
        self.refresh_access_token().await?;

        let retry = self.send(endpoint, &options).await?;
        self.decode(retry).await
    }

    /// Ask the backend health endpoint, reusing a recent answer.
    #[instrument(skip(self))]
    pub async fn check_server_availability(&self) -> bool {
        let inner = &self.inner;
        inner
            .availability
            .check_with(|| async {
                let Ok(url) = self.url(endpoints::HEALTH) else {
                    return false;
                };
                match inner.http.get(url).timeout(HEALTH_TIMEOUT).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        warn!(error = %e, "Server health check failed");
                        false
                    }
                }
            })
            .await
    }

    /// Last known availability, without probing.
    pub async fn is_server_available(&self) -> bool {
        self.inner.availability.is_available().await
    }

    /// Whether a bearer token is stored.
    pub async fn has_access_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    /// Store and persist a new bearer token.
    pub async fn set_access_token(&self, token: SecretString) {
        if let Err(e) = self
            .inner
            .storage
            .set(keys::ACCESS_TOKEN, token.expose_secret())
        {
            warn!(error = %e, "Failed to persist access token");
        }
        *self.inner.token.write().await = Some(token);
    }

    /// Forget the token and every cookie, in memory and on disk.
    pub async fn clear_credentials(&self) {
        *self.inner.token.write().await = None;
        self.inner.cookies.reset();
        for key in [keys::ACCESS_TOKEN, keys::API_COOKIES] {
            if let Err(e) = self.inner.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove stored credential");
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}{endpoint}",
                self.inner.base_url.as_str().trim_end_matches('/')
            )
        };
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(endpoint)?;
        let token = self.inner.token.read().await.clone();
        if options.requires_auth && token.is_none() {
            return Err(ApiError::AuthenticationRequired);
        }

        let mut request = self
            .inner
            .http
            .request(options.method.clone(), url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(token) = &token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => {
                self.inner.availability.record(true).await;
                Ok(response)
            }
            Err(e) => {
                if e.is_connect() {
                    self.inner.availability.record(false).await;
                }
                warn!(endpoint, error = %e, "API request failed");
                Err(e.into())
            }
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        self.persist_cookies();
        let body = response.text().await?;

        if !status.is_success() {
            let error = error_from_body(status, &body);
            debug!(status = status.as_u16(), error = %error, "API returned error status");
            return Err(error);
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| {
            warn!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to decode API response"
            );
            ApiError::Decode(e.to_string())
        })
    }

    /// Exchange the refresh cookie for a new access token.
    ///
    /// On failure all stored credentials are cleared.
    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        if let Some(token) = self.try_refresh().await {
            self.set_access_token(SecretString::from(token)).await;
            info!("Access token refreshed");
            Ok(())
        } else {
            warn!("Token refresh failed, clearing credentials");
            self.clear_credentials().await;
            Err(ApiError::SessionExpired)
        }
    }

    async fn try_refresh(&self) -> Option<String> {
        let url = self.url(endpoints::auth::REFRESH).ok()?;
        let response = match self
            .inner
            .http
            .post(url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "Token refresh rejected");
            return None;
        }
        self.persist_cookies();

        response
            .json::<RefreshResponse>()
            .await
            .ok()?
            .access_token
            .filter(|t| !t.is_empty())
    }

    fn persist_cookies(&self) {
        let Ok(url) = self.url(endpoints::auth::REFRESH) else {
            return;
        };
        let Some(header) = self.inner.cookies.cookies(&url) else {
            return;
        };
        if let Ok(raw) = header.to_str()
            && let Err(e) = self.inner.storage.set(keys::API_COOKIES, raw)
        {
            warn!(error = %e, "Failed to persist API cookies");
        }
    }
}

/// Login and registration answer 401 for bad credentials; refreshing there
/// would only mask the real error.
fn is_credential_exchange(endpoint: &str) -> bool {
    let path = endpoint.split('?').next().unwrap_or(endpoint);
    [
        endpoints::auth::LOGIN,
        endpoints::auth::REGISTER,
        endpoints::auth::REFRESH,
    ]
    .iter()
    .any(|p| path.ends_with(p))
}

/// Decode a payload that may arrive bare or wrapped as `{ "<field>": ... }`.
pub(crate) fn unwrap_field<T: DeserializeOwned>(mut value: Value, field: &str) -> Result<T, ApiError> {
    let inner = value
        .as_object_mut()
        .and_then(|map| map.remove(field))
        .unwrap_or(value);
    serde_json::from_value(inner).map_err(|e| ApiError::Decode(e.to_string()))
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let (message, code) = parsed.map_or((None, None), |b| (b.message.or(b.error), b.code));
    ApiError::Status {
        status: status.as_u16(),
        message: message
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
        code,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_message_and_code() {
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Out of stock","code":"OUT_OF_STOCK"}"#,
        );
        assert_eq!(
            err,
            ApiError::Status {
                status: 422,
                message: "Out of stock".to_string(),
                code: Some("OUT_OF_STOCK".to_string()),
            }
        );
    }

    #[test]
    fn test_error_body_fallback_message() {
        let err = error_from_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "Request failed with status 502");
        assert_eq!(err.code(), "HTTP_ERROR");
    }

    #[test]
    fn test_unwrap_field_accepts_both_shapes() {
        let wrapped: Vec<u32> = unwrap_field(serde_json::json!({ "orders": [1, 2] }), "orders").unwrap();
        let bare: Vec<u32> = unwrap_field(serde_json::json!([3]), "orders").unwrap();
        assert_eq!(wrapped, vec![1, 2]);
        assert_eq!(bare, vec![3]);
    }

    #[test]
    fn test_credential_exchange_detection() {
        assert!(is_credential_exchange("/auth/login"));
        assert!(is_credential_exchange("/auth/register?next=x"));
        assert!(!is_credential_exchange("/auth/verify"));
        assert!(!is_credential_exchange("/cart"));
    }

    #[test]
    fn test_request_options_builders() {
        let options = RequestOptions::put(serde_json::json!({ "quantity": 2 })).authenticated();
        assert_eq!(options.method(), &Method::PUT);
        assert!(options.requires_auth());
        assert!(!RequestOptions::get().requires_auth());
    }

    #[tokio::test]
    async fn test_auth_required_without_token_skips_network() {
        // Port 9 is discard; the request must fail before any I/O.
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        let client = ApiClient::new(&config, LocalStorage::in_memory()).unwrap();
        let err = client
            .request::<Value>("/cart", RequestOptions::get().authenticated())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_token_is_restored_from_storage() {
        let storage = LocalStorage::in_memory();
        storage.set(keys::ACCESS_TOKEN, "stored-token").unwrap();
        let config = StorefrontConfig::new(Url::parse("http://localhost:5000/api").unwrap());
        let client = ApiClient::new(&config, storage.clone()).unwrap();
        assert!(client.has_access_token().await);

        client.clear_credentials().await;
        assert!(!client.has_access_token().await);
        assert!(storage.get::<String>(keys::ACCESS_TOKEN).is_none());
    }
}
