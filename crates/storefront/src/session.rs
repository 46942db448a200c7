//! Authentication session: who is logged in.
//!
//! The session owns the user and token pair. Every successful login, signup
//! or profile update persists the token, the user and a plain-text role
//! cookie; every logout or expiry removes all three. State transitions are
//! published on a `watch` channel so front ends can redirect on
//! [`SessionState::Expired`].

use std::sync::Arc;

use larkspur_core::{Email, Role, User};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::endpoints::auth;
use crate::api::{ApiClient, RequestOptions};
use crate::error::ApiError;
use crate::storage::{cookies, keys};

/// Published session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// `initialize` has not finished.
    #[default]
    Loading,
    SignedOut,
    SignedIn(User),
    /// The backend rejected the session; the user must log in again.
    Expired,
    /// The health check failed during initialization.
    ServerUnavailable,
}

impl SessionState {
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Signup form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    user: User,
}

#[derive(Deserialize)]
struct VerifyResponse {
    user: Option<User>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Wrapped { user: User },
    Bare(User),
}

/// Authentication session handle.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    api: ApiClient,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            inner: Arc::new(AuthSessionInner { api, state }),
        }
    }

    /// Restore the stored session and verify it against the backend.
    ///
    /// Network and server errors during verification keep the stored
    /// session; only an explicit rejection logs the user out.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        let api = &self.inner.api;
        if !api.check_server_availability().await {
            warn!("Backend unavailable, skipping session restore");
            self.publish(SessionState::ServerUnavailable);
            return self.state();
        }

        let stored_user = api.storage().get::<User>(keys::USER);
        let has_token = api.has_access_token().await;

        match (stored_user, has_token) {
            (Some(user), true) => {
                self.persist_user(user);
                if !self.verify_stored().await {
                    info!("Stored session rejected, clearing");
                    self.clear(SessionState::SignedOut).await;
                }
            }
            (None, true) => self.check_auth().await,
            _ => self.publish(SessionState::SignedOut),
        }

        self.state()
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the session is left unchanged.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<User, ApiError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        });
        let response: AuthResponse = self
            .inner
            .api
            .request(auth::LOGIN, RequestOptions::post(body))
            .await?;
        info!(user_id = %response.user.id, "Logged in");
        Ok(self.establish(response).await)
    }

    /// Create an account and log in.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the session is left unchanged.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn signup(&self, registration: &Registration) -> Result<User, ApiError> {
        let body = json!({
            "firstName": registration.first_name,
            "lastName": registration.last_name,
            "email": registration.email.as_str(),
            "password": registration.password.expose_secret(),
            "phone": registration.phone,
        });
        let response: AuthResponse = self
            .inner
            .api
            .request(auth::REGISTER, RequestOptions::post(body))
            .await?;
        info!(user_id = %response.user.id, "Account created");
        Ok(self.establish(response).await)
    }

    /// Log out. Server errors are logged and ignored; local state is always
    /// cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self
            .inner
            .api
            .request::<serde_json::Value>(auth::LOGOUT, RequestOptions::post_empty().authenticated())
            .await
        {
            debug!(error = %e, "Logout request failed");
        }
        self.clear(SessionState::SignedOut).await;
        info!("Logged out");
    }

    /// Replace the current user and persist it.
    pub fn update_user(&self, user: User) {
        self.persist_user(user);
    }

    /// Set or clear the current user. `None` clears all auth state.
    pub async fn set_user(&self, user: Option<User>) {
        match user {
            Some(user) => self.update_user(user),
            None => self.clear(SessionState::SignedOut).await,
        }
    }

    /// Reload the current user from `GET /auth/profile`.
    ///
    /// # Errors
    ///
    /// Returns the backend error. Session expiry also clears the session.
    pub async fn refresh_profile(&self) -> Result<User, ApiError> {
        let user = match self
            .authenticated_request::<ProfileResponse>(auth::PROFILE, RequestOptions::get())
            .await?
        {
            ProfileResponse::Wrapped { user } | ProfileResponse::Bare(user) => user,
        };
        self.persist_user(user.clone());
        Ok(user)
    }

    /// Make an authenticated call on behalf of the current user.
    ///
    /// If the session has expired, auth state is cleared and
    /// [`SessionState::Expired`] is published before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn authenticated_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        match self.inner.api.request(endpoint, options.authenticated()).await {
            Ok(value) => Ok(value),
            Err(error) => {
                if error.is_session_expired() {
                    warn!(endpoint, "Session expired");
                    self.clear(SessionState::Expired).await;
                }
                Err(error)
            }
        }
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.role.is_admin())
    }

    /// Role cookie value as route gating sees it.
    #[must_use]
    pub fn role_cookie(&self) -> Option<Role> {
        self.inner
            .api
            .storage()
            .get_cookie(cookies::USER_ROLE)
            .and_then(|raw| raw.parse().ok())
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn establish(&self, response: AuthResponse) -> User {
        self.inner
            .api
            .set_access_token(SecretString::from(response.access_token))
            .await;
        self.persist_user(response.user.clone());
        response.user
    }

    /// Verify a restored session. `false` means the backend rejected it.
    async fn verify_stored(&self) -> bool {
        match self
            .inner
            .api
            .request::<VerifyResponse>(auth::VERIFY, RequestOptions::get().authenticated())
            .await
        {
            Ok(VerifyResponse { user: Some(user) }) => {
                self.persist_user(user);
                true
            }
            Ok(VerifyResponse { user: None }) => false,
            Err(error) if error.is_session_expired() => false,
            Err(error) => {
                warn!(error = %error, "Verify failed, keeping existing session");
                true
            }
        }
    }

    /// Token without a stored user: fetch the user.
    async fn check_auth(&self) {
        match self
            .inner
            .api
            .request::<VerifyResponse>(auth::VERIFY, RequestOptions::get().authenticated())
            .await
        {
            Ok(VerifyResponse { user: Some(user) }) => self.persist_user(user),
            Ok(VerifyResponse { user: None }) => self.publish(SessionState::SignedOut),
            Err(error) if error.code() == "SESSION_EXPIRED" => {
                self.clear(SessionState::SignedOut).await;
            }
            Err(error) => {
                warn!(error = %error, "Auth check failed");
                self.publish(SessionState::SignedOut);
            }
        }
    }

    fn persist_user(&self, user: User) {
        let storage = self.inner.api.storage();
        if let Err(e) = storage.set(keys::USER, &user) {
            warn!(error = %e, "Failed to persist user");
        }
        if let Err(e) = storage.set_cookie(
            cookies::USER_ROLE,
            user.role.cookie_value(),
            cookies::USER_ROLE_DAYS,
        ) {
            warn!(error = %e, "Failed to write role cookie");
        }
        self.publish(SessionState::SignedIn(user));
    }

    async fn clear(&self, next: SessionState) {
        self.inner.api.clear_credentials().await;
        let storage = self.inner.api.storage();
        if let Err(e) = storage.remove(keys::USER) {
            warn!(error = %e, "Failed to remove stored user");
        }
        if let Err(e) = storage.delete_cookie(cookies::USER_ROLE) {
            warn!(error = %e, "Failed to delete role cookie");
        }
        self.publish(next);
    }

    fn publish(&self, state: SessionState) {
        self.inner.state.send_replace(state);
    }
}
