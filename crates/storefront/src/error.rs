//! Error types shared by the API client, session and stores.
//!
//! [`ApiError`] is a closed set of failure kinds. Stores turn it into a
//! human-readable string with [`ApiError::user_message`] and keep the typed
//! value in their [`Synced`](crate::stores::Synced) results; the session
//! inspects it with [`ApiError::is_session_expired`] to decide on logout.

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors produced by backend calls.
///
/// Cloneable so the same error can be recorded in store state and returned
/// to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connection refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The call requires a token and none is stored.
    #[error("Authentication required but no token available")]
    AuthenticationRequired,

    /// The backend rejected the token and the refresh exchange failed.
    #[error("Authentication required")]
    SessionExpired,

    /// The current user lacks the role needed for the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The availability check reports the backend as down.
    #[error("Unable to connect to server")]
    ServerUnavailable,

    /// The response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The request body could not be serialized.
    #[error("Invalid request: {0}")]
    Encode(String),

    /// The endpoint could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status associated with the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::SessionExpired | Self::AuthenticationRequired => Some(401),
            Self::PermissionDenied(_) => Some(403),
            _ => None,
        }
    }

    /// Machine-readable code. Server-supplied codes win over the local kind.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::AuthenticationRequired => "AUTH_REQUIRED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::PermissionDenied(_) => "FORBIDDEN",
            Self::Status { code: Some(code), .. } => code,
            Self::Status { .. } => "HTTP_ERROR",
            Self::ServerUnavailable => "SERVER_UNAVAILABLE",
            Self::Decode(_) => "INVALID_RESPONSE",
            Self::Encode(_) => "INVALID_REQUEST",
            Self::InvalidUrl(_) => "INVALID_URL",
        }
    }

    /// Whether the session is no longer valid and the user must log in again.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
            || self.status() == Some(401) && !matches!(self, Self::AuthenticationRequired)
            || self.code() == "SESSION_EXPIRED"
    }

    /// Whether the failure is about missing or rejected credentials.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationRequired) || self.is_session_expired()
    }

    /// Whether retrying later could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::ServerUnavailable => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Message suitable for an inline error banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::ServerUnavailable => {
                "Unable to connect to the server. Please check your connection and try again."
                    .to_string()
            }
            Self::Timeout => "The request timed out. Please try again.".to_string(),
            Self::Decode(_) => "The server sent an unexpected response.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors that can occur while assembling a [`Storefront`](crate::Storefront).
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_displays_server_message() {
        let err = ApiError::Status {
            status: 422,
            message: "Quantity exceeds stock".to_string(),
            code: Some("OUT_OF_STOCK".to_string()),
        };
        assert_eq!(err.to_string(), "Quantity exceeds stock");
        assert_eq!(err.code(), "OUT_OF_STOCK");
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_session_expiry_detection() {
        assert!(ApiError::SessionExpired.is_session_expired());
        let coded = ApiError::Status {
            status: 403,
            message: "expired".to_string(),
            code: Some("SESSION_EXPIRED".to_string()),
        };
        assert!(coded.is_session_expired());
        assert!(!ApiError::AuthenticationRequired.is_session_expired());
        assert!(ApiError::AuthenticationRequired.is_auth_failure());
        assert!(!ApiError::Network("refused".into()).is_auth_failure());
    }

    #[test]
    fn test_user_message_maps_network_conditions() {
        assert!(ApiError::Network("connection refused".into())
            .user_message()
            .starts_with("Unable to connect"));
        assert_eq!(
            ApiError::Timeout.user_message(),
            "The request timed out. Please try again."
        );
    }

    #[test]
    fn test_transient_classification() {
        let unavailable = ApiError::Status {
            status: 503,
            message: "down".into(),
            code: None,
        };
        assert!(unavailable.is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(!ApiError::SessionExpired.is_transient());
    }
}
