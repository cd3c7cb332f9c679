//! Error types for the portal service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Errors raised while talking to the identity provider and record tables
#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The provider rejected the email/password pair
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// A record lookup returned no row
    #[error("Record not found")]
    NotFound,

    /// The operation needs a session and there is none
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The provider answered with an error status
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Session storage failed
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Input rejected before reaching the provider
    #[error("{0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),

    #[error("{0}")]
    Other(String),
}

/// Error payload of the hosted provider. Auth endpoints answer with
/// `{code, error_code, msg}` (or the older `{error, error_description}`),
/// table endpoints with `{code, message, details, hint}`.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthError {
    /// Classify an unsuccessful provider response
    pub fn from_provider_response(status: u16, body: &str) -> Self {
        let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();

        let invalid_credentials = parsed.error_code.as_deref() == Some("invalid_credentials")
            || (status == 400 && parsed.error.as_deref() == Some("invalid_grant"));
        if invalid_credentials {
            return AuthError::InvalidCredentials;
        }

        let message = parsed
            .msg
            .or(parsed.message)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        AuthError::Provider { status, message }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }

    pub fn is_credentials_error(&self) -> bool {
        matches!(self, AuthError::InvalidCredentials)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            AuthError::Network(err.to_string())
        } else if err.is_decode() {
            AuthError::Other(format!("Malformed provider response: {}", err))
        } else {
            AuthError::Other(err.to_string())
        }
    }
}

/// Structured sign-in failure handed back to the caller for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInFailure {
    pub message: String,
    pub is_network_error: bool,
    pub is_credentials_error: bool,
}

impl From<&AuthError> for SignInFailure {
    fn from(err: &AuthError) -> Self {
        let message = match err {
            AuthError::Network(_) => {
                "Unable to reach the sign-in service. Check your connection and try again."
                    .to_string()
            }
            AuthError::InvalidCredentials => "Invalid email or password.".to_string(),
            other => other.to_string(),
        };

        Self {
            message,
            is_network_error: err.is_network_error(),
            is_credentials_error: err.is_credentials_error(),
        }
    }
}

/// Errors returned by the HTTP surface
#[derive(Error, Debug)]
pub enum PortalError {
    /// Sign-in failed; carries the structured failure
    #[error("{}", .0.message)]
    SignIn(SignInFailure),

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized access
    #[error("Unauthorized")]
    Unauthorized,

    /// Upstream provider is unreachable
    #[error("Service unavailable")]
    Unavailable,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl From<AuthError> for PortalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => PortalError::BadRequest(msg),
            AuthError::NotAuthenticated => PortalError::Unauthorized,
            AuthError::Network(_) => PortalError::Unavailable,
            AuthError::Provider { status, message } if (400..500).contains(&status) => {
                PortalError::BadRequest(message)
            }
            _ => PortalError::InternalServerError,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            PortalError::SignIn(failure) => {
                let status = if failure.is_network_error {
                    StatusCode::SERVICE_UNAVAILABLE
                } else if failure.is_credentials_error {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::BAD_REQUEST
                };
                (status, json!({ "error": failure }))
            }
            PortalError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": { "message": msg } }))
            }
            PortalError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "message": "Unauthorized" } }),
            ),
            PortalError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": { "message": "Service unavailable" } }),
            ),
            PortalError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": { "message": "Internal server error" } }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for HTTP handler results
pub type PortalResult<T> = Result<T, PortalError>;
