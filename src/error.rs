//! Error types for upstream calls and HTTP handlers.
//!
//! Upstream failures ([`ProviderError`], [`GatewayError`]) are logged and
//! absorbed close to where they happen. Only [`ApiError`] ever reaches a
//! client, and it carries nothing but missing-input and missing-configuration
//! cases.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Failure talking to a search or fact-check provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-2xx status.
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected envelope.
    #[error("could not decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// OAuth2 token exchange failed.
    #[error("authentication with {provider} failed: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Connect and timeout failures are worth a quick retry; everything
    /// else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http { source, .. } => source.is_connect() || source.is_timeout(),
            _ => false,
        }
    }
}

/// Failure calling an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("gateway returned no completion")]
    EmptyCompletion,
}

/// Messages of validation failures that will never succeed on retry.
const NON_RETRYABLE_MESSAGES: &[&str] = &["Topic is required", "Invalid request"];

impl GatewayError {
    /// Should a retry loop give up immediately on this error?
    pub fn is_non_retryable(&self) -> bool {
        match self {
            GatewayError::Status { status, body } => {
                matches!(status, 400 | 401 | 403 | 404 | 422)
                    || NON_RETRYABLE_MESSAGES.iter().any(|m| body.contains(m))
            }
            _ => false,
        }
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Topic is required")]
    MissingTopic,

    #[error("Claims array is required")]
    MissingClaims,

    #[error("Invalid request: {0}")]
    InvalidBody(String),

    #[error("AI service not configured")]
    NotConfigured,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingTopic | ApiError::MissingClaims | ApiError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
