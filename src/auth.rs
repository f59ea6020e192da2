//! OAuth2 service-account token exchange for Google APIs.
//!
//! Google-hosted providers authenticate with a short-lived bearer token
//! obtained by signing a JWT with the service account's private key and
//! trading it at the token endpoint (the "JWT bearer" grant). Everything
//! about that exchange stays behind [`get_access_token`].

use crate::error::ProviderError;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

const PROVIDER: &str = "google-oauth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Scope needed for Discovery Engine (Vertex AI Search).
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// The subset of a Google service-account key file we need.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Sign the RS256 assertion sent to the token endpoint.
///
/// The assertion is valid for one hour from `issued_at` (unix seconds).
pub fn build_assertion(
    account: &ServiceAccount,
    scope: &str,
    issued_at: i64,
) -> Result<String, ProviderError> {
    let claims = AssertionClaims {
        iss: account.client_email.clone(),
        scope: scope.to_string(),
        aud: account.token_uri.clone(),
        iat: issued_at,
        exp: issued_at + 3600,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
        ProviderError::Auth {
            provider: PROVIDER,
            message: format!("invalid private key: {e}"),
        }
    })?;
    encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| ProviderError::Auth {
        provider: PROVIDER,
        message: format!("cannot sign assertion: {e}"),
    })
}

/// Exchange a service-account credential for a bearer token.
///
/// # Errors
///
/// [`ProviderError::Auth`] when the key cannot sign, [`ProviderError::Http`]
/// on transport failure, and [`ProviderError::Status`] when the token
/// endpoint refuses the assertion.
#[instrument(level = "info", skip_all, fields(client_email = %account.client_email))]
pub async fn get_access_token(
    http: &Client,
    account: &ServiceAccount,
    scope: &str,
) -> Result<String, ProviderError> {
    let assertion = build_assertion(account, scope, Utc::now().timestamp())?;

    let response = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|source| ProviderError::Http {
            provider: PROVIDER,
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider: PROVIDER,
            status: status.as_u16(),
            body: crate::utils::truncate_for_log(&body, 300),
        });
    }

    let token: TokenResponse = response.json().await.map_err(|e| ProviderError::Decode {
        provider: PROVIDER,
        message: e.to_string(),
    })?;
    debug!("Obtained access token");
    Ok(token.access_token)
}
