//! Service-account OAuth bearer flow.
//!
//! Each call signs a fresh RS256 assertion for the requested scopes and
//! exchanges it at the token endpoint using the JWT-bearer grant. Tokens are
//! not cached: every directory operation mints its own.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::security::scopes::effective_scopes;
use crate::security::service_account::ServiceAccountCredential;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum TokenIssuanceError {
    #[error("service account private key is invalid: {0}")]
    InvalidKey(String),
    #[error("signing token assertion failed: {0}")]
    Signing(String),
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Token error {status} {body}")]
    Rejected { status: u16, body: String },
    #[error("token endpoint response is not valid JSON: {0}")]
    Decode(String),
    #[error("token endpoint returned no access token")]
    MissingToken,
}

/// Bearer token minted for one downstream call.
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub scopes: Vec<String>,
    pub expires_at: i64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    credential: Arc<ServiceAccountCredential>,
    key: Arc<EncodingKey>,
    token_url: String,
    http: Client,
}

impl TokenIssuer {
    /// Parses the private key up front so a bad key fails at startup rather
    /// than on the first command.
    pub fn new(
        credential: ServiceAccountCredential,
        token_url: impl Into<String>,
        http: Client,
    ) -> Result<Self, TokenIssuanceError> {
        let key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .map_err(|e| TokenIssuanceError::InvalidKey(e.to_string()))?;
        Ok(Self {
            credential: Arc::new(credential),
            key: Arc::new(key),
            token_url: token_url.into(),
            http,
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Three-segment signed assertion: base64url(header).base64url(claims).base64url(sig)
    pub fn build_assertion(&self, scopes: &[String], now: i64) -> Result<String, TokenIssuanceError> {
        let claims = AssertionClaims {
            iss: &self.credential.client_email,
            scope: scopes.join(" "),
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
            sub: self.credential.subject.as_deref(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| TokenIssuanceError::Signing(e.to_string()))
    }

    pub async fn issue_token(&self, requested: &[&str]) -> Result<AccessToken, TokenIssuanceError> {
        let scopes = effective_scopes(requested, &self.credential.scopes);
        let now = Utc::now().timestamp();
        let assertion = self.build_assertion(&scopes, now)?;

        debug!(
            token_url = %self.token_url,
            scopes = %scopes.join(" "),
            delegated = self.credential.subject.is_some(),
            "exchanging service account assertion"
        );

        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenIssuanceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let payload: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TokenIssuanceError::Decode(e.to_string()))?;
        let value = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenIssuanceError::MissingToken)?;

        Ok(AccessToken {
            value,
            scopes,
            expires_at: now + payload.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
        })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("credential", &self.credential)
            .field("token_url", &self.token_url)
            .finish()
    }
}
