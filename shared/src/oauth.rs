//! Google OAuth2 token exchange.
//!
//! Covers consent-URL generation, the authorization-code exchange performed
//! by the onboarding callback, and refresh-to-access exchanges made on every
//! calendar request.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope requested during onboarding.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth client registration.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Google token endpoint response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenError {
    error: String,
    error_description: Option<String>,
}

/// Tokens returned by an authorization-code exchange.
#[derive(Debug)]
pub struct TokenSet {
    pub access_token: String,
    /// Only issued on first consent.
    pub refresh_token: Option<String>,
}

/// Client for Google's OAuth2 endpoints.
pub struct TokenClient {
    http_client: reqwest::Client,
    credentials: OAuthCredentials,
    auth_url: String,
    token_url: String,
}

impl TokenClient {
    pub fn new(credentials: OAuthCredentials) -> Result<Self> {
        Self::with_endpoints(credentials, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, DEFAULT_TIMEOUT)
    }

    /// Build a client against custom endpoints (used by tests).
    pub fn with_endpoints(
        credentials: OAuthCredentials,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            credentials,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
        })
    }

    /// Consent URL requesting offline access to the calendar scope.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let params = [
            ("code", code),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("redirect_uri", &self.credentials.redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let tokens = self.request_token(&params, "Token exchange").await?;
        info!(
            has_refresh_token = tokens.refresh_token.is_some(),
            "Exchanged authorization code"
        );

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Exchange a stored refresh token for a short-lived access token.
    ///
    /// A provider rejection is reported as [`Error::UpstreamAuth`]: the stored
    /// credential is unusable and onboarding has to be repeated.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("grant_type", "refresh_token"),
        ];

        let tokens = self.request_token(&params, "Token refresh").await?;
        Ok(tokens.access_token)
    }

    async fn request_token(&self, params: &[(&str, &str)], what: &str) -> Result<GoogleTokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<GoogleTokenError>(&text) {
                Ok(body) => match body.error_description {
                    Some(desc) => format!("{}: {}", body.error, desc),
                    None => body.error,
                },
                Err(_) => format!("HTTP {}", status),
            };
            warn!("{} rejected by provider: {}", what, reason);
            return Err(Error::UpstreamAuth(format!("{} rejected: {}", what, reason)));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{} failed: HTTP {}: {}", what, status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse token response: {}", e)))
    }
}
