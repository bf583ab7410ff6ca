//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::GoogleConfig;
use crate::oauth::OAuthCredentials;
use crate::{Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Google OAuth client credentials as stored in Secrets Manager.
#[derive(Debug, Deserialize)]
struct GoogleOAuthSecret {
    client_id: String,
    client_secret: String,
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Config("Secret has no string value".to_string()))?
        .to_string();

    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}

/// Resolve the Google OAuth client credentials.
///
/// Environment values win; otherwise the JSON secret named by
/// `GOOGLE_OAUTH_SECRET_ARN` is fetched (once per process).
pub async fn google_oauth_credentials(google: &GoogleConfig) -> Result<OAuthCredentials> {
    if let (Some(client_id), Some(client_secret)) = (&google.client_id, &google.client_secret) {
        return Ok(OAuthCredentials {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            redirect_uri: google.redirect_uri.clone(),
        });
    }

    let secret_arn = google
        .secret_arn
        .as_deref()
        .ok_or_else(|| Error::Config("GOOGLE_CLIENT_ID not set".to_string()))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&aws_config);
    let secret_string = get_secret(&client, secret_arn).await?;
    let secret = parse_google_secret(&secret_string)?;

    info!("Loaded Google OAuth credentials from Secrets Manager");

    Ok(OAuthCredentials {
        client_id: secret.client_id,
        client_secret: secret.client_secret,
        redirect_uri: google.redirect_uri.clone(),
    })
}

fn parse_google_secret(secret_string: &str) -> Result<GoogleOAuthSecret> {
    serde_json::from_str(secret_string)
        .map_err(|e| Error::Config(format!("Failed to parse Google OAuth secret: {}", e)))
}

/// Clear the secrets cache (useful for testing or credential rotation).
pub async fn clear_cache() {
    let mut cache = get_cache().write().await;
    cache.clear();
}
