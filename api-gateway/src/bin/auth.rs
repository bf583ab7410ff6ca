//! Google Calendar OAuth Lambda - Onboards the calendar integration.
//!
//! Endpoints:
//! - GET /auth - Return the consent URL
//! - GET /auth?code= - OAuth callback: exchange the code and store the refresh token

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::http::{error_response, html_response, preflight_response, query_param, route_path, success_response};
use shared::{CredentialStore, DbSettings, PgCredentialStore, TokenClient};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONNECTED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Calendar Connected</title>
    <script>window.close();</script>
</head>
<body>
    <p>Authorization successful. You can close this window now.</p>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct ConsentUrl {
    #[serde(rename = "authUrl")]
    auth_url: String,
}

/// Result of a GET /auth request.
enum Onboarding {
    Consent(String),
    Connected,
    /// Code exchanged but the provider issued no refresh token.
    NoRefreshToken,
}

struct AppState {
    tokens: TokenClient,
    credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = shared::Config::from_env()?;
        let oauth = shared::secrets::google_oauth_credentials(&config.google).await?;

        Ok(Self {
            tokens: TokenClient::new(oauth)?,
            credentials: Arc::new(PgCredentialStore::new(DbSettings::from(&config))),
        })
    }

    async fn onboard(&self, event: &Request) -> shared::Result<Onboarding> {
        if let Some(error) = query_param(event, "error") {
            return Err(shared::Error::Validation(format!("OAuth error: {}", error)));
        }

        let Some(code) = query_param(event, "code") else {
            let url = self.tokens.authorize_url();
            info!("Issued calendar consent URL");
            return Ok(Onboarding::Consent(url));
        };

        let tokens = self.tokens.exchange_code(&code).await?;
        match tokens.refresh_token {
            Some(refresh_token) => {
                self.credentials.save_refresh_token(&refresh_token).await?;
                info!("Stored calendar refresh token");
                Ok(Onboarding::Connected)
            }
            None => {
                warn!("Provider returned no refresh token; stored credential left unchanged");
                Ok(Onboarding::NoRefreshToken)
            }
        }
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(&event);
    let method = event.method().as_str();

    match (method, path.as_str()) {
        ("OPTIONS", _) => preflight_response(),
        ("GET", "/auth") => match state.onboard(&event).await {
            Ok(Onboarding::Consent(auth_url)) => success_response(
                200,
                "Authorize this app by visiting the consent URL",
                ConsentUrl { auth_url },
            ),
            Ok(Onboarding::Connected) => html_response(200, CONNECTED_PAGE),
            Ok(Onboarding::NoRefreshToken) => success_response(
                200,
                "Authorization completed but no refresh token was issued; the existing calendar connection is unchanged",
                serde_json::json!({ "refreshTokenStored": false }),
            ),
            Err(err) => error_response(&err),
        },
        (_, "/auth") => error_response(&shared::Error::MethodNotAllowed),
        _ => error_response(&shared::Error::NotFound(format!("No route for {}", path))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::RequestExt;
    use shared::memory::MemoryCredentialStore;
    use shared::OAuthCredentials;
    use std::collections::HashMap;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(server: &MockServer, store: Arc<MemoryCredentialStore>) -> Arc<AppState> {
        let tokens = TokenClient::with_endpoints(
            OAuthCredentials {
                client_id: "client-id".into(),
                client_secret: "client-secret".into(),
                redirect_uri: "https://cms.example.com/api/auth".into(),
            },
            "https://accounts.example.com/o/oauth2/v2/auth",
            format!("{}/token", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        Arc::new(AppState {
            tokens,
            credentials: store,
        })
    }

    fn get(query: &[(&str, &str)]) -> Request {
        let params: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lambda_http::http::Request::builder()
            .method("GET")
            .uri("/api/auth")
            .body(Body::Empty)
            .unwrap()
            .with_query_string_parameters(params)
    }

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    async fn mount_exchange(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_consent_url_without_code() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryCredentialStore::default());
        let response = handler(state(&server, store), get(&[])).await.unwrap();

        assert_eq!(response.status(), 200);
        let url = body_json(&response)["data"]["authUrl"].as_str().unwrap().to_string();
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn test_callback_stores_refresh_token() {
        let server = MockServer::start().await;
        mount_exchange(
            &server,
            serde_json::json!({"access_token": "at", "refresh_token": "rt-new"}),
        )
        .await;

        let store = Arc::new(MemoryCredentialStore::with_token("rt-old"));
        let response = handler(state(&server, store.clone()), get(&[("code", "abc")]))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("rt-new"));
    }

    #[tokio::test]
    async fn test_callback_without_refresh_token_keeps_existing() {
        let server = MockServer::start().await;
        mount_exchange(&server, serde_json::json!({"access_token": "at"})).await;

        let store = Arc::new(MemoryCredentialStore::with_token("rt-old"));
        let response = handler(state(&server, store.clone()), get(&[("code", "abc")]))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["data"]["refreshTokenStored"], false);
        assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("rt-old"));
    }

    #[tokio::test]
    async fn test_provider_error_is_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::default());
        let response = handler(state(&server, store), get(&[("error", "access_denied")]))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_rejected_code_is_upstream_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::default());
        let response = handler(state(&server, store.clone()), get(&[("code", "abc")]))
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(body_json(&response)["kind"], "upstream_auth_error");
        assert!(store.refresh_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_not_allowed() {
        let server = MockServer::start().await;
        let request = lambda_http::http::Request::builder()
            .method("POST")
            .uri("/auth")
            .body(Body::Empty)
            .unwrap();
        let response = handler(state(&server, Arc::new(MemoryCredentialStore::default())), request)
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
    }
}
