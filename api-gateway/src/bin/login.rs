//! Admin Login Lambda - Exchanges the admin password for a bearer token.
//!
//! Endpoints:
//! - POST /login - Issue a 30-minute admin token

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::http::{error_response, parse_json_body, preflight_response, reply, route_path};
use shared::IssuedToken;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: String,
}

struct AppState {
    jwt_secret: String,
    admin_password: String,
}

impl AppState {
    fn new() -> Result<Self, Error> {
        let config = shared::Config::from_env()?;
        Ok(Self {
            jwt_secret: config.jwt_secret,
            admin_password: config.admin_password,
        })
    }

    fn login(&self, body: &Body) -> shared::Result<IssuedToken> {
        let request: LoginRequest = parse_json_body(body)?;
        let issued = shared::login(&request.password, &self.admin_password, &self.jwt_secret)?;
        info!("Issued admin token");
        Ok(issued)
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(&event);
    let method = event.method().as_str();

    match (method, path.as_str()) {
        ("OPTIONS", _) => preflight_response(),
        ("POST", "/login") => reply(200, "Login successful", state.login(event.body())),
        (_, "/login") => error_response(&shared::Error::MethodNotAllowed),
        _ => error_response(&shared::Error::NotFound(format!("No route for {}", path))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new()?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
