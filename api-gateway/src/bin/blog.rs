//! Blog Lambda - Handles content entry CRUD.
//!
//! Endpoints:
//! - POST /blog/create - Create an entry (admin, multipart with optional banner_image)
//! - GET /blog/get?contentId= - Get one entry
//! - GET /blog/getall - List all entries, newest first
//! - PUT /blog/update?contentId= - Replace an entry's fields (admin, multipart)
//! - DELETE /blog/delete?contentId= - Delete an entry and its banner (admin)

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::form::parse_multipart;
use shared::http::{error_response, preflight_response, reply, require_query_param, route_path};
use shared::images::CloudinaryClient;
use shared::{Content, ContentService, DbSettings, PgContentRepository};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONTENT_ID: &str = "contentId";

struct AppState {
    content: ContentService,
    jwt_secret: String,
}

impl AppState {
    fn new() -> Result<Self, Error> {
        let config = shared::Config::from_env()?;

        let repository = Arc::new(PgContentRepository::new(DbSettings::from(&config)));
        let images = Arc::new(CloudinaryClient::new(config.cloudinary.clone()));

        info!(
            upload_timeout_secs = config.upload_timeout.as_secs(),
            "Blog handler configured"
        );

        Ok(Self {
            content: ContentService::new(repository, images, config.upload_timeout),
            jwt_secret: config.jwt_secret,
        })
    }

    async fn create(&self, event: &Request) -> shared::Result<Content> {
        shared::require_admin(event.headers(), &self.jwt_secret)?;
        let form = parse_multipart(event.headers(), event.body()).await?;
        self.content.create(&form).await
    }

    async fn get(&self, event: &Request) -> shared::Result<Content> {
        let id = require_query_param(event, CONTENT_ID)?;
        self.content.get(&id).await
    }

    async fn update(&self, event: &Request) -> shared::Result<Content> {
        shared::require_admin(event.headers(), &self.jwt_secret)?;
        let id = require_query_param(event, CONTENT_ID)?;
        let form = parse_multipart(event.headers(), event.body()).await?;
        self.content.update(&id, &form).await
    }

    async fn delete(&self, event: &Request) -> shared::Result<Content> {
        shared::require_admin(event.headers(), &self.jwt_secret)?;
        let id = require_query_param(event, CONTENT_ID)?;
        self.content.delete(&id).await
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(&event);
    let method = event.method().as_str();

    match (method, path.as_str()) {
        ("OPTIONS", _) => preflight_response(),

        ("POST", "/blog/create") => reply(
            201,
            "Content created successfully",
            state.create(&event).await,
        ),

        ("GET", "/blog/get") => reply(200, "Content retrieved successfully", state.get(&event).await),

        ("GET", "/blog/getall") => reply(
            200,
            "Contents retrieved successfully",
            state.content.get_all().await,
        ),

        ("PUT", "/blog/update") => reply(
            200,
            "Content updated successfully",
            state.update(&event).await,
        ),

        ("DELETE", "/blog/delete") => reply(
            200,
            "Content deleted successfully",
            state.delete(&event).await,
        ),

        (_, "/blog/create" | "/blog/get" | "/blog/getall" | "/blog/update" | "/blog/delete") => {
            error_response(&shared::Error::MethodNotAllowed)
        }

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
