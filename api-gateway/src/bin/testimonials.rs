//! Testimonials Lambda - Manages testimonial images in the image store.
//!
//! Endpoints:
//! - GET /testimonials - List testimonial images
//! - POST /testimonials - Upload a testimonial image (admin, multipart banner_image)
//! - DELETE /testimonials?public_id= - Delete a testimonial image (admin)

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::form::parse_multipart;
use shared::http::{error_response, preflight_response, reply, require_query_param, route_path};
use shared::images::CloudinaryClient;
use shared::{StoredImage, TestimonialService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct DeletedImage {
    public_id: String,
}

struct AppState {
    testimonials: TestimonialService,
    jwt_secret: String,
}

impl AppState {
    fn new() -> Result<Self, Error> {
        let config = shared::Config::from_env()?;
        let images = Arc::new(CloudinaryClient::new(config.cloudinary.clone()));

        Ok(Self {
            testimonials: TestimonialService::new(images, config.upload_timeout),
            jwt_secret: config.jwt_secret,
        })
    }

    async fn add(&self, event: &Request) -> shared::Result<StoredImage> {
        shared::require_admin(event.headers(), &self.jwt_secret)?;
        let form = parse_multipart(event.headers(), event.body()).await?;
        self.testimonials.add(&form).await
    }

    async fn delete(&self, event: &Request) -> shared::Result<DeletedImage> {
        shared::require_admin(event.headers(), &self.jwt_secret)?;
        let public_id = require_query_param(event, "public_id")?;
        self.testimonials.delete(&public_id).await?;
        Ok(DeletedImage { public_id })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(&event);
    let method = event.method().as_str();

    match (method, path.as_str()) {
        ("OPTIONS", _) => preflight_response(),
        ("GET", "/testimonials") => reply(
            200,
            "Testimonials retrieved successfully",
            state.testimonials.list().await,
        ),
        ("POST", "/testimonials") => reply(201, "Testimonial image uploaded", state.add(&event).await),
        ("DELETE", "/testimonials") => reply(200, "Testimonial image deleted", state.delete(&event).await),
        (_, "/testimonials") => error_response(&shared::Error::MethodNotAllowed),
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
