//! Shared library for the CMS Lambda functions.
//!
//! Holds configuration, stores, external clients and the content workflows
//! behind every API route.

pub mod auth;
pub mod calendar;
pub mod cms;
pub mod config;
pub mod content;
pub mod credentials;
pub mod db;
pub mod error;
pub mod form;
pub mod http;
pub mod images;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod oauth;
pub mod secrets;
pub mod testimonials;

pub use auth::{login, require_admin, AdminClaims, IssuedToken};
pub use calendar::{CalendarClient, CalendarService, InsertEventRequest, ListEventsQuery};
pub use cms::ContentService;
pub use config::Config;
pub use content::{ContentRepository, PgContentRepository};
pub use credentials::{CredentialStore, PgCredentialStore};
pub use db::DbSettings;
pub use error::{Error, Result};
pub use images::{CloudinaryClient, ImageStore, StoredImage};
pub use models::{Content, ContentFields};
pub use oauth::{OAuthCredentials, TokenClient, TokenSet};
pub use testimonials::TestimonialService;
