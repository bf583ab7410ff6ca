//! Content entry workflows.
//!
//! Image store and database have no shared transaction. Writes are ordered so
//! a failed upload never leaves a document behind; a crash between steps can
//! still orphan an uploaded image, and cleanup failures are only logged.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::content::ContentRepository;
use crate::form::{FormData, UploadedFile};
use crate::images::{public_id_from_url, upload_with_timeout, ImageStore, StoredImage};
use crate::models::{Content, ContentFields};
use crate::{Error, Result};

/// Multipart field carrying the banner image.
pub const BANNER_FIELD: &str = "banner_image";

pub struct ContentService {
    repository: Arc<dyn ContentRepository>,
    images: Arc<dyn ImageStore>,
    upload_timeout: Duration,
}

fn not_found(id: &str) -> Error {
    Error::NotFound(format!("No content found with ID: {}", id))
}

/// Unparseable ids cannot exist, so they are reported the same way as absent ones.
fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| not_found(id))
}

impl ContentService {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        images: Arc<dyn ImageStore>,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            images,
            upload_timeout,
        }
    }

    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredImage> {
        upload_with_timeout(self.images.as_ref(), file, folder, self.upload_timeout).await
    }

    /// Delete the image behind `url`, logging instead of failing.
    async fn remove_image_best_effort(&self, url: Option<&str>, content_id: Uuid) {
        let Some(public_id) = url.and_then(public_id_from_url) else {
            return;
        };
        match self.images.delete(&public_id).await {
            Ok(()) => info!("Deleted banner image {} of content {}", public_id, content_id),
            Err(e) => warn!(
                "Failed to delete banner image {} of content {}; image may be orphaned: {}",
                public_id, content_id, e
            ),
        }
    }

    pub async fn create(&self, form: &FormData) -> Result<Content> {
        let fields = ContentFields::from_form(form)?;

        let banner = match form.file(BANNER_FIELD) {
            Some(file) => Some(self.upload(file, fields.image_folder()).await?),
            None => None,
        };

        let content = self
            .repository
            .insert(&fields, banner.as_ref().map(|b| b.url.as_str()))
            .await?;

        info!("Created content {} ({})", content.id, content.content_type);
        Ok(content)
    }

    pub async fn get(&self, id: &str) -> Result<Content> {
        let uuid = parse_id(id)?;
        self.repository.find(uuid).await?.ok_or_else(|| not_found(id))
    }

    /// Every entry. An empty collection is reported as `NotFound`.
    pub async fn get_all(&self) -> Result<Vec<Content>> {
        let contents = self.repository.list().await?;
        if contents.is_empty() {
            return Err(Error::NotFound("No blogs found".to_string()));
        }
        Ok(contents)
    }

    pub async fn update(&self, id: &str, form: &FormData) -> Result<Content> {
        let fields = ContentFields::from_form(form)?;
        let uuid = parse_id(id)?;
        let existing = self.repository.find(uuid).await?.ok_or_else(|| not_found(id))?;

        let mut banner_image_url = existing.banner_image_url.clone();
        if let Some(file) = form.file(BANNER_FIELD) {
            self.remove_image_best_effort(existing.banner_image_url.as_deref(), uuid)
                .await;
            let uploaded = self.upload(file, fields.image_folder()).await?;
            banner_image_url = Some(uploaded.url);
        }

        let updated = self
            .repository
            .update(uuid, &fields, banner_image_url.as_deref())
            .await?
            .ok_or_else(|| not_found(id))?;

        info!("Updated content {}", updated.id);
        Ok(updated)
    }

    /// Remove an entry and, best effort, its banner. Returns the removed entry.
    pub async fn delete(&self, id: &str) -> Result<Content> {
        let uuid = parse_id(id)?;
        let existing = self.repository.find(uuid).await?.ok_or_else(|| not_found(id))?;

        self.remove_image_best_effort(existing.banner_image_url.as_deref(), uuid)
            .await;

        let deleted = self
            .repository
            .delete(uuid)
            .await?
            .ok_or_else(|| not_found(id))?;

        info!("Deleted content {}", deleted.id);
        Ok(deleted)
    }
}
