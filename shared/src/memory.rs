//! In-process store implementations for tests.
//!
//! Compiled for this crate's tests and, through the `test-util` feature, for
//! downstream crates' tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::content::ContentRepository;
use crate::credentials::CredentialStore;
use crate::form::UploadedFile;
use crate::images::{ImageStore, StoredImage};
use crate::models::{Content, ContentFields};
use crate::{Error, Result};

fn poisoned<T>(_: T) -> Error {
    Error::Internal("store lock poisoned".to_string())
}

/// Content entries held in a vector, insertion ordered.
#[derive(Default)]
pub struct MemoryContentRepository {
    entries: Mutex<Vec<Content>>,
    writes: AtomicUsize,
}

impl MemoryContentRepository {
    /// Number of successful inserts, updates and deletes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn insert(&self, fields: &ContentFields, banner_image_url: Option<&str>) -> Result<Content> {
        let now = Utc::now();
        let content = Content {
            id: Uuid::new_v4(),
            content_type: fields.content_type.clone(),
            title: fields.title.clone(),
            author: fields.author.clone(),
            publication_date: fields.publication_date,
            content: fields.content.clone(),
            tags: fields.tags.clone(),
            banner_image_url: banner_image_url.map(String::from),
            created_at: now,
            updated_at: now,
        };
        self.entries.lock().map_err(poisoned)?.push(content.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(content)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Content>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Content>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.iter().rev().cloned().collect())
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ContentFields,
        banner_image_url: Option<&str>,
    ) -> Result<Option<Content>> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let Some(entry) = entries.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        entry.content_type = fields.content_type.clone();
        entry.title = fields.title.clone();
        entry.author = fields.author.clone();
        entry.publication_date = fields.publication_date;
        entry.content = fields.content.clone();
        entry.tags = fields.tags.clone();
        entry.banner_image_url = banner_image_url.map(String::from);
        entry.updated_at = Utc::now();

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(entry.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Content>> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let Some(index) = entries.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(entries.remove(index)))
    }
}

/// Images keyed by public id, served from a fake delivery host.
#[derive(Default)]
pub struct MemoryImageStore {
    images: Mutex<BTreeMap<String, String>>,
    counter: AtomicUsize,
    fail_uploads: bool,
    fail_deletes: bool,
    upload_delay: Option<Duration>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryImageStore {
    /// Store whose uploads always fail.
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Default::default()
        }
    }

    /// Store whose deletes always fail.
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    /// Store whose uploads stall for `delay` before completing.
    pub fn slow_uploads(delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            ..Default::default()
        }
    }

    /// Seed an existing image, returning its delivery URL.
    pub fn seed(&self, public_id: &str) -> String {
        let url = Self::delivery_url(public_id);
        if let Ok(mut images) = self.images.lock() {
            images.insert(public_id.to_string(), url.clone());
        }
        url
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.images
            .lock()
            .map(|images| images.contains_key(public_id))
            .unwrap_or(false)
    }

    /// Public ids passed to `delete`, successful or not.
    pub fn delete_calls(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn delivery_url(public_id: &str) -> String {
        format!(
            "https://res.cloudinary.com/local/image/upload/v1700000000/{}.png",
            public_id
        )
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredImage> {
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_uploads {
            return Err(Error::Upload(format!("rejected {}", file.file_name)));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let public_id = format!("{}/image_{}", folder.trim_end_matches('/'), n);
        let url = Self::delivery_url(&public_id);
        self.images
            .lock()
            .map_err(poisoned)?
            .insert(public_id.clone(), url.clone());

        Ok(StoredImage { url, public_id })
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        self.deleted.lock().map_err(poisoned)?.push(public_id.to_string());
        if self.fail_deletes {
            return Err(Error::Upstream(format!("cannot delete {}", public_id)));
        }
        match self.images.lock().map_err(poisoned)?.remove(public_id) {
            Some(_) => Ok(()),
            None => Err(Error::Upstream(format!("{} not found", public_id))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredImage>> {
        let images = self.images.lock().map_err(poisoned)?;
        Ok(images
            .iter()
            .filter(|(id, _)| id.starts_with(prefix))
            .map(|(id, url)| StoredImage {
                url: url.clone(),
                public_id: id.clone(),
            })
            .collect())
    }
}

/// Single refresh-token slot.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.token.lock().map_err(poisoned)?.clone())
    }

    async fn save_refresh_token(&self, refresh_token: &str) -> Result<()> {
        *self.token.lock().map_err(poisoned)? = Some(refresh_token.to_string());
        Ok(())
    }
}
