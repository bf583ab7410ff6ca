//! Content repository backed by the `content` table.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::{self, DbSettings};
use crate::models::{Content, ContentFields};
use crate::Result;

/// Storage for content entries.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert(&self, fields: &ContentFields, banner_image_url: Option<&str>) -> Result<Content>;

    async fn find(&self, id: Uuid) -> Result<Option<Content>>;

    /// Every entry, newest first.
    async fn list(&self) -> Result<Vec<Content>>;

    /// Overwrite all editable fields. `None` when the entry vanished.
    async fn update(
        &self,
        id: Uuid,
        fields: &ContentFields,
        banner_image_url: Option<&str>,
    ) -> Result<Option<Content>>;

    /// Remove an entry, returning its last state.
    async fn delete(&self, id: Uuid) -> Result<Option<Content>>;
}

const CONTENT_COLUMNS: &str = "id, content_type, title, author, publication_date, content, tags, \
                               banner_image_url, created_at, updated_at";

/// Postgres implementation using the process-wide pool.
pub struct PgContentRepository {
    settings: DbSettings,
}

impl PgContentRepository {
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn insert(&self, fields: &ContentFields, banner_image_url: Option<&str>) -> Result<Content> {
        let pool = db::pool(&self.settings).await?;
        let now = Utc::now();

        let content = sqlx::query_as::<_, Content>(&format!(
            r#"
            INSERT INTO content (id, content_type, title, author, publication_date, content, tags,
                                 banner_image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {}
            "#,
            CONTENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&fields.content_type)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(fields.publication_date)
        .bind(&fields.content)
        .bind(&fields.tags)
        .bind(banner_image_url)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(content)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Content>> {
        let pool = db::pool(&self.settings).await?;

        let content = sqlx::query_as::<_, Content>(&format!(
            "SELECT {} FROM content WHERE id = $1",
            CONTENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(content)
    }

    async fn list(&self) -> Result<Vec<Content>> {
        let pool = db::pool(&self.settings).await?;

        let contents = sqlx::query_as::<_, Content>(&format!(
            "SELECT {} FROM content ORDER BY created_at DESC",
            CONTENT_COLUMNS
        ))
        .fetch_all(pool)
        .await?;

        Ok(contents)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ContentFields,
        banner_image_url: Option<&str>,
    ) -> Result<Option<Content>> {
        let pool = db::pool(&self.settings).await?;

        let content = sqlx::query_as::<_, Content>(&format!(
            r#"
            UPDATE content SET
                content_type = $2,
                title = $3,
                author = $4,
                publication_date = $5,
                content = $6,
                tags = $7,
                banner_image_url = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CONTENT_COLUMNS
        ))
        .bind(id)
        .bind(&fields.content_type)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(fields.publication_date)
        .bind(&fields.content)
        .bind(&fields.tags)
        .bind(banner_image_url)
        .fetch_optional(pool)
        .await?;

        Ok(content)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Content>> {
        let pool = db::pool(&self.settings).await?;

        let content = sqlx::query_as::<_, Content>(&format!(
            "DELETE FROM content WHERE id = $1 RETURNING {}",
            CONTENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(content)
    }
}
