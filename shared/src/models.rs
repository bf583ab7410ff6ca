//! Shared data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::FormData;
use crate::{Error, Result};

/// Folder for banner images of regular posts.
pub const BLOG_FOLDER: &str = "blogs";
/// Folder for testimonial images.
pub const TESTIMONIAL_FOLDER: &str = "testimonials";

/// A blog post or testimonial entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Content {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub title: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub content: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_image_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Caller-editable fields of a content entry, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFields {
    pub content_type: String,
    pub title: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub content: String,
    pub tags: Vec<String>,
}

impl ContentFields {
    /// Extract and validate fields from a multipart form.
    ///
    /// Every absent or blank required field is reported at once.
    pub fn from_form(form: &FormData) -> Result<Self> {
        let content_type = form.field("contentType");
        let title = form.field("title");
        let author = form.field("author");
        let publication_date = form.field("publication_date");
        let content = form.field("content");

        let missing: Vec<String> = [
            ("contentType", content_type.is_none()),
            ("title", title.is_none()),
            ("author", author.is_none()),
            ("publication_date", publication_date.is_none()),
            ("content", content.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_string())
        .collect();

        match (content_type, title, author, publication_date, content) {
            (Some(content_type), Some(title), Some(author), Some(publication_date), Some(content)) => {
                Ok(Self {
                    content_type,
                    title,
                    author,
                    publication_date: parse_publication_date(&publication_date)?,
                    content,
                    tags: parse_tags(form.field("tags").as_deref()),
                })
            }
            _ => Err(Error::MissingFields(missing)),
        }
    }

    /// Image store folder for this entry's banner.
    pub fn image_folder(&self) -> &'static str {
        if self.content_type == "testimonial" {
            TESTIMONIAL_FOLDER
        } else {
            BLOG_FOLDER
        }
    }
}

/// Split a comma-separated tag list, trimming and dropping blanks.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_publication_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .ok_or_else(|| Error::Validation(format!("Invalid publication_date: {}", raw)))
}
