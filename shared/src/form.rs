//! Multipart form parsing for content and testimonial uploads.

use bytes::Bytes;
use futures_util::stream;
use lambda_http::http::HeaderMap;
use lambda_http::Body;
use std::collections::HashMap;

use crate::{Error, Result};

/// Largest accepted image file.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed multipart form. Repeated fields keep their first value.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// Trimmed text field, `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    /// Non-empty file part.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).filter(|f| !f.bytes.is_empty())
    }
}

/// Parse a `multipart/form-data` request body.
pub async fn parse_multipart(headers: &HeaderMap, body: &Body) -> Result<FormData> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Validation("Missing Content-Type header".to_string()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| Error::Validation(format!("Expected multipart/form-data: {}", e)))?;

    let data = Bytes::copy_from_slice(body.as_ref());
    let stream = stream::once(async move { Ok::<_, std::io::Error>(data) });

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().per_field(MAX_FILE_SIZE));
    let mut multipart = multer::Multipart::with_constraints(stream, boundary, constraints);

    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(String::from) {
            let content_type = field.content_type().map(|m| m.to_string());
            let bytes = field.bytes().await.map_err(form_error)?;
            form.files.entry(name).or_insert(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let text = field.text().await.map_err(form_error)?;
            form.fields.entry(name).or_insert(text);
        }
    }

    Ok(form)
}

fn form_error(e: multer::Error) -> Error {
    match e {
        multer::Error::FieldSizeExceeded { .. } | multer::Error::StreamSizeExceeded { .. } => {
            Error::Validation(format!("File exceeds {} bytes", MAX_FILE_SIZE))
        }
        other => Error::Validation(format!("Invalid multipart body: {}", other)),
    }
}
