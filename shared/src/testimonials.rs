//! Testimonial images, held only in the image store.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cms::BANNER_FIELD;
use crate::form::FormData;
use crate::images::{upload_with_timeout, ImageStore, StoredImage};
use crate::models::TESTIMONIAL_FOLDER;
use crate::{Error, Result};

pub struct TestimonialService {
    images: Arc<dyn ImageStore>,
    upload_timeout: Duration,
}

impl TestimonialService {
    pub fn new(images: Arc<dyn ImageStore>, upload_timeout: Duration) -> Self {
        Self {
            images,
            upload_timeout,
        }
    }

    pub async fn list(&self) -> Result<Vec<StoredImage>> {
        self.images.list(&format!("{}/", TESTIMONIAL_FOLDER)).await
    }

    pub async fn add(&self, form: &FormData) -> Result<StoredImage> {
        let file = form
            .file(BANNER_FIELD)
            .ok_or_else(|| Error::Validation("No image uploaded".to_string()))?;
        let image =
            upload_with_timeout(self.images.as_ref(), file, TESTIMONIAL_FOLDER, self.upload_timeout)
                .await?;

        info!("Uploaded testimonial image {}", image.public_id);
        Ok(image)
    }

    pub async fn delete(&self, public_id: &str) -> Result<()> {
        self.images.delete(public_id).await?;
        info!("Deleted testimonial image {}", public_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::UploadedFile;
    use crate::memory::MemoryImageStore;
    use bytes::Bytes;

    fn form_with_image() -> FormData {
        let mut form = FormData::default();
        form.files.insert(
            BANNER_FIELD.to_string(),
            UploadedFile {
                file_name: "quote.jpg".into(),
                content_type: Some("image/jpeg".into()),
                bytes: Bytes::from_static(b"jpeg"),
            },
        );
        form
    }

    #[tokio::test]
    async fn test_add_list_delete() {
        let images = Arc::new(MemoryImageStore::default());
        images.seed("blogs/unrelated");
        let service = TestimonialService::new(images.clone(), Duration::from_secs(10));

        assert!(matches!(
            service.add(&FormData::default()).await,
            Err(Error::Validation(_))
        ));

        let added = service.add(&form_with_image()).await.unwrap();
        assert!(added.public_id.starts_with("testimonials/"));
        assert_eq!(service.list().await.unwrap(), vec![added.clone()]);

        service.delete(&added.public_id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(images.contains("blogs/unrelated"));
    }

    #[tokio::test]
    async fn test_add_times_out() {
        let images = Arc::new(MemoryImageStore::slow_uploads(Duration::from_millis(200)));
        let service = TestimonialService::new(images, Duration::from_millis(20));
        assert!(matches!(
            service.add(&form_with_image()).await,
            Err(Error::Timeout(_))
        ));
    }
}
