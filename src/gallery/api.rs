//! Gallery API trait and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::FetchError;
use crate::events::{GalleryImage, ImageUpload};

/// Remote surface for reading and editing event galleries.
///
/// Implementations talk to the site's REST API, which fronts the image
/// store. Listing a known event without photos returns an empty list rather
/// than an error.
#[async_trait]
pub trait GalleryApi: Send + Sync {
    /// Ordered images of an event's gallery.
    async fn list_images(&self, event_id: &str) -> Result<Vec<GalleryImage>, FetchError>;

    /// Upload an image and return the stored record.
    async fn upload_image(
        &self,
        event_id: &str,
        upload: ImageUpload,
    ) -> Result<GalleryImage, FetchError>;

    /// Delete an image by its store identifier.
    async fn delete_image(&self, event_id: &str, public_id: &str) -> Result<(), FetchError>;

    /// Replace an image caption; `None` clears it.
    async fn update_caption(
        &self,
        event_id: &str,
        public_id: &str,
        caption: Option<String>,
    ) -> Result<GalleryImage, FetchError>;
}

/// Map-backed gallery store.
#[derive(Debug, Default)]
pub struct InMemoryGalleryApi {
    galleries: RwLock<HashMap<String, Vec<GalleryImage>>>,
}

impl InMemoryGalleryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event, replacing any existing gallery.
    pub fn insert_event(&self, event_id: impl Into<String>, images: Vec<GalleryImage>) {
        self.galleries.write().insert(event_id.into(), images);
    }

    /// Remove an event and its gallery.
    pub fn remove_event(&self, event_id: &str) -> bool {
        self.galleries.write().remove(event_id).is_some()
    }

    pub fn image_count(&self, event_id: &str) -> usize {
        self.galleries.read().get(event_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl GalleryApi for InMemoryGalleryApi {
    async fn list_images(&self, event_id: &str) -> Result<Vec<GalleryImage>, FetchError> {
        self.galleries
            .read()
            .get(event_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("event {}", event_id)))
    }

    async fn upload_image(
        &self,
        event_id: &str,
        upload: ImageUpload,
    ) -> Result<GalleryImage, FetchError> {
        let mut galleries = self.galleries.write();
        let gallery = galleries
            .get_mut(event_id)
            .ok_or_else(|| FetchError::NotFound(format!("event {}", event_id)))?;

        let public_id = format!("events/{}/{}", event_id, uuid::Uuid::new_v4().simple());
        let image = GalleryImage {
            url: format!("memory://{}/{}", public_id, upload.file_name),
            public_id,
            caption: upload.caption,
            uploaded_at: Utc::now(),
        };
        gallery.push(image.clone());
        Ok(image)
    }

    async fn delete_image(&self, event_id: &str, public_id: &str) -> Result<(), FetchError> {
        let mut galleries = self.galleries.write();
        let gallery = galleries
            .get_mut(event_id)
            .ok_or_else(|| FetchError::NotFound(format!("event {}", event_id)))?;

        let before = gallery.len();
        gallery.retain(|image| image.public_id != public_id);
        if gallery.len() == before {
            return Err(FetchError::NotFound(format!("image {}", public_id)));
        }
        Ok(())
    }

    async fn update_caption(
        &self,
        event_id: &str,
        public_id: &str,
        caption: Option<String>,
    ) -> Result<GalleryImage, FetchError> {
        let mut galleries = self.galleries.write();
        let image = galleries
            .get_mut(event_id)
            .and_then(|gallery| gallery.iter_mut().find(|i| i.public_id == public_id))
            .ok_or_else(|| FetchError::NotFound(format!("image {}", public_id)))?;

        image.caption = caption;
        Ok(image.clone())
    }
}
