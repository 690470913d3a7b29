//! Gallery client with deduplicated reads and invalidating writes.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{Deduplicator, FetchResult, RequestKey};
use crate::events::{GalleryImage, ImageUpload};

use super::GalleryApi;

/// Reads galleries through a [`Deduplicator`] and invalidates an event's
/// pending reads after every successful write to its gallery.
pub struct GalleryClient<A: ?Sized> {
    api: Arc<A>,
    dedup: Deduplicator<Vec<GalleryImage>>,
}

impl<A: ?Sized> Clone for GalleryClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            dedup: self.dedup.clone(),
        }
    }
}

impl<A: GalleryApi + ?Sized + 'static> GalleryClient<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            dedup: Deduplicator::new(),
        }
    }

    /// Get the underlying API.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Get the deduplicator.
    pub fn dedup(&self) -> &Deduplicator<Vec<GalleryImage>> {
        &self.dedup
    }

    /// Fetch an event's gallery, joining an identical request in flight.
    pub async fn gallery(&self, event_id: &str) -> FetchResult<Vec<GalleryImage>> {
        let api = Arc::clone(&self.api);
        let id = event_id.to_string();
        self.dedup
            .deduplicate(RequestKey::gallery(event_id), move || async move {
                api.list_images(&id).await
            })
            .await
    }

    /// Upload an image, then invalidate the event's gallery reads.
    pub async fn upload(&self, event_id: &str, upload: ImageUpload) -> FetchResult<GalleryImage> {
        let image = self.api.upload_image(event_id, upload).await?;
        self.invalidate(event_id);
        Ok(image)
    }

    /// Delete an image, then invalidate the event's gallery reads.
    pub async fn delete_image(&self, event_id: &str, public_id: &str) -> FetchResult<()> {
        self.api.delete_image(event_id, public_id).await?;
        self.invalidate(event_id);
        Ok(())
    }

    /// Update a caption, then invalidate the event's gallery reads.
    pub async fn update_caption(
        &self,
        event_id: &str,
        public_id: &str,
        caption: Option<String>,
    ) -> FetchResult<GalleryImage> {
        let image = self.api.update_caption(event_id, public_id, caption).await?;
        self.invalidate(event_id);
        Ok(image)
    }

    /// Drop pending reads for one event's gallery.
    pub fn invalidate(&self, event_id: &str) -> usize {
        let removed = self.dedup.clear_cache(Some(&RequestKey::gallery_scope(event_id)));
        debug!(event_id, removed, "Invalidated gallery reads");
        removed
    }

    /// Drop every pending read.
    pub fn invalidate_all(&self) -> usize {
        self.dedup.clear_cache(None)
    }
}
