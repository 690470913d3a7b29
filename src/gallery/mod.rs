//! Gallery access for events.
//!
//! - **Api**: the [`GalleryApi`] trait with an HTTP adapter and an in-memory
//!   store for tests and offline use.
//! - **Client**: deduplicated reads, writes that invalidate pending reads.
//! - **Loader**: batched preview loading for event lists.

pub mod api;
pub mod client;
pub mod http;
pub mod loader;

pub use api::{GalleryApi, InMemoryGalleryApi};
pub use client::GalleryClient;
pub use http::{HttpGalleryApi, TOKEN_ENV_VAR};
pub use loader::{GalleryBatchLoader, LoadReport};
