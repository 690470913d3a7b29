//! REST adapter for the site's gallery endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{ConfigError, FetchError, Result};
use crate::events::{GalleryImage, ImageUpload};

use super::GalleryApi;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "EVENT_GALLERY_API_TOKEN";

/// Gallery API backed by HTTP calls to `{base_url}/events/{id}/gallery`.
pub struct HttpGalleryApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

/// Listing responses come either bare or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImagesResponse {
    Bare(Vec<GalleryImage>),
    Wrapped {
        #[serde(alias = "galleryImages", alias = "data")]
        images: Vec<GalleryImage>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageResponse {
    Wrapped {
        #[serde(alias = "data")]
        image: GalleryImage,
    },
    Bare(GalleryImage),
}

#[derive(Debug, Serialize)]
struct CaptionRequest<'a> {
    caption: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

impl HttpGalleryApi {
    /// Create a new HTTP gallery API from configuration.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url".to_string()).into());
        }
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ConfigError::Invalid(format!("Invalid api.base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "Invalid api.base_url: {}",
                config.base_url
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to create HTTP client: {}", e)))?;

        let token = config
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|t| !t.is_empty());

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Append percent-encoded segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `from_config`: the base can always take segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn gallery_url(&self, event_id: &str) -> Url {
        self.endpoint(&["events", event_id, "gallery"])
    }

    fn image_url(&self, event_id: &str, public_id: &str) -> Url {
        // Store ids may contain folder separators; each id stays one segment.
        self.endpoint(&["events", event_id, "gallery", public_id])
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<Response, FetchError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transport("Request timed out".to_string())
    } else if e.is_connect() {
        FetchError::Transport(format!("Connection failed: {}", e))
    } else {
        FetchError::Transport(format!("Request failed: {}", e))
    }
}

async fn check_status(response: Response) -> std::result::Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        _ => FetchError::Http {
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, FetchError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(format!("Failed to read response: {}", e)))?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[async_trait]
impl GalleryApi for HttpGalleryApi {
    async fn list_images(&self, event_id: &str) -> std::result::Result<Vec<GalleryImage>, FetchError> {
        let response = self.send(self.client.get(self.gallery_url(event_id))).await?;
        let images = match decode::<ImagesResponse>(response).await? {
            ImagesResponse::Bare(images) | ImagesResponse::Wrapped { images } => images,
        };
        Ok(images)
    }

    async fn upload_image(
        &self,
        event_id: &str,
        upload: ImageUpload,
    ) -> std::result::Result<GalleryImage, FetchError> {
        let part = multipart::Part::bytes(upload.data.to_vec())
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| FetchError::Decode(format!("Invalid content type: {}", e)))?;

        let mut form = multipart::Form::new().part("image", part);
        if let Some(caption) = upload.caption {
            form = form.text("caption", caption);
        }

        let request = self.client.post(self.gallery_url(event_id)).multipart(form);
        let response = self.send(request).await?;
        let image = match decode::<ImageResponse>(response).await? {
            ImageResponse::Bare(image) | ImageResponse::Wrapped { image } => image,
        };
        Ok(image)
    }

    async fn delete_image(&self, event_id: &str, public_id: &str) -> std::result::Result<(), FetchError> {
        self.send(self.client.delete(self.image_url(event_id, public_id)))
            .await?;
        Ok(())
    }

    async fn update_caption(
        &self,
        event_id: &str,
        public_id: &str,
        caption: Option<String>,
    ) -> std::result::Result<GalleryImage, FetchError> {
        let request = self
            .client
            .patch(self.image_url(event_id, public_id))
            .json(&CaptionRequest {
                caption: caption.as_deref(),
            });
        let response = self.send(request).await?;
        let image = match decode::<ImageResponse>(response).await? {
            ImageResponse::Bare(image) | ImageResponse::Wrapped { image } => image,
        };
        Ok(image)
    }
}
