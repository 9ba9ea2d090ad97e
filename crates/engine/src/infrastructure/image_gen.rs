//! Image generation and background removal clients
//!
//! `OpenAiImageClient` talks to an OpenAI-style `/v1/images/generations`
//! endpoint and asks for `b64_json` output. `HttpBackgroundRemover` posts raw
//! PNG bytes to a rembg-style service and gets the cut-out PNG back.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::ports::{
    BackgroundRemovalPort, ImageGenError, ImageGenPort, ImageRequest, ImageResult,
};

/// Default image model.
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Client for the images API
#[derive(Clone)]
pub struct OpenAiImageClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout for generation
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }
}

#[async_trait]
impl ImageGenPort for OpenAiImageClient {
    async fn generate(&self, request: ImageRequest) -> Result<ImageResult, ImageGenError> {
        let body = ImagesRequest {
            model: self.model.clone(),
            prompt: request.prompt,
            n: 1,
            size: request.shape.size(),
            response_format: "b64_json".to_string(),
        };

        let mut http = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            if e.is_connect() {
                ImageGenError::Unavailable
            } else {
                ImageGenError::GenerationFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImageGenError::GenerationFailed(error_text));
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ImageGenError::GenerationFailed(e.to_string()))?;

        first_image(parsed)
    }
}

fn first_image(response: ImagesResponse) -> Result<ImageResult, ImageGenError> {
    response
        .data
        .into_iter()
        .find_map(|d| d.b64_json)
        .map(|image_b64| ImageResult { image_b64 })
        .ok_or_else(|| ImageGenError::GenerationFailed("No image in response".to_string()))
}

/// Client for a background removal service
#[derive(Clone)]
pub struct HttpBackgroundRemover {
    client: Client,
    url: String,
}

impl HttpBackgroundRemover {
    pub fn new(url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl BackgroundRemovalPort for HttpBackgroundRemover {
    async fn remove_background(&self, image_b64: String) -> Result<String, ImageGenError> {
        let bytes = STANDARD
            .decode(image_b64.as_bytes())
            .map_err(|e| ImageGenError::BackgroundRemovalFailed(format!("invalid base64: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ImageGenError::BackgroundRemovalFailed(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImageGenError::BackgroundRemovalFailed(error_text));
        }

        let cut_out = response
            .bytes()
            .await
            .map_err(|e| ImageGenError::BackgroundRemovalFailed(e.to_string()))?;

        Ok(STANDARD.encode(cut_out))
    }
}

// =============================================================================
// Images API types
// =============================================================================

#[derive(Debug, Serialize)]
struct ImagesRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}
