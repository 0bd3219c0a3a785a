//! Image generation through the AI gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::provider::http::{bearer_headers, shared_client, status_to_error, trim_trailing_slash};
use crate::util::timeout::with_timeout;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub media_type: String,
}

impl GeneratedImage {
    /// A URL the client can render directly: the remote URL, or a `data:` URL.
    pub fn display_url(&self) -> Option<String> {
        self.url.clone().or_else(|| {
            self.base64
                .as_ref()
                .map(|b64| format!("data:{};base64,{b64}", self.media_type))
        })
    }
}

/// Turns a text prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage>;
}

/// OpenAI-compatible `images/generations` client.
#[derive(Debug, Clone)]
pub struct GatewayImageClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GatewayImageClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ImageGenerator for GatewayImageClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(ParleyError::MalformedRequest("Prompt is required".into()));
        }

        let url = format!("{}/images/generations", trim_trailing_slash(&self.base_url));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "response_format": "b64_json",
        });

        debug!(model = %self.model, "generating image");

        with_timeout(self.timeout, async {
            let resp = shared_client()
                .post(&url)
                .headers(bearer_headers(&self.api_key))
                .json(&body)
                .send()
                .await?;

            let status = resp.status().as_u16();
            if status != 200 {
                let text = resp.text().await.unwrap_or_default();
                return Err(ParleyError::upstream(
                    "image",
                    status_to_error(status, &text).to_string(),
                ));
            }

            let data: ImagesResponse = resp.json().await?;
            let first = data
                .data
                .into_iter()
                .next()
                .ok_or_else(|| ParleyError::upstream("image", "response contains no images"))?;

            if first.b64_json.is_none() && first.url.is_none() {
                return Err(ParleyError::upstream("image", "image has neither data nor url"));
            }

            Ok(GeneratedImage {
                base64: first.b64_json,
                url: first.url,
                media_type: first.media_type.unwrap_or_else(|| "image/png".to_string()),
            })
        })
        .await
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
    #[serde(alias = "mime_type")]
    media_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_url_prefers_remote_url() {
        let image = GeneratedImage {
            base64: Some("AAAA".into()),
            url: Some("https://cdn.example.com/a.png".into()),
            media_type: "image/png".into(),
        };
        assert_eq!(image.display_url().unwrap(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn display_url_falls_back_to_data_url() {
        let image = GeneratedImage {
            base64: Some("AAAA".into()),
            url: None,
            media_type: "image/png".into(),
        };
        assert_eq!(image.display_url().unwrap(), "data:image/png;base64,AAAA");
    }
}
