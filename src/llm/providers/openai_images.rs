//! OpenAI image generation (`/v1/images/generations`), one image per call,
//! returned as a hosted URL.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::openai_compatible::check_status;
use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct OpenAiImageProvider {
    client: Client,
    api_base_url: String,
    model: String,
    size: String,
    quality: String,
    api_key: Option<String>,
}

impl OpenAiImageProvider {
    pub fn new(
        api_base_url: String,
        model: String,
        size: String,
        quality: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, size, quality, api_key })
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
            quality: &self.quality,
            response_format: "url",
        };
        debug!(model = %self.model, size = %self.size, prompt_len = prompt.len(), "sending image request");

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "image HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await?;

        let parsed = response.json::<ImageResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize image response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;
        first_url(parsed)
    }
}

fn first_url(parsed: ImageResponse) -> Result<String, ProviderError> {
    parsed
        .data
        .into_iter()
        .find_map(|d| d.url)
        .ok_or_else(|| ProviderError::Request("no image url in response".into()))
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}
