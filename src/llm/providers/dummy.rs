//! Dummy providers for running without API keys.
//!
//! The text provider answers with a fixed child-friendly sentence so the
//! typing endpoints return something usable; the image provider returns a
//! placeholder URL that embeds nothing from the prompt.

use crate::llm::ProviderError;

const DUMMY_TEXT: &str = "The little cat sat in the warm sun and smiled at the birds.";
const DUMMY_IMAGE_URL: &str = "https://placehold.co/1024x1024/png?text=Mindpop";

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, _content: &str) -> Result<String, ProviderError> {
        Ok(DUMMY_TEXT.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct DummyImageProvider;

impl DummyImageProvider {
    pub async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Ok(DUMMY_IMAGE_URL.to_string())
    }
}
