//! Provider implementations.
//!
//! `build_llm` and `build_images` are the factories called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;
pub mod openai_images;

use crate::config::{ImagesConfig, LlmConfig};
use crate::llm::{ImageProvider, LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build_llm(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.max_tokens,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

/// Construct an `ImageProvider`; `api_key` comes from `IMAGE_API_KEY`.
pub fn build_images(config: &ImagesConfig, api_key: Option<String>) -> Result<ImageProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(ImageProvider::Dummy(dummy::DummyImageProvider)),
        "openai" => {
            let oai = &config.openai;
            let p = openai_images::OpenAiImageProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.size.clone(),
                oai.quality.clone(),
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(ImageProvider::OpenAi(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
