//! Text and image generation providers.
//!
//! `LlmProvider` and `ImageProvider` are enums over concrete backends in
//! `providers/`. Instances are shared immutable capabilities; clone them
//! freely. Enum dispatch keeps `complete`/`generate` plain `async fn`s with
//! no trait-object machinery.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider enums ────────────────────────────────────────────────────────────

/// Chat-completion backends used for typing-practice text.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `content` as a single user message and return the text reply.
    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(content).await,
        }
    }
}

/// Image-generation backends used for jigsaw artwork.
#[derive(Debug, Clone)]
pub enum ImageProvider {
    Dummy(providers::dummy::DummyImageProvider),
    OpenAi(providers::openai_images::OpenAiImageProvider),
}

impl ImageProvider {
    /// Generate one image for `prompt` and return its URL.
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        match self {
            ImageProvider::Dummy(p) => p.generate(prompt).await,
            ImageProvider::OpenAi(p) => p.generate(prompt).await,
        }
    }
}
