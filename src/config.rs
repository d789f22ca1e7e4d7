//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or an explicit path), then applies `MINDPOP_WORK_DIR` and
//! `MINDPOP_LOG_LEVEL` overrides. Secrets (`JWT_SECRET`, `LLM_API_KEY`,
//! `IMAGE_API_KEY`) come from the environment only, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// SQLite file name under `work_dir`.
const DB_FILENAME: &str = "mindpop.db";

/// Token signing and account policy.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens. From `JWT_SECRET`.
    pub jwt_secret: String,
    /// Lifetime of an issued token.
    pub token_ttl_days: i64,
    /// Accounts registered with one of these emails get the admin flag.
    pub admin_emails: Vec<String>,
}

/// OpenAI / OpenAI-compatible chat provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Upper bound on generated tokens per request.
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

/// LLM used for typing-practice content.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `"dummy"` or `"openai"`. Maps to `default` in `[llm]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// OpenAI-compatible image generation endpoint (`[images.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiImagesConfig {
    pub api_base_url: String,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub timeout_seconds: u64,
}

/// Image generation for jigsaw artwork.
#[derive(Debug, Clone)]
pub struct ImagesConfig {
    pub provider: String,
    pub openai: OpenAiImagesConfig,
}

/// Reading exercise. `transcriber` is an external command (program plus
/// leading args) that receives `<audio path> <language>` and prints the
/// transcript on stdout. Empty means the exercise is unavailable.
#[derive(Debug, Clone)]
pub struct DyslexiaConfig {
    pub transcriber: Vec<String>,
    pub language: String,
}

/// Fully-resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_name: String,
    /// Socket address the HTTP listener binds to.
    pub bind: String,
    /// Directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Root of served uploads; profile pictures live in `profiles/` below it.
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub llm_api_key: Option<String>,
    pub images: ImagesConfig,
    pub image_api_key: Option<String>,
    pub dyslexia: DyslexiaConfig,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.work_dir.join(DB_FILENAME)
    }

    pub fn profile_uploads_dir(&self) -> PathBuf {
        self.uploads_dir.join("profiles")
    }

    pub fn audio_uploads_dir(&self) -> PathBuf {
        self.uploads_dir.join("audio")
    }

    /// Config rooted at `work_dir` with dummy providers and no external
    /// calls. Used by tests and local experiments.
    pub fn local_default(work_dir: &Path, jwt_secret: &str) -> Self {
        Self {
            server_name: "mindpop-local".into(),
            bind: default_bind(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            uploads_dir: work_dir.join("uploads"),
            max_upload_bytes: default_max_upload_bytes(),
            auth: AuthConfig {
                jwt_secret: jwt_secret.to_string(),
                token_ttl_days: default_token_ttl_days(),
                admin_emails: Vec::new(),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: RawOpenAiConfig::default().into(),
            },
            llm_api_key: None,
            images: ImagesConfig {
                provider: "dummy".into(),
                openai: RawOpenAiImages::default().into(),
            },
            image_api_key: None,
            dyslexia: DyslexiaConfig { transcriber: Vec::new(), language: default_language() },
        }
    }
}

/// Values taken from the process environment. Tests build this directly
/// instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub jwt_secret: Option<String>,
    pub llm_api_key: Option<String>,
    pub image_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("MINDPOP_WORK_DIR").ok(),
            log_level: env::var("MINDPOP_LOG_LEVEL").ok(),
            jwt_secret: env::var("JWT_SECRET").ok(),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            image_api_key: env::var("IMAGE_API_KEY").ok(),
        }
    }
}

// ── raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    server: RawServer,
    #[serde(default)]
    auth: RawAuth,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    images: RawImages,
    #[serde(default)]
    dyslexia: RawDyslexia,
}

#[derive(Deserialize)]
struct RawServer {
    name: String,
    work_dir: String,
    log_level: String,
    #[serde(default = "default_bind")]
    bind: String,
    /// Relative paths are resolved against `work_dir`.
    #[serde(default = "default_uploads_dir")]
    uploads_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    max_upload_bytes: usize,
}

#[derive(Deserialize)]
struct RawAuth {
    #[serde(default = "default_token_ttl_days")]
    token_ttl_days: i64,
    #[serde(default)]
    admin_emails: Vec<String>,
}

impl Default for RawAuth {
    fn default() -> Self {
        Self { token_ttl_days: default_token_ttl_days(), admin_emails: Vec::new() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl From<RawOpenAiConfig> for OpenAiConfig {
    fn from(r: RawOpenAiConfig) -> Self {
        Self {
            api_base_url: r.api_base_url,
            model: r.model,
            temperature: r.temperature,
            max_tokens: r.max_tokens,
            timeout_seconds: r.timeout_seconds,
        }
    }
}

#[derive(Deserialize)]
struct RawImages {
    #[serde(rename = "default", default = "default_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiImages,
}

impl Default for RawImages {
    fn default() -> Self {
        Self { provider: default_provider(), openai: RawOpenAiImages::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiImages {
    #[serde(default = "default_images_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_images_model")]
    model: String,
    #[serde(default = "default_images_size")]
    size: String,
    #[serde(default = "default_images_quality")]
    quality: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiImages {
    fn default() -> Self {
        Self {
            api_base_url: default_images_api_base_url(),
            model: default_images_model(),
            size: default_images_size(),
            quality: default_images_quality(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl From<RawOpenAiImages> for OpenAiImagesConfig {
    fn from(r: RawOpenAiImages) -> Self {
        Self {
            api_base_url: r.api_base_url,
            model: r.model,
            size: r.size,
            quality: r.quality,
            timeout_seconds: r.timeout_seconds,
        }
    }
}

#[derive(Deserialize)]
struct RawDyslexia {
    #[serde(default)]
    transcriber: Vec<String>,
    #[serde(default = "default_language")]
    language: String,
}

impl Default for RawDyslexia {
    fn default() -> Self {
        Self { transcriber: Vec::new(), language: default_language() }
    }
}

fn default_bind() -> String { "127.0.0.1:8001".to_string() }
fn default_uploads_dir() -> String { "uploads".to_string() }
fn default_max_upload_bytes() -> usize { 5 * 1024 * 1024 }
fn default_token_ttl_days() -> i64 { 30 }
fn default_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_max_tokens() -> u32 { 100 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_images_api_base_url() -> String { "https://api.openai.com/v1/images/generations".to_string() }
fn default_images_model() -> String { "dall-e-3".to_string() }
fn default_images_size() -> String { "1024x1024".to_string() }
fn default_images_quality() -> String { "standard".to_string() }
fn default_language() -> String { "hi-IN".to_string() }

// ── loading ───────────────────────────────────────────────────────────────────

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        &EnvOverrides::from_env(),
    )
}

/// Loader with an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.server;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.as_deref().unwrap_or(&s.log_level).to_string();
    logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("[server].log_level: {e}")))?;

    let uploads_dir = {
        let p = expand_home(&s.uploads_dir);
        if p.is_absolute() { p } else { work_dir.join(p) }
    };

    let jwt_secret = overrides
        .jwt_secret
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Config("JWT_SECRET must be set".into()))?;

    if parsed.auth.token_ttl_days <= 0 {
        return Err(AppError::Config("[auth].token_ttl_days must be positive".into()));
    }

    Ok(Config {
        server_name: s.name,
        bind: s.bind,
        work_dir,
        log_level,
        uploads_dir,
        max_upload_bytes: s.max_upload_bytes,
        auth: AuthConfig {
            jwt_secret,
            token_ttl_days: parsed.auth.token_ttl_days,
            admin_emails: parsed
                .auth
                .admin_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
        },
        llm: LlmConfig { provider: parsed.llm.provider, openai: parsed.llm.openai.into() },
        llm_api_key: overrides.llm_api_key.clone(),
        images: ImagesConfig {
            provider: parsed.images.provider,
            openai: parsed.images.openai.into(),
        },
        image_api_key: overrides.image_api_key.clone(),
        dyslexia: DyslexiaConfig {
            transcriber: parsed.dyslexia.transcriber,
            language: parsed.dyslexia.language,
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
