//! Third-party backed routes: jigsaw artwork and the read-aloud check.

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::extract::ApiJson;
use super::{ApiState, blocking};
use crate::error::{ApiError, AppError};
use crate::games::reading::{self, ReadingResult};

const MIN_PROMPT_CHARS: usize = 10;
const IMAGE_PROMPT_PREFIX: &str = "Create a child-friendly, colorful image for a jigsaw puzzle: ";

#[derive(Debug, Deserialize)]
pub(super) struct ImageRequest {
    #[serde(default)]
    prompt: String,
}

/// POST /api/generate-image
pub(super) async fn generate_image(
    State(state): State<ApiState>,
    ApiJson(req): ApiJson<ImageRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.prompt.chars().count() < MIN_PROMPT_CHARS {
        return Err(ApiError::BadRequest("Prompt must be at least 10 characters long".into()));
    }
    let prompt = format!("{IMAGE_PROMPT_PREFIX}{}", req.prompt);
    let url = state.images.generate(&prompt).await.map_err(|e| {
        error!(error = %e, "image generation failed");
        ApiError::Upstream(e.to_string())
    })?;
    Ok(Json(json!({ "output": url })))
}

// ── dyslexia ─────────────────────────────────────────────────────────────────

fn is_wav(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let by_type = matches!(content_type, Some("audio/wav" | "audio/x-wav" | "audio/wave"));
    let by_name = file_name.is_some_and(|n| n.to_ascii_lowercase().ends_with(".wav"));
    by_type || by_name
}

#[derive(Default)]
struct ReadingForm {
    audio: Option<Vec<u8>>,
    sentence: Option<String>,
}

async fn read_reading_form(mut multipart: Multipart, max_bytes: usize) -> Result<ReadingForm, ApiError> {
    let mut form = ReadingForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name().unwrap_or_default() {
            "audio" => {
                if !is_wav(field.content_type(), field.file_name()) {
                    return Err(ApiError::BadRequest("Only WAV files are allowed".into()));
                }
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::BadRequest("File too large".into()));
                }
                form.audio = Some(bytes.to_vec()).filter(|b| !b.is_empty());
            }
            "sentence" => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.sentence = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Removes the saved recording when dropped.
struct TempAudio(PathBuf);

impl Drop for TempAudio {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(path = %self.0.display(), error = %e, "failed to remove audio upload");
        }
    }
}

/// POST /api/dyslexia/run (multipart: `audio`, `sentence`)
pub(super) async fn dyslexia_run(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<Json<ReadingResult>, ApiError> {
    let form = read_reading_form(multipart, state.config.max_upload_bytes).await?;
    let audio = form.audio.ok_or_else(|| ApiError::BadRequest("No audio file uploaded".into()))?;
    let sentence = form.sentence.ok_or_else(|| ApiError::BadRequest("No sentence provided".into()))?;

    if !state.transcriber.is_configured() {
        return Err(ApiError::Upstream("Speech recognition is not available".into()));
    }

    let dir = state.config.audio_uploads_dir();
    let path = dir.join(format!("audio-{}.wav", uuid::Uuid::new_v4()));
    let target = path.clone();
    blocking(move || {
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&target, &audio)?;
        Ok::<_, AppError>(())
    })
    .await?;
    let saved = TempAudio(path);

    let transcript = state.transcriber.transcribe(&saved.0).await.map_err(|e| {
        error!(error = %e, "transcription failed");
        ApiError::Upstream("Failed to process audio".into())
    })?;
    drop(saved);

    let result = reading::assess(&sentence, &transcript);
    info!(accuracy = result.accuracy, "reading assessed");
    Ok(Json(result))
}
