//! Speech-to-text through an external command.
//!
//! The configured command (program plus leading args) is run with the audio
//! path and language code appended; its stdout is the transcript.

use std::path::Path;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DyslexiaConfig;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("no transcriber configured")]
    NotConfigured,
    #[error("failed to run transcriber: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("transcriber exited with {status}: {stderr}")]
    Failed { status: std::process::ExitStatus, stderr: String },
}

#[derive(Debug, Clone)]
pub struct Transcriber {
    command: Vec<String>,
    language: String,
}

impl Transcriber {
    pub fn new(config: &DyslexiaConfig) -> Self {
        Self { command: config.transcriber.clone(), language: config.language.clone() }
    }

    pub fn is_configured(&self) -> bool {
        !self.command.is_empty()
    }

    /// Transcript of `audio`, trimmed. Empty when nothing was recognized.
    pub async fn transcribe(&self, audio: &Path) -> Result<String, TranscribeError> {
        let (program, args) = self.command.split_first().ok_or(TranscribeError::NotConfigured)?;
        debug!(program = %program, audio = %audio.display(), language = %self.language, "running transcriber");

        let output = Command::new(program)
            .args(args)
            .arg(audio)
            .arg(&self.language)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, %stderr, "transcriber failed");
            return Err(TranscribeError::Failed { status: output.status, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber(command: &[&str]) -> Transcriber {
        Transcriber::new(&DyslexiaConfig {
            transcriber: command.iter().map(|s| s.to_string()).collect(),
            language: "hi-IN".into(),
        })
    }

    #[tokio::test]
    async fn unconfigured_is_error() {
        let t = transcriber(&[]);
        assert!(!t.is_configured());
        assert!(matches!(
            t.transcribe(Path::new("a.wav")).await,
            Err(TranscribeError::NotConfigured)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_transcript() {
        // `echo <path> <lang>` stands in for a recognizer.
        let t = transcriber(&["echo"]);
        let text = t.transcribe(Path::new("clip.wav")).await.unwrap();
        assert_eq!(text, "clip.wav hi-IN");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_error() {
        let t = transcriber(&["false"]);
        assert!(matches!(
            t.transcribe(Path::new("clip.wav")).await,
            Err(TranscribeError::Failed { .. })
        ));
    }
}
