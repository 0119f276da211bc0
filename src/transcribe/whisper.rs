// Whisper command-line implementation

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, debug};

use crate::config::TranscriberConfig;
use crate::error::{Result, BundleError};
use super::{TranscriberTrait, Transcript, WhisperOutput};

/// Runs the `whisper` CLI and reads back its JSON output
pub struct WhisperCliTranscriber {
    config: TranscriberConfig,
}

impl WhisperCliTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TranscriberTrait for WhisperCliTranscriber {
    fn check_availability(&self) -> Result<()> {
        let output = std::process::Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .map_err(|e| BundleError::Transcription(format!("{} not found: {}", self.config.binary_path, e)))?;

        if output.status.success() {
            info!("Whisper command-line tool is available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BundleError::Transcription(format!(
                "Whisper not available. Install with: pip install openai-whisper\nError: {}",
                stderr
            )))
        }
    }

    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<Transcript> {
        info!("Transcribing {} (language hint: {})", audio_path.display(), language.unwrap_or("auto"));

        // Whisper writes <stem>.json into the output directory
        let temp_dir = tempfile::tempdir()
            .map_err(|e| BundleError::Transcription(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(audio_path)
            .arg("--model").arg(&self.config.model)
            .arg("--output_dir").arg(output_dir)
            .arg("--output_format").arg("json")
            .arg("--temperature").arg("0");

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }

        debug!("Executing whisper command: {:?}", cmd);

        let output = cmd.output().await
            .map_err(|e| BundleError::Transcription(format!("Failed to execute whisper command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BundleError::Transcription(format!(
                "Whisper transcription failed: {}",
                stderr
            )));
        }

        let audio_stem = audio_path.file_stem()
            .ok_or_else(|| BundleError::Transcription("Invalid audio filename".to_string()))?;
        let json_file = output_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        if !json_file.exists() {
            return Err(BundleError::Transcription("Whisper JSON output file not found".to_string()));
        }

        let json_content = tokio::fs::read_to_string(&json_file).await
            .map_err(|e| BundleError::Transcription(format!("Failed to read JSON output: {}", e)))?;

        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| BundleError::Transcription(format!("Failed to parse Whisper JSON: {}", e)))?;

        let transcript = whisper_output.into_transcript(language);
        info!("Transcribed {} segments", transcript.segments.len());
        Ok(transcript)
    }
}
