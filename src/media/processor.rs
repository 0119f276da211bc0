use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, BundleError};
use crate::segment::{parse_silence_log, SilenceInterval};
use super::{MediaToolTrait, MediaCommandBuilder};

/// Concrete implementation of the media tool (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaToolTrait for MediaProcessorImpl {
    async fn probe_duration(&self, input: &Path) -> Result<f64> {
        if !input.exists() {
            return Err(BundleError::FileNotFound(input.display().to_string()));
        }

        let output = self.command_builder.probe_duration(input).execute_capture().await?;
        let duration: f64 = output.stdout.trim().parse()
            .map_err(|_| BundleError::Media(format!(
                "Unreadable duration for {}: {:?}", input.display(), output.stdout.trim()
            )))?;

        debug!("{} lasts {:.3}s", input.display(), duration);
        Ok(duration)
    }

    async fn detect_silence(&self, input: &Path, total_duration: f64) -> Result<Vec<SilenceInterval>> {
        info!("Detecting silence in {}", input.display());

        let output = self.command_builder
            .detect_silence(input, self.config.silence_noise_db, self.config.silence_min_duration)
            .execute_capture()
            .await?;

        let intervals = parse_silence_log(&output.stderr, total_duration);
        info!("Found {} silence intervals", intervals.len());
        Ok(intervals)
    }

    async fn extract_clip(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()> {
        info!("Cutting clip {:.2}s+{:.2}s -> {}", start, duration, output.display());
        self.command_builder
            .extract_clip(input, start, duration, output, &self.config.clip_options)
            .execute()
            .await
    }

    async fn extract_audio(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()> {
        info!("Extracting audio {:.2}s+{:.2}s -> {}", start, duration, output.display());
        self.command_builder
            .extract_audio(input, start, duration, output)
            .execute()
            .await
    }

    async fn extract_thumbnail(&self, input: &Path, at: f64, output: &Path) -> Result<()> {
        info!("Grabbing thumbnail at {:.2}s -> {}", at, output.display());
        self.command_builder
            .extract_thumbnail(input, at, output)
            .execute()
            .await
    }

    /// Check if media processor is available
    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| BundleError::Media(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(BundleError::Media(format!("{} version check failed", binary)));
            }
        }

        info!("Media tools are available");
        Ok(())
    }
}
