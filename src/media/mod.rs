// Media tool abstraction
//
// - Processor: ffmpeg/ffprobe-backed implementation
// - Commands: Command builders and abstractions

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::segment::SilenceInterval;

/// Media operations the segmentation and asset stages rely on
#[async_trait]
pub trait MediaToolTrait: Send + Sync {
    /// Container duration in seconds
    async fn probe_duration(&self, input: &Path) -> Result<f64>;

    /// Silence intervals found in the audio track
    async fn detect_silence(&self, input: &Path, total_duration: f64) -> Result<Vec<SilenceInterval>>;

    /// Re-encode `[start, start + duration)` of `input` into `output`
    async fn extract_clip(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()>;

    /// Extract `[start, start + duration)` of the audio track as mp3
    async fn extract_audio(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()>;

    /// Save the frame at `at` seconds as a jpeg
    async fn extract_thumbnail(&self, input: &Path, at: f64, output: &Path) -> Result<()>;

    /// Check if the media tools are installed
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media tool instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media tool implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Arc<dyn MediaToolTrait> {
        Arc::new(processor::MediaProcessorImpl::new(config))
    }
}
