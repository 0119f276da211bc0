//! Per-segment asset derivation from a source video.
//!
//! Each segment yields `{n}.mp4`, `{n}.mp3`, `{n}.jpg` and `{n}.txt` in the
//! staging store. Anything already present is reused without touching the
//! tool that would have produced it. ffmpeg writes straight into the store
//! directory, so the store is always disk-backed.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::bundle::{Beat, MediaReference, Timing};
use crate::cache::{ArtifactKey, ArtifactStore, FsArtifactStore};
use crate::error::{BundleError, Result};
use crate::media::MediaToolTrait;
use crate::segment::Segment;
use crate::transcribe::TranscriberTrait;

/// Thumbnails are taken this far into a segment, or halfway for short ones
const THUMBNAIL_OFFSET: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAssets {
    pub segment: Segment,
    pub video: PathBuf,
    pub audio: PathBuf,
    pub thumbnail: PathBuf,
    pub transcript: String,
}

impl SegmentAssets {
    /// A video-backed beat whose source narration is the segment's own audio
    pub fn to_beat(&self) -> Beat {
        Beat {
            text: self.transcript.clone(),
            media: MediaReference::Video {
                path: self.video.clone(),
                thumbnail: Some(self.thumbnail.clone()),
            },
            audio: Some(self.audio.clone()),
            timing: Timing::new(self.segment.start_time, self.segment.end_time),
        }
    }
}

pub struct AssetPipeline {
    media: Arc<dyn MediaToolTrait>,
    transcriber: Arc<dyn TranscriberTrait>,
    store: Arc<FsArtifactStore>,
}

impl AssetPipeline {
    pub fn new(
        media: Arc<dyn MediaToolTrait>,
        transcriber: Arc<dyn TranscriberTrait>,
        store: Arc<FsArtifactStore>,
    ) -> Self {
        Self { media, transcriber, store }
    }

    /// Segments run one after another; the first failure stops the run.
    pub async fn derive_all(
        &self,
        source: &Path,
        segments: &[Segment],
        language: Option<&str>,
    ) -> Result<Vec<SegmentAssets>> {
        let mut assets = Vec::with_capacity(segments.len());
        for segment in segments {
            assets.push(self.derive(source, segment, language).await?);
        }
        info!("Derived assets for {} segments", assets.len());
        Ok(assets)
    }

    pub async fn derive(
        &self,
        source: &Path,
        segment: &Segment,
        language: Option<&str>,
    ) -> Result<SegmentAssets> {
        let n = segment.index;
        let start = segment.start_time;
        let duration = segment.duration;
        debug!("Segment {}: {:.2}s - {:.2}s", n, start, segment.end_time);

        let video = self
            .ensure(&ArtifactKey::video_clip(n), |out| async move {
                self.media.extract_clip(source, start, duration, &out).await
            })
            .await?;

        let audio = self
            .ensure(&ArtifactKey::audio_clip(n), |out| async move {
                self.media.extract_audio(source, start, duration, &out).await
            })
            .await?;

        let at = start + (duration / 2.0).min(THUMBNAIL_OFFSET);
        let thumbnail = self
            .ensure(&ArtifactKey::thumbnail(n), |out| async move {
                self.media.extract_thumbnail(source, at, &out).await
            })
            .await?;

        let transcript = self.transcript(n, &audio, language).await?;

        Ok(SegmentAssets {
            segment: segment.clone(),
            video,
            audio,
            thumbnail,
            transcript,
        })
    }

    /// Run `produce` only when `key` is missing, and insist it leaves a file behind.
    async fn ensure<F, Fut>(&self, key: &ArtifactKey, produce: F) -> Result<PathBuf>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let path = self.store.locate(key);
        if self.store.exists(key) {
            debug!("Reusing {}", path.display());
            return Ok(path);
        }

        // Tools write next to the target; only a finished file takes its name
        let partial = partial_path(&path);
        produce(partial.clone()).await?;

        if !partial.is_file() {
            return Err(BundleError::Media(format!(
                "{} was not produced at {}",
                key,
                partial.display()
            )));
        }
        std::fs::rename(&partial, &path)?;
        Ok(path)
    }

    async fn transcript(&self, n: usize, audio: &Path, language: Option<&str>) -> Result<String> {
        let key = ArtifactKey::transcript(n);
        if let Some(bytes) = self.store.get(&key)? {
            debug!("Reusing transcript {}", key);
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let transcript = self.transcriber.transcribe(audio, language).await?;
        let text = transcript.narration_text();
        self.store.put(&key, text.as_bytes())?;
        info!("Transcribed segment {} ({} chars)", n, text.chars().count());
        Ok(text)
    }
}

/// `1.mp4` -> `1.partial.mp4`; the extension stays last so ffmpeg can infer the format
fn partial_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    path.with_file_name(name)
}
