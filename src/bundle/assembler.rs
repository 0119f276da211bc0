use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::beat::{Beat, MediaReference};
use super::manifest::{BeatData, ViewerBundle};
use crate::error::{BundleError, Result};
use crate::localize::LocalizedAsset;

/// Bundle-relative name for media attached to the beat at 0-based `beat_index`.
pub fn media_file_name(beat_index: usize, source: &Path) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", beat_index + 1, ext)
}

/// Bundle-relative name for a video beat's thumbnail. Falls back to
/// `{n}_thumb.{ext}` when `{n}.{ext}` is already taken by the video itself.
fn thumbnail_file_name(beat_index: usize, video: &Path, thumbnail: &Path) -> String {
    let name = media_file_name(beat_index, thumbnail);
    if name != media_file_name(beat_index, video) {
        return name;
    }
    match name.split_once('.') {
        Some((stem, ext)) => format!("{}_thumb.{}", stem, ext),
        None => format!("{}_thumb", name),
    }
}

/// Builds `mulmo_view.json` and the media it points at inside one output directory
pub struct BundleAssembler {
    output_dir: PathBuf,
}

impl BundleAssembler {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self { output_dir: output_dir.as_ref().to_path_buf() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Copy the beat's media, thumbnail and own audio into the bundle.
    /// Files already present are left untouched.
    pub fn stage_media(&self, beat_index: usize, beat: &Beat) -> Result<()> {
        match &beat.media {
            MediaReference::Image { path } => {
                self.stage_file(path, &media_file_name(beat_index, path))?;
            }
            MediaReference::Video { path, thumbnail } => {
                self.stage_file(path, &media_file_name(beat_index, path))?;
                if let Some(thumb) = thumbnail {
                    self.stage_file(thumb, &thumbnail_file_name(beat_index, path, thumb))?;
                }
            }
        }

        if let Some(audio) = &beat.audio {
            self.stage_file(audio, &media_file_name(beat_index, audio))?;
        }

        Ok(())
    }

    fn stage_file(&self, source: &Path, name: &str) -> Result<()> {
        let dest = self.output_dir.join(name);
        if dest.is_file() {
            debug!("{} already staged", name);
            return Ok(());
        }
        if !source.is_file() {
            return Err(BundleError::FileNotFound(source.display().to_string()));
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let partial = dest.with_extension("partial");
        std::fs::copy(source, &partial)?;
        std::fs::rename(&partial, &dest)?;
        debug!("Staged {} -> {}", source.display(), dest.display());
        Ok(())
    }

    pub fn beat_data(&self, beat_index: usize, beat: &Beat, asset: &LocalizedAsset) -> BeatData {
        let (video_source, image_source, thumbnail) = match &beat.media {
            MediaReference::Image { path } => (None, Some(media_file_name(beat_index, path)), None),
            MediaReference::Video { path, thumbnail } => (
                Some(media_file_name(beat_index, path)),
                None,
                thumbnail.as_deref().map(|t| thumbnail_file_name(beat_index, path, t)),
            ),
        };

        BeatData {
            text: beat.text.clone(),
            start_time: beat.timing.start,
            end_time: beat.timing.end,
            duration: beat.timing.duration,
            audio_sources: asset.audio_sources(),
            multi_linguals: asset.multi_linguals(),
            video_source,
            image_source,
            thumbnail,
        }
    }

    /// Merge beats with their localization results, in order.
    pub fn assemble(
        &self,
        source_lang: &str,
        beats: &[Beat],
        localized: &[LocalizedAsset],
    ) -> Result<ViewerBundle> {
        if beats.len() != localized.len() {
            return Err(BundleError::InvalidInput(format!(
                "{} beats but {} localization results",
                beats.len(),
                localized.len()
            )));
        }

        let data = beats
            .iter()
            .zip(localized)
            .enumerate()
            .map(|(i, (beat, asset))| self.beat_data(i, beat, asset))
            .collect();

        let bundle = ViewerBundle::new(source_lang, data);
        info!(
            "Assembled {} beats ({:.1}s) in {}",
            bundle.total_segments,
            bundle.total_duration,
            self.output_dir.display()
        );
        Ok(bundle)
    }

    /// Manifest for a run that has localized only the first `localized.len()` beats.
    /// Remaining beats keep whatever `prior` recorded for them.
    pub fn assemble_partial(
        &self,
        source_lang: &str,
        beats: &[Beat],
        localized: &[LocalizedAsset],
        prior: Option<&ViewerBundle>,
    ) -> ViewerBundle {
        let done = localized.len().min(beats.len());
        let mut data: Vec<BeatData> = beats[..done]
            .iter()
            .zip(localized)
            .enumerate()
            .map(|(i, (beat, asset))| self.beat_data(i, beat, asset))
            .collect();

        if let Some(prior) = prior {
            data.extend(prior.beats.iter().take(beats.len()).skip(done).cloned());
        }

        ViewerBundle::new(source_lang, data)
    }

    pub fn write(&self, bundle: &ViewerBundle) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        bundle.save(&self.output_dir)
    }
}
