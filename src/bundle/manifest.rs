use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BundleError, Result};

pub const MANIFEST_FILE: &str = "mulmo_view.json";

/// `mulmo_view.json`: the viewer-facing description of a finished bundle.
///
/// Also the record of what has been generated so far; localization reads it
/// to decide what can be skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerBundle {
    pub lang: String,
    pub total_duration: f64,
    pub total_segments: usize,
    pub beats: Vec<BeatData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatData {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub audio_sources: BTreeMap<String, String>,
    #[serde(default)]
    pub multi_linguals: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl ViewerBundle {
    /// Totals are always derived from `beats`.
    pub fn new(lang: impl Into<String>, beats: Vec<BeatData>) -> Self {
        let total_duration = beats.iter().map(|b| b.duration).sum();
        Self {
            lang: lang.into(),
            total_duration,
            total_segments: beats.len(),
            beats,
        }
    }

    pub fn path<P: AsRef<Path>>(bundle_dir: P) -> PathBuf {
        bundle_dir.as_ref().join(MANIFEST_FILE)
    }

    /// `None` when the bundle has no manifest yet.
    pub fn load<P: AsRef<Path>>(bundle_dir: P) -> Result<Option<Self>> {
        let path = Self::path(bundle_dir);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let bundle: ViewerBundle = serde_json::from_str(&content)
            .map_err(|e| BundleError::Cache(format!("Corrupt manifest {}: {}", path.display(), e)))?;
        Ok(Some(bundle))
    }

    pub fn save<P: AsRef<Path>>(&self, bundle_dir: P) -> Result<()> {
        let path = Self::path(&bundle_dir);
        let content = serde_json::to_string_pretty(self)?;

        let partial = path.with_extension("json.partial");
        std::fs::write(&partial, content)?;
        std::fs::rename(&partial, &path)?;

        debug!("Wrote manifest with {} beats to {}", self.beats.len(), path.display());
        Ok(())
    }

    /// Languages present in every beat's text map
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = match self.beats.first() {
            Some(first) => first.multi_linguals.keys().cloned().collect(),
            None => return vec![self.lang.clone()],
        };
        langs.retain(|lang| self.beats.iter().all(|b| b.multi_linguals.contains_key(lang)));
        langs
    }

    /// Totals agree with the beats they summarize
    pub fn is_consistent(&self) -> bool {
        let sum: f64 = self.beats.iter().map(|b| b.duration).sum();
        self.total_segments == self.beats.len() && (self.total_duration - sum).abs() < 1e-6
    }

    /// Every file the manifest points at, bundle-relative, without duplicates
    pub fn referenced_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for beat in &self.beats {
            let media = [&beat.video_source, &beat.image_source, &beat.thumbnail];
            for name in beat.audio_sources.values().chain(media.into_iter().flatten()) {
                if !files.contains(name) {
                    files.push(name.clone());
                }
            }
        }
        files
    }
}
