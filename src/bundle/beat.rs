use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BundleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl Timing {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end, duration: end - start }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaReference {
    Image { path: PathBuf },
    Video { path: PathBuf, thumbnail: Option<PathBuf> },
}

/// One narrated content unit. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    pub text: String,
    pub media: MediaReference,
    /// Source-language narration that already exists (e.g. a video segment's own audio)
    pub audio: Option<PathBuf>,
    pub timing: Timing,
}

/// Beat list handed over by a document extractor
#[derive(Debug, Clone, Deserialize)]
pub struct BeatList {
    pub lang: String,
    pub beats: Vec<BeatEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeatEntry {
    pub text: String,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub video: Option<PathBuf>,
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl BeatList {
    /// Load a beat list; relative media paths resolve against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BundleError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut list: BeatList = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in &mut list.beats {
            for slot in [&mut entry.image, &mut entry.video, &mut entry.thumbnail, &mut entry.audio] {
                if let Some(p) = slot.as_mut() {
                    if p.is_relative() {
                        *p = base.join(&*p);
                    }
                }
            }
        }

        Ok(list)
    }

    /// Turn entries into beats laid end to end, in list order.
    pub fn into_beats(self, default_duration: f64) -> Result<(String, Vec<Beat>)> {
        if self.lang.trim().is_empty() {
            return Err(BundleError::InvalidInput("beat list has no source language".to_string()));
        }

        let mut beats = Vec::with_capacity(self.beats.len());
        let mut cursor = 0.0;

        for (i, entry) in self.beats.into_iter().enumerate() {
            let media = match (entry.image, entry.video) {
                (Some(path), None) => MediaReference::Image { path },
                (None, Some(path)) => MediaReference::Video { path, thumbnail: entry.thumbnail },
                (Some(_), Some(_)) => {
                    return Err(BundleError::InvalidInput(format!(
                        "beat {} has both an image and a video", i + 1
                    )));
                }
                (None, None) => {
                    return Err(BundleError::InvalidInput(format!(
                        "beat {} has no media reference", i + 1
                    )));
                }
            };

            let duration = entry.duration.unwrap_or(default_duration);
            if !(duration >= 0.0) {
                return Err(BundleError::InvalidInput(format!(
                    "beat {} has invalid duration {}", i + 1, duration
                )));
            }

            beats.push(Beat {
                text: entry.text,
                media,
                audio: entry.audio,
                timing: Timing::new(cursor, cursor + duration),
            });
            cursor += duration;
        }

        Ok((self.lang, beats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_beat_list_resolves_paths_and_lays_out_timing() {
        let dir = assert_fs::TempDir::new().unwrap();
        let list = dir.child("beats.json");
        list.write_str(r#"{
            "lang": "en",
            "beats": [
                {"text": "Welcome", "image": "slides/1.png", "duration": 4.0},
                {"text": "Demo", "video": "demo.mp4"},
                {"text": "Bye", "image": "/abs/3.png", "audio": "bye.mp3", "duration": 2.5}
            ]
        }"#).unwrap();

        let (lang, beats) = BeatList::from_file(list.path()).unwrap().into_beats(5.0).unwrap();

        assert_eq!(lang, "en");
        assert_eq!(beats.len(), 3);
        assert_eq!(beats[0].media, MediaReference::Image { path: dir.path().join("slides/1.png") });
        assert_eq!(beats[1].timing, Timing::new(4.0, 9.0));
        assert_eq!(beats[2].media, MediaReference::Image { path: PathBuf::from("/abs/3.png") });
        assert_eq!(beats[2].audio, Some(dir.path().join("bye.mp3")));
        assert_eq!(beats[2].timing.end, 11.5);
    }

    #[test]
    fn test_beat_without_media_is_rejected() {
        let list = BeatList {
            lang: "en".to_string(),
            beats: vec![BeatEntry {
                text: "orphan".to_string(),
                image: None,
                video: None,
                thumbnail: None,
                audio: None,
                duration: None,
            }],
        };
        assert!(matches!(list.into_beats(5.0), Err(BundleError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_beat_file() {
        assert!(matches!(
            BeatList::from_file("/nonexistent/beats.json"),
            Err(BundleError::FileNotFound(_))
        ));
    }
}
