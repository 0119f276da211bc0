//! Key-addressed artifact storage.
//!
//! Every generated file has a stable name derived from `(stage, index, lang)`.
//! Reruns consult the store before calling any external tool or service, so a
//! job that stopped halfway picks up where it left off.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{BundleError, Result};

/// Pipeline stage that produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `{n}.mp4`
    VideoClip,
    /// `{n}.mp3`
    AudioClip,
    /// `{n}.jpg`
    Thumbnail,
    /// `{n}.txt`
    Transcript,
    /// `{n}_{lang}.mp3`
    Narration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub stage: Stage,
    /// 1-based segment/beat number
    pub index: usize,
    pub lang: Option<String>,
}

impl ArtifactKey {
    pub fn video_clip(index: usize) -> Self {
        Self { stage: Stage::VideoClip, index, lang: None }
    }

    pub fn audio_clip(index: usize) -> Self {
        Self { stage: Stage::AudioClip, index, lang: None }
    }

    pub fn thumbnail(index: usize) -> Self {
        Self { stage: Stage::Thumbnail, index, lang: None }
    }

    pub fn transcript(index: usize) -> Self {
        Self { stage: Stage::Transcript, index, lang: None }
    }

    /// Narration for the beat at 0-based `beat_index` in `lang`.
    pub fn narration(beat_index: usize, lang: &str) -> Self {
        Self {
            stage: Stage::Narration,
            index: beat_index + 1,
            lang: Some(lang.to_string()),
        }
    }

    /// Stable on-disk file name. Reruns rely on these never changing.
    pub fn file_name(&self) -> String {
        match (self.stage, &self.lang) {
            (Stage::VideoClip, _) => format!("{}.mp4", self.index),
            (Stage::AudioClip, _) => format!("{}.mp3", self.index),
            (Stage::Thumbnail, _) => format!("{}.jpg", self.index),
            (Stage::Transcript, _) => format!("{}.txt", self.index),
            (Stage::Narration, Some(lang)) => format!("{}_{}.mp3", self.index, lang),
            (Stage::Narration, None) => format!("{}.mp3", self.index),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.stage, self.file_name())
    }
}

/// Byte-level artifact access. Artifacts written by external tools need a
/// real file path, so only [`FsArtifactStore`] can back those; see
/// [`AssetPipeline`](crate::pipeline::AssetPipeline).
pub trait ArtifactStore: Send + Sync {
    /// Where the artifact lives (or will live).
    fn locate(&self, key: &ArtifactKey) -> PathBuf;

    fn exists(&self, key: &ArtifactKey) -> bool;

    /// Read the artifact, `None` when it has not been produced yet.
    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>>;

    /// Store bytes under `key`, returning the artifact location.
    fn put(&self, key: &ArtifactKey, data: &[u8]) -> Result<PathBuf>;
}

/// Artifacts stored as plain files under one root directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| BundleError::Cache(format!("Failed to create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn locate(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.locate(key).is_file()
    }

    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>> {
        let path = self.locate(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(&path)?))
    }

    fn put(&self, key: &ArtifactKey, data: &[u8]) -> Result<PathBuf> {
        let path = self.locate(key);
        // Write-then-rename so an interrupted write never looks like a cache hit
        let partial = path.with_extension("partial");
        std::fs::write(&partial, data)?;
        std::fs::rename(&partial, &path)?;
        debug!("Stored {} ({} bytes)", key, data.len());
        Ok(path)
    }
}

/// In-memory store for artifacts produced as bytes (narration, transcripts).
/// `locate` paths are nominal; nothing is ever written there.
pub struct MemoryArtifactStore {
    root: PathBuf,
    entries: Mutex<HashMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("memory"),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn locate(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn get(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries
            .lock()
            .map_err(|_| BundleError::Cache("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &ArtifactKey, data: &[u8]) -> Result<PathBuf> {
        let mut entries = self.entries
            .lock()
            .map_err(|_| BundleError::Cache("memory store poisoned".to_string()))?;
        entries.insert(key.clone(), data.to_vec());
        Ok(self.locate(key))
    }
}
