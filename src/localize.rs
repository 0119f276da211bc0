//! Per-beat translation and narration.
//!
//! Every target language ends up with a `{n}_{lang}.mp3` narration and a
//! translated text. Narration files double as the cache: an existing file is
//! never synthesized again, and text already recorded in the manifest is
//! never translated again.
//!
//! A beat with blank text (a silent segment, a title slide) has nothing to
//! translate or speak. Every language gets empty text and the beat's own
//! audio, or no audio at all.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bundle::{media_file_name, Beat, BeatData};
use crate::cache::{ArtifactKey, ArtifactStore};
use crate::error::{BundleError, Result};
use crate::retry::RetryPolicy;
use crate::speech::{SpeechError, SpeechSynthesizer};
use crate::translate::Translator;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedEntry {
    /// Bundle-relative narration file; `None` for a blank beat without audio
    pub audio_file: Option<String>,
    pub text: String,
}

/// `lang -> { audio file, text }` for one beat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalizedAsset {
    pub entries: BTreeMap<String, LocalizedEntry>,
}

impl LocalizedAsset {
    pub fn audio_sources(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(lang, e)| e.audio_file.clone().map(|file| (lang.clone(), file)))
            .collect()
    }

    pub fn multi_linguals(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(lang, e)| (lang.clone(), e.text.clone()))
            .collect()
    }
}

/// Requested languages minus the source language, deduplicated, order kept
pub fn target_languages(source_lang: &str, requested: &[String]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for lang in requested {
        let lang = lang.trim();
        if lang.is_empty() || lang == source_lang || targets.iter().any(|t| t == lang) {
            continue;
        }
        targets.push(lang.to_string());
    }
    targets
}

pub struct Localizer {
    translator: Arc<dyn Translator>,
    speaker: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ArtifactStore>,
    retry: RetryPolicy,
}

impl Localizer {
    /// `store` must be rooted at the bundle directory so narration names
    /// are bundle-relative.
    pub fn new(
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ArtifactStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self { translator, speaker, store, retry }
    }

    /// Localize the beat at 0-based `beat_index`. `cached` is what the
    /// manifest recorded for this beat on a previous run, if anything.
    pub async fn localize_beat(
        &self,
        beat_index: usize,
        beat: &Beat,
        source_lang: &str,
        target_langs: &[String],
        cached: Option<&BeatData>,
    ) -> Result<LocalizedAsset> {
        if beat.text.trim().is_empty() {
            return Ok(self.silent_beat(beat_index, beat, source_lang, target_langs));
        }

        let mut asset = LocalizedAsset::default();

        let source_audio = match &beat.audio {
            Some(audio) => media_file_name(beat_index, audio),
            None => self.ensure_narration(beat_index, &beat.text, source_lang).await?,
        };
        asset.entries.insert(source_lang.to_string(), LocalizedEntry {
            audio_file: Some(source_audio),
            text: beat.text.clone(),
        });

        for lang in target_languages(source_lang, target_langs) {
            let key = ArtifactKey::narration(beat_index, &lang);
            let cached_text = cached.and_then(|c| c.multi_linguals.get(&lang));

            let text = match (self.store.exists(&key), cached_text) {
                (true, Some(text)) => {
                    debug!("Beat {} [{}] already localized", beat_index + 1, lang);
                    text.clone()
                }
                (true, None) => {
                    warn!(
                        "Beat {} [{}]: narration exists without recorded text, translating only; audio may not match the new text",
                        beat_index + 1, lang
                    );
                    self.translate_or_source(beat_index, &beat.text, source_lang, &lang).await
                }
                (false, _) => {
                    let text = self.translate_or_source(beat_index, &beat.text, source_lang, &lang).await;
                    self.synthesize(&key, &text, &lang).await?;
                    text
                }
            };

            asset.entries.insert(lang, LocalizedEntry {
                audio_file: Some(key.file_name()),
                text,
            });
        }

        info!("Localized beat {} into {} languages", beat_index + 1, asset.entries.len());
        Ok(asset)
    }

    fn silent_beat(&self, beat_index: usize, beat: &Beat, source_lang: &str, target_langs: &[String]) -> LocalizedAsset {
        debug!("Beat {} has no text, skipping translation and narration", beat_index + 1);
        let audio_file = beat.audio.as_deref().map(|audio| media_file_name(beat_index, audio));

        let mut asset = LocalizedAsset::default();
        let langs = std::iter::once(source_lang.to_string()).chain(target_languages(source_lang, target_langs));
        for lang in langs {
            asset.entries.insert(lang, LocalizedEntry {
                audio_file: audio_file.clone(),
                text: String::new(),
            });
        }
        asset
    }

    async fn ensure_narration(&self, beat_index: usize, text: &str, lang: &str) -> Result<String> {
        let key = ArtifactKey::narration(beat_index, lang);
        if !self.store.exists(&key) {
            self.synthesize(&key, text, lang).await?;
        }
        Ok(key.file_name())
    }

    /// Translation failure is tolerated: the source text stands in.
    async fn translate_or_source(&self, beat_index: usize, text: &str, from: &str, to: &str) -> String {
        let label = format!("translate beat {} to {}", beat_index + 1, to);
        let result = self.retry
            .run_always(&label, || self.translator.translate(text, from, to))
            .await;

        match result {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation of beat {} to {} failed, keeping source text: {}", beat_index + 1, to, e);
                text.to_string()
            }
        }
    }

    async fn synthesize(&self, key: &ArtifactKey, text: &str, lang: &str) -> Result<()> {
        let label = format!("synthesize {}", key.file_name());
        let audio = self.retry
            .run(&label, || self.speaker.speak(text, lang), SpeechError::is_retryable)
            .await
            .map_err(|e| BundleError::Speech(format!("{} failed: {}", label, e)))?;

        self.store.put(key, &audio)?;
        Ok(())
    }
}
