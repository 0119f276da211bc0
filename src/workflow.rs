use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bundle::{Beat, BeatList, BundleAssembler, BundleLock, MediaReference, Timing, ViewerBundle};
use crate::cache::{ArtifactKey, FsArtifactStore};
use crate::config::{Config, SegmentConfig};
use crate::error::{BundleError, Result};
use crate::localize::{target_languages, LocalizedAsset, Localizer};
use crate::media::{MediaProcessorFactory, MediaToolTrait};
use crate::pipeline::AssetPipeline;
use crate::retry::RetryPolicy;
use crate::segment::{plan_segments, Segment};
use crate::speech::{SpeechFactory, SpeechSynthesizer};
use crate::transcribe::{TranscriberFactory, TranscriberTrait};
use crate::translate::{Translator, TranslatorFactory};

/// External collaborators the workflow drives
#[derive(Clone)]
pub struct Services {
    pub media: Arc<dyn MediaToolTrait>,
    pub transcriber: Arc<dyn TranscriberTrait>,
    pub translator: Arc<dyn Translator>,
    pub speaker: Arc<dyn SpeechSynthesizer>,
}

impl Services {
    /// Build the default implementations. Missing credentials fail here,
    /// before any work starts.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            media: MediaProcessorFactory::create_processor(config.media.clone()),
            transcriber: TranscriberFactory::create_default(config.transcriber.clone()),
            translator: TranslatorFactory::create_translator(config.translate.clone())?,
            speaker: SpeechFactory::create_synthesizer(config.speech.clone())?,
        })
    }
}

/// Probe a video and plan its segments
pub async fn plan_video(
    media: &dyn MediaToolTrait,
    input: &Path,
    segment: &SegmentConfig,
) -> Result<Vec<Segment>> {
    if !input.is_file() {
        return Err(BundleError::FileNotFound(input.display().to_string()));
    }

    let duration = media.probe_duration(input).await?;
    let silences = media.detect_silence(input, duration).await?;
    info!("{}: {:.2}s, {} pauses detected", input.display(), duration, silences.len());

    plan_segments(duration, &silences, segment.min_duration, segment.max_duration)
}

pub struct Workflow {
    config: Config,
    services: Services,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let services = Services::from_config(&config)?;
        Ok(Self::with_services(config, services))
    }

    pub fn with_services(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.retry)
    }

    /// Video in, localized bundle out
    pub async fn process_movie(
        &self,
        input: &Path,
        output_dir: &Path,
        source_lang: &str,
        languages: &[String],
    ) -> Result<ViewerBundle> {
        info!("Processing movie: {}", input.display());
        if !input.is_file() {
            return Err(BundleError::FileNotFound(input.display().to_string()));
        }
        self.services.media.check_availability()?;
        self.services.transcriber.check_availability()?;

        let _lock = BundleLock::acquire(output_dir)?;

        // Step 1: plan
        let segments = plan_video(self.services.media.as_ref(), input, &self.config.segment).await?;
        info!("Planned {} segments", segments.len());

        // Step 2: per-segment clips, audio, thumbnails, transcripts
        let staging = Arc::new(FsArtifactStore::new(output_dir.join(&self.config.bundle.work_dir_name))?);
        let pipeline = AssetPipeline::new(
            self.services.media.clone(),
            self.services.transcriber.clone(),
            staging,
        );
        let assets = pipeline.derive_all(input, &segments, Some(source_lang)).await?;
        let beats: Vec<Beat> = assets.iter().map(|a| a.to_beat()).collect();

        // Step 3: localize and assemble
        self.localize_and_assemble(output_dir, source_lang, &beats, languages).await
    }

    /// Extractor beat list in, localized bundle out
    pub async fn process_beats(
        &self,
        beat_file: &Path,
        output_dir: &Path,
        languages: &[String],
    ) -> Result<ViewerBundle> {
        info!("Processing beat list: {}", beat_file.display());
        let (source_lang, beats) = BeatList::from_file(beat_file)?
            .into_beats(self.config.bundle.default_beat_duration)?;
        info!("Loaded {} beats in '{}'", beats.len(), source_lang);

        let _lock = BundleLock::acquire(output_dir)?;
        self.localize_and_assemble(output_dir, &source_lang, &beats, languages).await
    }

    /// Add languages to an existing bundle. Languages it already has are kept.
    pub async fn localize_bundle(&self, bundle_dir: &Path, languages: &[String]) -> Result<ViewerBundle> {
        let _lock = BundleLock::acquire(bundle_dir)?;

        let manifest = ViewerBundle::load(bundle_dir)?.ok_or_else(|| {
            BundleError::FileNotFound(ViewerBundle::path(bundle_dir).display().to_string())
        })?;
        let beats = beats_from_manifest(bundle_dir, &manifest)?;

        let mut wanted = manifest.languages();
        wanted.extend(languages.iter().cloned());
        let wanted = target_languages(&manifest.lang, &wanted);
        info!("Localizing {} beats into {:?}", beats.len(), wanted);

        self.localize_and_assemble(bundle_dir, &manifest.lang, &beats, &wanted).await
    }

    /// Caller holds the bundle lock.
    async fn localize_and_assemble(
        &self,
        output_dir: &Path,
        source_lang: &str,
        beats: &[Beat],
        languages: &[String],
    ) -> Result<ViewerBundle> {
        if let Err(e) = self.services.translator.check_availability().await {
            warn!("{}; untranslated beats will keep their source text", e);
        }

        let assembler = BundleAssembler::new(output_dir);
        for (i, beat) in beats.iter().enumerate() {
            assembler.stage_media(i, beat)?;
        }

        let store = Arc::new(FsArtifactStore::new(output_dir)?);
        let localizer = Localizer::new(
            self.services.translator.clone(),
            self.services.speaker.clone(),
            store,
            self.retry_policy(),
        );

        let mut localized: Vec<LocalizedAsset> = Vec::with_capacity(beats.len());
        for (i, beat) in beats.iter().enumerate() {
            // Re-read before every beat: the manifest is the record of what exists
            let recorded = ViewerBundle::load(output_dir)?;
            let cached = recorded.as_ref().and_then(|m| m.beats.get(i));
            if let Some(data) = cached {
                if data.text != beat.text {
                    warn!("Beat {} text changed since the last run; recorded translations are reused", i + 1);
                }
            }

            let asset = localizer.localize_beat(i, beat, source_lang, languages, cached).await?;
            localized.push(asset);

            assembler.write(&assembler.assemble_partial(source_lang, beats, &localized, recorded.as_ref()))?;
        }

        let bundle = assembler.assemble(source_lang, beats, &localized)?;
        assembler.write(&bundle)?;
        info!("Bundle ready: {}", output_dir.display());
        Ok(bundle)
    }
}

/// Rebuild beats from a manifest so an existing bundle can be re-localized
pub fn beats_from_manifest(bundle_dir: &Path, manifest: &ViewerBundle) -> Result<Vec<Beat>> {
    manifest
        .beats
        .iter()
        .enumerate()
        .map(|(i, data)| {
            let media = match (&data.video_source, &data.image_source) {
                (Some(video), _) => MediaReference::Video {
                    path: bundle_dir.join(video),
                    thumbnail: data.thumbnail.as_ref().map(|t| bundle_dir.join(t)),
                },
                (None, Some(image)) => MediaReference::Image { path: bundle_dir.join(image) },
                (None, None) => {
                    return Err(BundleError::InvalidInput(format!(
                        "beat {} in {} has no media",
                        i + 1,
                        ViewerBundle::path(bundle_dir).display()
                    )));
                }
            };

            // Synthesized source narration is found again through the store
            let synthesized = ArtifactKey::narration(i, &manifest.lang).file_name();
            let audio = data
                .audio_sources
                .get(&manifest.lang)
                .filter(|file| **file != synthesized)
                .map(|file| bundle_dir.join(file));

            let text = data
                .multi_linguals
                .get(&manifest.lang)
                .cloned()
                .unwrap_or_else(|| data.text.clone());

            Ok(Beat {
                text,
                media,
                audio,
                timing: Timing::new(data.start_time, data.end_time),
            })
        })
        .collect()
}
