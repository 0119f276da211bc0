use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use mulmo_bundle::bundle::{BundleLock, ViewerBundle};
use mulmo_bundle::config::Config;
use mulmo_bundle::error::{BundleError, Result};
use mulmo_bundle::media::MediaToolTrait;
use mulmo_bundle::segment::SilenceInterval;
use mulmo_bundle::speech::{SpeechError, SpeechSynthesizer};
use mulmo_bundle::transcribe::{Transcript, TranscriberTrait};
use mulmo_bundle::translate::Translator;
use mulmo_bundle::workflow::{Services, Workflow};

#[derive(Default)]
struct Calls {
    media: AtomicUsize,
    transcribe: AtomicUsize,
    translate: AtomicUsize,
    speak: AtomicUsize,
}

impl Calls {
    fn snapshot(&self) -> [usize; 4] {
        [
            self.media.load(Ordering::SeqCst),
            self.transcribe.load(Ordering::SeqCst),
            self.translate.load(Ordering::SeqCst),
            self.speak.load(Ordering::SeqCst),
        ]
    }
}

struct FakeMedia(Arc<Calls>);

impl FakeMedia {
    fn write(&self, output: &Path, what: &str) -> Result<()> {
        self.0.media.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, what)?;
        Ok(())
    }
}

#[async_trait]
impl MediaToolTrait for FakeMedia {
    async fn probe_duration(&self, _input: &Path) -> Result<f64> {
        Ok(150.0)
    }

    async fn detect_silence(&self, _input: &Path, _total: f64) -> Result<Vec<SilenceInterval>> {
        Ok(vec![SilenceInterval::new(60.0, 61.0)])
    }

    async fn extract_clip(&self, _input: &Path, _start: f64, _duration: f64, output: &Path) -> Result<()> {
        self.write(output, "clip")
    }

    async fn extract_audio(&self, _input: &Path, _start: f64, _duration: f64, output: &Path) -> Result<()> {
        self.write(output, "audio")
    }

    async fn extract_thumbnail(&self, _input: &Path, _at: f64, output: &Path) -> Result<()> {
        self.write(output, "jpeg")
    }

    fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Segment `silent` (1-based) transcribes to nothing, like a music intro
struct FakeTranscriber {
    calls: Arc<Calls>,
    silent: Option<usize>,
}

#[async_trait]
impl TranscriberTrait for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<Transcript> {
        let n = self.calls.transcribe.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(audio_path.ends_with(format!("{}.mp3", n)));
        let text = if self.silent == Some(n) { String::new() } else { format!("Part {} of the talk", n) };
        Ok(Transcript {
            text,
            segments: vec![],
            language: language.unwrap_or("en").to_string(),
        })
    }
}

struct FakeTranslator {
    calls: Arc<Calls>,
    broken: bool,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, _from_lang: &str, to_lang: &str) -> Result<String> {
        self.calls.translate.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(BundleError::Translation("model not loaded".to_string()));
        }
        Ok(format!("[{}] {}", to_lang, text))
    }
}

struct FakeSpeaker(Arc<Calls>);

#[async_trait]
impl SpeechSynthesizer for FakeSpeaker {
    async fn speak(&self, text: &str, lang: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        self.0.speak.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyInput);
        }
        Ok(format!("{}:{}", lang, text).into_bytes())
    }
}

fn workflow(calls: &Arc<Calls>, broken_translation: bool) -> Workflow {
    workflow_with_silence(calls, broken_translation, None)
}

fn workflow_with_silence(calls: &Arc<Calls>, broken_translation: bool, silent: Option<usize>) -> Workflow {
    let mut config = Config::default();
    config.retry.base_delay_ms = 1;

    Workflow::with_services(config, Services {
        media: Arc::new(FakeMedia(calls.clone())),
        transcriber: Arc::new(FakeTranscriber { calls: calls.clone(), silent }),
        translator: Arc::new(FakeTranslator { calls: calls.clone(), broken: broken_translation }),
        speaker: Arc::new(FakeSpeaker(calls.clone())),
    })
}

fn langs(l: &[&str]) -> Vec<String> {
    l.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn movie_bundle_is_built_and_rerun_is_free() {
    let work = TempDir::new().unwrap();
    let input = work.child("talk.mp4");
    input.write_binary(b"not really a video").unwrap();
    let out = work.child("bundle");

    let calls = Arc::new(Calls::default());
    let workflow = workflow(&calls, false);

    let bundle = assert_ok!(workflow.process_movie(input.path(), out.path(), "en", &langs(&["ja"])).await);

    assert_eq!(bundle.total_segments, 2);
    assert_eq!(bundle.total_duration, 150.0);
    assert_eq!(bundle.beats[0].end_time, 60.5);
    assert_eq!(bundle.beats[1].text, "Part 2 of the talk");
    assert_eq!(bundle.beats[1].audio_sources["en"], "2.mp3");
    assert_eq!(bundle.beats[1].audio_sources["ja"], "2_ja.mp3");
    assert_eq!(bundle.beats[1].multi_linguals["ja"], "[ja] Part 2 of the talk");
    assert_eq!(bundle.beats[0].video_source.as_deref(), Some("1.mp4"));
    assert_eq!(bundle.beats[0].thumbnail.as_deref(), Some("1.jpg"));
    for name in ["1.mp4", "1.mp3", "1.jpg", "1_ja.mp3", "2.mp4", "2_ja.mp3", "mulmo_view.json"] {
        assert!(out.path().join(name).is_file(), "{} missing", name);
    }
    // 3 media calls per segment, 1 transcription per segment, 1 translation + 1 narration per beat
    assert_eq!(calls.snapshot(), [6, 2, 2, 2]);

    let first_manifest = std::fs::read_to_string(out.path().join("mulmo_view.json")).unwrap();
    let again = assert_ok!(workflow.process_movie(input.path(), out.path(), "en", &langs(&["ja"])).await);

    assert_eq!(calls.snapshot(), [6, 2, 2, 2]);
    assert_eq!(again, bundle);
    assert_eq!(std::fs::read_to_string(out.path().join("mulmo_view.json")).unwrap(), first_manifest);
}

#[tokio::test]
async fn silent_segment_keeps_its_own_audio() {
    let work = TempDir::new().unwrap();
    let input = work.child("talk.mp4");
    input.write_binary(b"not really a video").unwrap();
    let out = work.child("bundle");

    let calls = Arc::new(Calls::default());
    let workflow = workflow_with_silence(&calls, false, Some(1));

    let bundle = assert_ok!(workflow.process_movie(input.path(), out.path(), "en", &langs(&["ja"])).await);

    assert_eq!(bundle.beats[0].text, "");
    assert_eq!(bundle.beats[0].multi_linguals["ja"], "");
    assert_eq!(bundle.beats[0].audio_sources["ja"], "1.mp3");
    assert_eq!(bundle.beats[1].audio_sources["ja"], "2_ja.mp3");
    assert!(!out.path().join("1_ja.mp3").exists());
    // only the spoken segment is translated and narrated
    assert_eq!(calls.snapshot(), [6, 2, 1, 1]);

    let again = assert_ok!(workflow.process_movie(input.path(), out.path(), "en", &langs(&["ja"])).await);
    assert_eq!(calls.snapshot(), [6, 2, 1, 1]);
    assert_eq!(again, bundle);
}

#[tokio::test]
async fn beat_list_bundle_can_gain_languages_later() {
    let work = TempDir::new().unwrap();
    work.child("slides/1.png").write_binary(b"png").unwrap();
    work.child("slides/2.png").write_binary(b"png").unwrap();
    work.child("voice/intro.wav").write_binary(b"wav").unwrap();
    let list = work.child("beats.json");
    list.write_str(r#"{
        "lang": "en",
        "beats": [
            {"text": "Welcome", "image": "slides/1.png"},
            {"text": "Thanks", "image": "slides/2.png", "audio": "voice/intro.wav", "duration": 3.0}
        ]
    }"#).unwrap();
    let out = work.child("bundle");

    let calls = Arc::new(Calls::default());
    let workflow = workflow(&calls, false);

    let bundle = assert_ok!(workflow.process_beats(list.path(), out.path(), &langs(&["ja", "fr", "en"])).await);

    assert_eq!(bundle.total_duration, 8.0);
    assert_eq!(bundle.beats[0].audio_sources["en"], "1_en.mp3");
    assert_eq!(bundle.beats[1].audio_sources["en"], "2.wav");
    assert_eq!(bundle.beats[1].image_source.as_deref(), Some("2.png"));
    assert_eq!(bundle.beats[0].multi_linguals.len(), 3);
    // source narration for beat 1 only, then ja + fr for both beats
    assert_eq!(calls.snapshot(), [0, 0, 4, 5]);

    let extended = assert_ok!(workflow.localize_bundle(out.path(), &langs(&["de"])).await);

    assert_eq!(calls.snapshot(), [0, 0, 6, 7]);
    assert_eq!(extended.languages(), langs(&["de", "en", "fr", "ja"]));
    assert_eq!(extended.beats[0].multi_linguals["fr"], "[fr] Welcome");
    assert_eq!(extended.beats[1].audio_sources["en"], "2.wav");
    assert!(extended.is_consistent());
}

#[tokio::test]
async fn broken_translation_keeps_source_text() {
    let work = TempDir::new().unwrap();
    work.child("1.png").write_binary(b"png").unwrap();
    let list = work.child("beats.json");
    list.write_str(r#"{"lang": "en", "beats": [{"text": "Hello", "image": "1.png"}]}"#).unwrap();
    let out = work.child("bundle");

    let calls = Arc::new(Calls::default());
    let workflow = workflow(&calls, true);

    let bundle = assert_ok!(workflow.process_beats(list.path(), out.path(), &langs(&["es"])).await);

    assert_eq!(bundle.beats[0].multi_linguals["es"], "Hello");
    assert_eq!(calls.translate.load(Ordering::SeqCst), 3);
    assert!(out.path().join("1_es.mp3").is_file());

    // the fallback text is recorded, so a rerun asks nobody
    assert_ok!(workflow.process_beats(list.path(), out.path(), &langs(&["es"])).await);
    assert_eq!(calls.translate.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn locked_bundle_is_refused() {
    let work = TempDir::new().unwrap();
    work.child("1.png").write_binary(b"png").unwrap();
    let list = work.child("beats.json");
    list.write_str(r#"{"lang": "en", "beats": [{"text": "Hello", "image": "1.png"}]}"#).unwrap();
    let out = work.child("bundle");

    let _held = BundleLock::acquire(out.path()).unwrap();
    let calls = Arc::new(Calls::default());

    let err = assert_err!(workflow(&calls, false).process_beats(list.path(), out.path(), &langs(&["ja"])).await);

    assert!(matches!(err, BundleError::Locked(_)));
    assert_eq!(calls.snapshot(), [0, 0, 0, 0]);
    assert!(ViewerBundle::load(out.path()).unwrap().is_none());
}
