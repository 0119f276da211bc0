use serde::{Deserialize, Serialize};

/// One timed piece of recognized speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Service-agnostic transcription result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
}

impl Transcript {
    /// Narration text for a beat: segment texts joined with single spaces.
    pub fn narration_text(&self) -> String {
        if self.segments.is_empty() {
            return self.text.trim().to_string();
        }
        self.segments
            .iter()
            .map(|seg| seg.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Whisper command-line JSON output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperOutput {
    pub text: String,
    pub segments: Vec<WhisperSegment>,
    pub language: Option<String>,
}

/// Whisper command-line segment format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperSegment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

impl WhisperOutput {
    /// Convert to a [`Transcript`], using `fallback_language` when whisper
    /// did not report one.
    pub fn into_transcript(self, fallback_language: Option<&str>) -> Transcript {
        let segments = self.segments
            .into_iter()
            .map(|seg| TranscriptSegment {
                start: seg.start,
                end: seg.end,
                text: seg.text.trim().to_string(),
            })
            .collect();

        let language = self.language
            .or_else(|| fallback_language.map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        Transcript {
            text: self.text.trim().to_string(),
            segments,
            language,
        }
    }
}
