use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, BundleError};

// Default values for fields older config files may not carry
fn default_upload_concurrency() -> usize {
    5
}

fn default_work_dir_name() -> String {
    ".staging".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub segment: SegmentConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub speech: SpeechConfig,
    pub retry: RetryConfig,
    pub upload: UploadConfig,
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Noise floor for silence detection, in dB (e.g. -30)
    pub silence_noise_db: f64,
    /// Minimum silence length in seconds reported by silencedetect
    pub silence_min_duration: f64,
    /// Additional encoding options for segment clips
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub clip_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Shortest allowed segment (seconds), final segment excepted
    pub min_duration: f64,
    /// Target segment length (seconds); cuts snap to nearby silence
    pub max_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to the whisper command-line tool
    pub binary_path: String,
    /// Whisper model name
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Base URL of an OpenAI-compatible speech API
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: usize,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the remote storage API
    pub endpoint: String,
    /// Environment variable holding the bearer credential
    pub token_env: String,
    /// Number of concurrent upload workers
    #[serde(default = "default_upload_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Duration used for extracted beats that carry none (seconds)
    pub default_beat_duration: f64,
    /// Name of the staging directory created inside the output directory
    #[serde(default = "default_work_dir_name")]
    pub work_dir_name: String,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                silence_noise_db: -30.0,
                silence_min_duration: 0.5,
                clip_options: vec![
                    // "-preset".to_string(), "medium".to_string(),
                    // "-crf".to_string(), "23".to_string(),
                ],
            },
            segment: SegmentConfig {
                min_duration: 20.0,
                max_duration: 120.0,
            },
            transcriber: TranscriberConfig {
                binary_path: "whisper".to_string(),
                model: "medium".to_string(),
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
            },
            speech: SpeechConfig {
                endpoint: "https://api.openai.com".to_string(),
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1000,
            },
            upload: UploadConfig {
                endpoint: "http://localhost:8080".to_string(),
                token_env: "MULMO_UPLOAD_TOKEN".to_string(),
                concurrency: default_upload_concurrency(),
            },
            bundle: BundleConfig {
                default_beat_duration: 5.0,
                work_dir_name: default_work_dir_name(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BundleError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| BundleError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BundleError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BundleError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings no stage can run with.
    pub fn validate(&self) -> Result<()> {
        if self.segment.max_duration <= 0.0 {
            return Err(BundleError::Config("segment.max_duration must be positive".to_string()));
        }
        if self.segment.min_duration < 0.0 || self.segment.min_duration > self.segment.max_duration {
            return Err(BundleError::Config(
                "segment.min_duration must be between 0 and segment.max_duration".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(BundleError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.upload.concurrency == 0 {
            return Err(BundleError::Config("upload.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}
