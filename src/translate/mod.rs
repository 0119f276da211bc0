// Text translation collaborators
//
// - Ollama: LLM text completion with a JSON-constrained prompt

pub mod common;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::*;
use crate::config::TranslateConfig;
use crate::error::Result;

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `from_lang` into `to_lang`
    async fn translate(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String>;

    /// Check if the translation service is reachable
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(ollama::OllamaTranslator::new(config)?))
    }
}
