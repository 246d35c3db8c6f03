//! Translation provider capability.
//!
//! The orchestrator only sees [`TranslationProvider`]; the Google Translate
//! client in [`google`] is the production implementation.

pub mod google;

pub use google::GoogleTranslateClient;

use crate::language::LanguageTag;
use async_trait::async_trait;
use thiserror::Error;

/// One translated text as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTranslation {
    pub translated_text: String,
    /// Filled in by the provider in auto-detect mode.
    pub detected_source_language: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to reach translation API: {0}")]
    Request(#[from] reqwest::Error),
    #[error("translation API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse translation API response: {0}")]
    Decode(String),
    #[error("no translation returned")]
    NoTranslation,
}

impl ProviderError {
    /// Rate limiting, upstream 5xx and transport failures are transient.
    /// Other 4xx responses and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Request(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Decode(_) | ProviderError::NoTranslation => false,
        }
    }
}

/// External translation capability.
///
/// `source` is `None` in auto-detect mode. An empty result vector means the
/// provider produced nothing.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> Result<Vec<ProviderTranslation>, ProviderError>;
}
