//! Google Cloud Translation (v2 REST) client.

use super::{ProviderError, ProviderTranslation, TranslationProvider};
use crate::config::Config;
use crate::language::LanguageTag;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request body for `POST /language/translate/v2`
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: Vec<&'a str>,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

/// [`TranslationProvider`] backed by the Google Translate v2 API.
///
/// Transient failures are retried here with exponential backoff; the
/// orchestrator never retries on its own.
pub struct GoogleTranslateClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl GoogleTranslateClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            retry: RetryConfig::provider_call(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(
            &config.google_translate_url,
            &config.google_api_key,
            config.provider_timeout,
        )
    }

    /// Override the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, request: &TranslateRequest<'_>) -> Result<Vec<ProviderTranslation>, ProviderError> {
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: TranslateResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(parsed
            .data
            .translations
            .into_iter()
            .map(|t| ProviderTranslation {
                translated_text: t.translated_text,
                detected_source_language: t.detected_source_language,
            })
            .collect())
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslateClient {
    async fn translate(
        &self,
        text: &str,
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> Result<Vec<ProviderTranslation>, ProviderError> {
        let request = TranslateRequest {
            q: vec![text],
            target: target.as_str(),
            source: source.map(LanguageTag::as_str),
            format: "text",
        };

        debug!(
            "Calling Google Translate ({} -> {})",
            source.map(LanguageTag::as_str).unwrap_or("auto"),
            target
        );

        with_retry_if(
            &self.retry,
            "Google Translate",
            || self.send(&request),
            ProviderError::is_retryable,
        )
        .await
    }
}
