//! The cache-aside translation pipeline.
//!
//! [`Translator::translate`] runs one request through:
//! auth guard → field checks → language tag validation → key derivation →
//! cache lookup → provider call on miss → best-effort write-back.

use crate::cache::{CacheLookup, ResultCache, StoreError};
use crate::cache_key::CacheKey;
use crate::language::{InvalidLanguageTag, LanguageTag};
use crate::metrics::{MetricsReport, TranslationMetrics};
use crate::provider::{ProviderError, TranslationProvider};
use crate::security;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Body of `POST /translate`.
///
/// Absent fields decode as empty so they are reported as missing rather than
/// as a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationRequest {
    #[serde(default)]
    pub text: String,
    /// Empty or absent means auto-detect
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// A translation as returned to the caller and as persisted in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    /// Caller-supplied source, or the language the provider detected
    pub source_lang: String,
    pub target_lang: String,
    /// True iff this response was served from the cache
    pub cache_hit: bool,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{0} field is required")]
    MissingField(&'static str),
    #[error("invalid {field}: {source}")]
    InvalidLanguageTag {
        field: &'static str,
        source: InvalidLanguageTag,
    },
    #[error("unauthorized: invalid authentication token")]
    Unauthorized,
    #[error("translation failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Orchestrates one translation request against the cache and the provider.
///
/// Both collaborators are injected and shared; the translator itself holds no
/// per-request state, so one instance serves every request concurrently.
pub struct Translator {
    cache: ResultCache,
    provider: Arc<dyn TranslationProvider>,
    auth_token: Option<String>,
    metrics: TranslationMetrics,
}

impl Translator {
    pub fn new(cache: ResultCache, provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            cache,
            provider,
            auth_token: None,
            metrics: TranslationMetrics::new(),
        }
    }

    /// Require callers to present `token`. `None` leaves the service open.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Translate `request.text`, serving from the cache when possible.
    ///
    /// Cache failures never fail the request: an unreachable store is
    /// treated as a miss and a failed write-back is only logged.
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult, TranslateError> {
        if !security::authenticate(request.auth_token.as_deref(), self.auth_token.as_deref()) {
            warn!("Rejected translation request with invalid auth token");
            return Err(TranslateError::Unauthorized);
        }

        if request.text.is_empty() {
            return Err(TranslateError::MissingField("text"));
        }
        if request.target_lang.is_empty() {
            return Err(TranslateError::MissingField("target_lang"));
        }

        let target = LanguageTag::parse(&request.target_lang).map_err(|source| {
            TranslateError::InvalidLanguageTag {
                field: "target_lang",
                source,
            }
        })?;
        let source = match request.source_lang.as_deref() {
            None | Some("") => None,
            Some(code) => Some(LanguageTag::parse(code).map_err(|source| {
                TranslateError::InvalidLanguageTag {
                    field: "source_lang",
                    source,
                }
            })?),
        };

        let key = CacheKey::derive(source.as_ref(), &target, &request.text);

        match self.cache.lookup(&key).await {
            CacheLookup::Found(mut result) => {
                self.metrics.record_cache_hit();
                debug!("Cache hit for {}", key);
                // The entry may have been written by a caller spelling the tags differently
                if source.is_some() {
                    result.source_lang = request.source_lang.clone().unwrap_or_default();
                }
                result.target_lang = request.target_lang.clone();
                return Ok(result);
            }
            CacheLookup::NotFound => {
                self.metrics.record_cache_miss();
                debug!("Cache miss for {}", key);
            }
            CacheLookup::Unavailable(e) => {
                self.metrics.record_cache_unavailable();
                warn!("Cache lookup failed, translating without cache: {}", e);
            }
        }

        let result = self.call_provider(request, source.as_ref(), &target).await?;

        if let Err(e) = self.cache.store(&key, &result).await {
            self.record_store_failure(&e);
            warn!("Failed to cache translation: {}", e);
        }

        Ok(result)
    }

    /// Call the provider with the normalized tags. The result echoes the
    /// caller's own spelling of an explicit source and of the target.
    async fn call_provider(
        &self,
        request: &TranslationRequest,
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> Result<TranslationResult, TranslateError> {
        self.metrics.record_provider_call();
        let text = request.text.as_str();

        let outcome = self
            .provider
            .translate(text, source, target)
            .await
            .and_then(|translations| {
                translations
                    .into_iter()
                    .next()
                    .ok_or(ProviderError::NoTranslation)
            })
            .and_then(|translation| {
                let source_lang = match source {
                    Some(_) => request.source_lang.clone().unwrap_or_default(),
                    None => detected_language(translation.detected_source_language)?,
                };
                Ok(TranslationResult {
                    translated_text: translation.translated_text,
                    source_lang,
                    target_lang: request.target_lang.clone(),
                    cache_hit: false,
                })
            });

        match outcome {
            Ok(result) => {
                info!(
                    "Translated {} chars {} -> {}",
                    text.chars().count(),
                    result.source_lang,
                    result.target_lang
                );
                Ok(result)
            }
            Err(e) => {
                self.metrics.record_provider_failure();
                warn!("Translation provider failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn record_store_failure(&self, error: &StoreError) {
        if !matches!(error, StoreError::Encode(_)) {
            self.metrics.record_cache_unavailable();
        }
    }

    /// Liveness of the cache store; the provider is not probed.
    pub async fn cache_health(&self) -> Result<(), StoreError> {
        self.cache.ping().await
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }
}

/// The provider's detected language, normalized when it parses as a tag.
fn detected_language(detected: Option<String>) -> Result<String, ProviderError> {
    match detected {
        Some(code) if !code.is_empty() => Ok(LanguageTag::parse(&code)
            .map(|tag| tag.to_string())
            .unwrap_or(code)),
        _ => Err(ProviderError::NoTranslation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::provider::ProviderTranslation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ==================== Test Doubles ====================

    /// Provider that answers from a fixed script and records every call
    struct ScriptedProvider {
        response: Mutex<Result<Vec<ProviderTranslation>, u16>>,
        calls: AtomicUsize,
        last_source: Mutex<Option<String>>,
    }

    impl ScriptedProvider {
        fn answering(text: &str, detected: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(vec![ProviderTranslation {
                    translated_text: text.to_string(),
                    detected_source_language: detected.map(str::to_string),
                }])),
                calls: AtomicUsize::new(0),
                last_source: Mutex::new(None),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(Vec::new())),
                calls: AtomicUsize::new(0),
                last_source: Mutex::new(None),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Err(status)),
                calls: AtomicUsize::new(0),
                last_source: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranslationProvider for ScriptedProvider {
        async fn translate(
            &self,
            _text: &str,
            source: Option<&LanguageTag>,
            _target: &LanguageTag,
        ) -> Result<Vec<ProviderTranslation>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_source.lock().unwrap() = source.map(|s| s.to_string());
            match &*self.response.lock().unwrap() {
                Ok(translations) => Ok(translations.clone()),
                Err(status) => Err(ProviderError::Api {
                    status: *status,
                    body: "scripted failure".to_string(),
                }),
            }
        }
    }

    fn translator(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> Translator {
        Translator::new(ResultCache::new(store), provider)
    }

    fn request(text: &str, source: Option<&str>, target: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            source_lang: source.map(str::to_string),
            target_lang: target.to_string(),
            auth_token: None,
        }
    }

    // ==================== Cache-Aside Flow ====================

    #[tokio::test]
    async fn test_first_call_misses_second_call_hits() {
        let store = Arc::new(InMemoryStore::new());
        let provider = ScriptedProvider::answering("¡Hola, mundo!", None);
        let translator = translator(store, provider.clone());
        let req = request("Hello, world!", Some("en"), "es");

        let first = translator.translate(&req).await.unwrap();
        assert_eq!(
            first,
            TranslationResult {
                translated_text: "¡Hola, mundo!".to_string(),
                source_lang: "en".to_string(),
                target_lang: "es".to_string(),
                cache_hit: false,
            }
        );

        let second = translator.translate(&req).await.unwrap();
        assert_eq!(second, TranslationResult { cache_hit: true, ..first });
        assert_eq!(provider.calls(), 1);

        let metrics = translator.metrics();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.provider_calls, 1);
    }

    #[tokio::test]
    async fn test_explicit_source_is_passed_and_echoed() {
        let provider = ScriptedProvider::answering("Hola", Some("fr"));
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let result = translator
            .translate(&request("Hello", Some("en-us"), "es"))
            .await
            .unwrap();

        // Caller's source wins over whatever the provider reports, as sent
        assert_eq!(result.source_lang, "en-us");
        assert_eq!(provider.last_source.lock().unwrap().as_deref(), Some("en-US"));
    }

    #[tokio::test]
    async fn test_languages_are_echoed_as_sent() {
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let result = translator
            .translate(&request("Hello", Some("EN_us"), "ES"))
            .await
            .unwrap();

        assert_eq!(result.source_lang, "EN_us");
        assert_eq!(result.target_lang, "ES");
        assert_eq!(provider.last_source.lock().unwrap().as_deref(), Some("en-US"));
    }

    #[tokio::test]
    async fn test_cache_hit_echoes_current_callers_spelling() {
        let store = Arc::new(InMemoryStore::new());
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(store.clone(), provider.clone());

        let first = translator
            .translate(&request("Hello", Some("EN"), "ES"))
            .await
            .unwrap();
        assert_eq!((first.source_lang.as_str(), first.target_lang.as_str()), ("EN", "ES"));

        // Same normalized key, different spelling
        let second = translator
            .translate(&request("Hello", Some("en"), "es"))
            .await
            .unwrap();

        assert!(second.cache_hit);
        assert_eq!(second.source_lang, "en");
        assert_eq!(second.target_lang, "es");
        assert_eq!(provider.calls(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_keeps_detected_source() {
        let provider = ScriptedProvider::answering("Hola", Some("en"));
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        translator.translate(&request("Hello", None, "ES")).await.unwrap();
        let hit = translator
            .translate(&request("Hello", Some(""), "es"))
            .await
            .unwrap();

        assert!(hit.cache_hit);
        assert_eq!(hit.source_lang, "en");
        assert_eq!(hit.target_lang, "es");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_auto_detect_uses_detected_language() {
        let provider = ScriptedProvider::answering("Hola", Some("en"));
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let result = translator
            .translate(&request("Hello", None, "es"))
            .await
            .unwrap();

        assert_eq!(result.source_lang, "en");
        assert!(provider.last_source.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_source_means_auto_detect() {
        let provider = ScriptedProvider::answering("Hola", Some("en"));
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let result = translator
            .translate(&request("Hello", Some(""), "es"))
            .await
            .unwrap();

        assert_eq!(result.source_lang, "en");
        assert!(provider.last_source.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auto_detect_and_explicit_source_do_not_share_entries() {
        let store = Arc::new(InMemoryStore::new());
        let provider = ScriptedProvider::answering("Hola", Some("en"));
        let translator = translator(store.clone(), provider.clone());

        translator.translate(&request("Hello", None, "es")).await.unwrap();
        let explicit = translator
            .translate(&request("Hello", Some("en"), "es"))
            .await
            .unwrap();

        assert!(!explicit.cache_hit);
        assert_eq!(provider.calls(), 2);
        assert_eq!(store.len().await, 2);
    }

    // ==================== Validation ====================

    #[tokio::test]
    async fn test_empty_text_is_missing_field() {
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let err = translator
            .translate(&request("", Some("??"), "!!"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::MissingField("text")));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_target_is_missing_field() {
        let translator = translator(
            Arc::new(InMemoryStore::new()),
            ScriptedProvider::answering("Hola", None),
        );

        let err = translator
            .translate(&request("Hello", Some("en"), ""))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::MissingField("target_lang")));
    }

    #[tokio::test]
    async fn test_invalid_target_touches_neither_cache_nor_provider() {
        let store = Arc::new(InMemoryStore::new());
        // An unavailable store would be counted if it were contacted
        store.set_available(false);
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(store, provider.clone());

        let err = translator
            .translate(&request("Hello", None, "xx-??"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranslateError::InvalidLanguageTag { field: "target_lang", .. }
        ));
        assert_eq!(provider.calls(), 0);
        let metrics = translator.metrics();
        assert_eq!(metrics.cache_unavailable, 0);
        assert_eq!(metrics.cache_misses, 0);
    }

    #[tokio::test]
    async fn test_invalid_source_is_rejected() {
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(Arc::new(InMemoryStore::new()), provider.clone());

        let err = translator
            .translate(&request("Hello", Some("english"), "es"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranslateError::InvalidLanguageTag { field: "source_lang", .. }
        ));
        assert!(err.to_string().contains("english"));
        assert_eq!(provider.calls(), 0);
    }

    // ==================== Auth Guard ====================

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized_before_validation() {
        let store = Arc::new(InMemoryStore::new());
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(store.clone(), provider.clone())
            .with_auth_token(Some("s3cret".to_string()));

        let mut req = request("", None, "");
        req.auth_token = Some("wrong".to_string());

        let err = translator.translate(&req).await.unwrap_err();
        assert!(matches!(err, TranslateError::Unauthorized));
        assert_eq!(provider.calls(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let translator = translator(
            Arc::new(InMemoryStore::new()),
            ScriptedProvider::answering("Hola", None),
        )
        .with_auth_token(Some("s3cret".to_string()));

        let err = translator
            .translate(&request("Hello", None, "es"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Unauthorized));
    }

    #[tokio::test]
    async fn test_correct_token_is_allowed() {
        let translator = translator(
            Arc::new(InMemoryStore::new()),
            ScriptedProvider::answering("Hola", Some("en")),
        )
        .with_auth_token(Some("s3cret".to_string()));

        let mut req = request("Hello", None, "es");
        req.auth_token = Some("s3cret".to_string());

        assert!(translator.translate(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_configured_token_leaves_service_open() {
        let translator = translator(
            Arc::new(InMemoryStore::new()),
            ScriptedProvider::answering("Hola", Some("en")),
        )
        .with_auth_token(Some(String::new()));

        let mut req = request("Hello", None, "es");
        req.auth_token = Some("anything".to_string());

        assert!(translator.translate(&req).await.is_ok());
    }

    // ==================== Provider Failures ====================

    #[tokio::test]
    async fn test_provider_error_surfaces_and_is_not_cached() {
        let store = Arc::new(InMemoryStore::new());
        let provider = ScriptedProvider::failing(503);
        let translator = translator(store.clone(), provider.clone());

        let err = translator
            .translate(&request("Hello", Some("en"), "es"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Provider(ProviderError::Api { status: 503, .. })));
        // No retry at this layer
        assert_eq!(provider.calls(), 1);
        assert!(store.is_empty().await);
        assert_eq!(translator.metrics().provider_failures, 1);
    }

    #[tokio::test]
    async fn test_zero_results_is_no_translation() {
        let translator = translator(Arc::new(InMemoryStore::new()), ScriptedProvider::empty());

        let err = translator
            .translate(&request("Hello", Some("en"), "es"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Provider(ProviderError::NoTranslation)));
        assert!(err.to_string().contains("no translation returned"));
    }

    #[tokio::test]
    async fn test_auto_detect_without_detected_language_fails() {
        let translator = translator(
            Arc::new(InMemoryStore::new()),
            ScriptedProvider::answering("Hola", None),
        );

        let err = translator
            .translate(&request("Hello", None, "es"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Provider(ProviderError::NoTranslation)));
    }

    // ==================== Cache Degradation ====================

    #[tokio::test]
    async fn test_unavailable_cache_still_translates() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(store.clone(), provider.clone());
        let req = request("Hello", Some("en"), "es");

        let first = translator.translate(&req).await.unwrap();
        let second = translator.translate(&req).await.unwrap();

        assert!(!first.cache_hit);
        assert!(!second.cache_hit);
        assert_eq!(provider.calls(), 2);
        // lookup + write-back per request
        assert_eq!(translator.metrics().cache_unavailable, 4);
    }

    #[tokio::test]
    async fn test_cache_recovers_after_outage() {
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false);
        let provider = ScriptedProvider::answering("Hola", None);
        let translator = translator(store.clone(), provider.clone());
        let req = request("Hello", Some("en"), "es");

        translator.translate(&req).await.unwrap();
        store.set_available(true);
        assert!(!translator.translate(&req).await.unwrap().cache_hit);
        assert!(translator.translate(&req).await.unwrap().cache_hit);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_health_follows_store() {
        let store = Arc::new(InMemoryStore::new());
        let translator = translator(store.clone(), ScriptedProvider::failing(500));

        assert!(translator.cache_health().await.is_ok());
        store.set_available(false);
        assert!(translator.cache_health().await.is_err());
    }

    // ==================== Helpers ====================

    #[test]
    fn test_detected_language_normalizes() {
        assert_eq!(detected_language(Some("zh-cn".to_string())).unwrap(), "zh-CN");
        assert_eq!(detected_language(Some("und-x".to_string())).unwrap(), "und-x");
        assert!(detected_language(Some(String::new())).is_err());
        assert!(detected_language(None).is_err());
    }

    #[test]
    fn test_request_deserializes_missing_fields_as_empty() {
        let req: TranslationRequest = serde_json::from_str(r#"{"target_lang": "es"}"#).unwrap();
        assert_eq!(req.text, "");
        assert!(req.source_lang.is_none());
        assert!(req.auth_token.is_none());
    }
}
