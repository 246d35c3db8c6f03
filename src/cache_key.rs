//! Cache key derivation.
//!
//! Keys have the shape `translate:{source}:{target}:{text}` where `source` is
//! empty for auto-detect requests. The text is not escaped. Both language
//! fields come from [`LanguageTag`], which never contains `:`, so the first
//! two separators after the prefix are always field boundaries and distinct
//! `(source, target, text)` triples produce distinct keys.

use crate::language::LanguageTag;
use std::fmt;

const KEY_PREFIX: &str = "translate";

/// Key under which a translation result is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a translation of `text` into `target`.
    ///
    /// `source` is `None` for auto-detect requests, which live in their own
    /// key space so they never answer (or get answered by) a source-pinned
    /// request.
    pub fn derive(source: Option<&LanguageTag>, target: &LanguageTag, text: &str) -> Self {
        let source = source.map(LanguageTag::as_str).unwrap_or("");
        Self(format!("{}:{}:{}:{}", KEY_PREFIX, source, target.as_str(), text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
