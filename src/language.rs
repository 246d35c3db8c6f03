//! Language tag: syntactically validated, normalized language code.
//!
//! Callers send ISO 639-1 style codes, optionally qualified with a script
//! and/or region (`en`, `en-US`, `zh-Hant-TW`, `es-419`). This module
//! checks the shape of those codes and brings them into canonical casing so
//! that `EN-us` and `en-US` address the same cache entries.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Error returned when a language code is not a well-formed tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid language tag: '{0}'")]
pub struct InvalidLanguageTag(pub String);

// language[-script][-region], '_' accepted in place of '-'
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{2,3})(?:[-_]([A-Za-z]{4}))?(?:[-_]([A-Za-z]{2}|[0-9]{3}))?$")
            .unwrap()
    })
}

/// A validated, normalized language tag.
///
/// The primary language subtag is lowercase, the script subtag titlecase and
/// the region subtag uppercase, joined with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Parse and normalize a language code.
    ///
    /// # Arguments
    /// * `code` - The caller-supplied code (e.g., "en", "en-us", "pt_BR")
    ///
    /// # Returns
    /// * `Ok(LanguageTag)` holding the normalized form
    /// * `Err(InvalidLanguageTag)` if the code is empty or malformed
    pub fn parse(code: &str) -> Result<Self, InvalidLanguageTag> {
        let caps = tag_regex()
            .captures(code)
            .ok_or_else(|| InvalidLanguageTag(code.to_string()))?;

        let mut normalized = caps[1].to_ascii_lowercase();

        if let Some(script) = caps.get(2) {
            let script = script.as_str();
            normalized.push('-');
            normalized.push_str(&script[..1].to_ascii_uppercase());
            normalized.push_str(&script[1..].to_ascii_lowercase());
        }

        if let Some(region) = caps.get(3) {
            normalized.push('-');
            normalized.push_str(&region.as_str().to_ascii_uppercase());
        }

        Ok(Self(normalized))
    }

    /// The normalized tag (e.g., "en-US").
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
