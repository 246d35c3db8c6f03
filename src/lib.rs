//! Cache-aside translation service.
//!
//! Requests flow through [`translation::Translator`], which checks a
//! [`cache::ResultCache`] before calling a [`provider::TranslationProvider`]
//! and writes fresh translations back. [`server::router`] exposes it over HTTP.

pub mod cache;
pub mod cache_key;
pub mod config;
pub mod language;
pub mod metrics;
pub mod provider;
pub mod retry;
pub mod security;
pub mod server;
pub mod translation;
