//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use word_study_core::WordStudyService;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WordStudyService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The request's language, or the configured default when it named none.
    pub fn language(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => self.config.default_language.clone(),
        }
    }
}
