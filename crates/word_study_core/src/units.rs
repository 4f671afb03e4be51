//! crates/word_study_core/src/units.rs
//!
//! Turns passages and previewed words into persisted training units.

use crate::cache::LexicalCache;
use crate::domain::{
    language_or_default, GenerationConfig, StudySession, TrainingUnit, UnitPreview,
};
use crate::error::{WordStudyError, WordStudyResult};
use crate::ports::{GenerationGateway, StudyStore};
use futures::future::{join_all, try_join_all};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Input for building a full set of units from one passage.
#[derive(Debug, Clone, Default)]
pub struct UnitGenerationRequest {
    pub passage: String,
    pub store_id: Option<String>,
    pub user_id: String,
    pub config: Option<GenerationConfig>,
    pub language: Option<String>,
}

/// Input for committing a previously previewed word to a session.
#[derive(Debug, Clone)]
pub struct AddWordRequest {
    pub session_id: Uuid,
    pub preview: UnitPreview,
    pub word: String,
    pub full_passage: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

pub struct UnitBuilder {
    gateway: Arc<dyn GenerationGateway>,
    store: Arc<dyn StudyStore>,
    lexicon: Arc<LexicalCache>,
}

/// First few characters of a passage, for error messages and logs.
pub(crate) fn excerpt(text: &str) -> String {
    const MAX: usize = 40;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        format!("{}…", trimmed.chars().take(MAX).collect::<String>())
    }
}

impl UnitBuilder {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        store: Arc<dyn StudyStore>,
        lexicon: Arc<LexicalCache>,
    ) -> Self {
        Self {
            gateway,
            store,
            lexicon,
        }
    }

    /// Identifies the significant forms in a passage, expands every form into
    /// a unit concurrently, and persists a new session holding all of them.
    ///
    /// Any failed expansion fails the whole call; no partial list is returned.
    pub async fn generate_training_units(
        &self,
        request: UnitGenerationRequest,
    ) -> WordStudyResult<Vec<TrainingUnit>> {
        if request.passage.trim().is_empty() {
            return Err(WordStudyError::validation("passage is required"));
        }
        if request.user_id.trim().is_empty() {
            return Err(WordStudyError::validation("user id is required"));
        }
        let language = language_or_default(request.language.as_deref());
        let store_id = request.store_id.as_deref();
        let config = request.config.as_ref();
        let passage = request.passage.as_str();
        let language = language.as_str();

        let identified = self
            .gateway
            .identify_forms(passage, store_id, config, language)
            .await
            .map_err(|e| {
                error!("Form identification failed: {}", e);
                WordStudyError::generation(
                    format!("identify significant words in \"{}\"", excerpt(passage)),
                    e,
                )
            })?;

        let mut seen = HashSet::new();
        let forms: Vec<String> = identified
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.clone()))
            .collect();
        info!("Identified {} forms, generating units in parallel", forms.len());

        let units = try_join_all(forms.iter().map(|form| async move {
            self.gateway
                .create_training_unit(form, passage, store_id, config, language)
                .await
                .map_err(|e| {
                    error!("Unit generation failed for '{}': {}", form, e);
                    WordStudyError::generation(format!("build training unit for \"{}\"", form), e)
                })
        }))
        .await?;

        let mut session = StudySession::new(request.user_id.trim(), passage);
        let units: Vec<TrainingUnit> = units
            .into_iter()
            .map(|unit| unit.attached_to(session.id))
            .collect();
        session.units = units.clone();

        self.store
            .create_session(&session)
            .await
            .map_err(WordStudyError::Store)?;
        info!(
            "Persisted session {} with {} units for user {}",
            session.id,
            units.len(),
            session.user_id
        );

        self.seed_lexicon(&units, language).await;
        Ok(units)
    }

    /// Generates the full unit for a word the user accepted from a preview
    /// and appends it to an existing session.
    pub async fn add_previewed_word(&self, request: AddWordRequest) -> WordStudyResult<TrainingUnit> {
        if request.session_id.is_nil() {
            return Err(WordStudyError::validation("session id is required"));
        }
        if request.word.trim().is_empty() {
            return Err(WordStudyError::validation("word is required"));
        }
        let language = language_or_default(request.language.as_deref());
        let surface = request.preview.greek_form.surface.trim();
        let form = if surface.is_empty() {
            request.word.trim()
        } else {
            surface
        };

        let unit = self
            .gateway
            .create_training_unit(
                form,
                &request.full_passage,
                request.store_id.as_deref(),
                None,
                &language,
            )
            .await
            .map_err(|e| {
                WordStudyError::generation(format!("build training unit for \"{}\"", form), e)
            })?
            .attached_to(request.session_id);

        self.store.add_unit(request.session_id, &unit).await?;
        info!("Added unit {} to session {}", unit.id, request.session_id);

        self.seed_lexicon(std::slice::from_ref(&unit), &language).await;
        Ok(unit)
    }

    /// Best-effort: glosses learned while building units go into the shared
    /// lexical cache.
    async fn seed_lexicon(&self, units: &[TrainingUnit], language: &str) {
        let writes = join_all(units.iter().map(|unit| {
            self.lexicon.remember(
                &unit.greek_form.lemma,
                language,
                &unit.greek_form.gloss,
                &unit.identification,
            )
        }))
        .await;
        let failed = writes.iter().filter(|w| !w.is_written()).count();
        if failed > 0 {
            warn!("{} of {} lexical cache writes failed", failed, writes.len());
        }
    }
}
