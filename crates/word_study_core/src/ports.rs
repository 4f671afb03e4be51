//! crates/word_study_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the word-study engine.
//! These traits form the boundary of the hexagonal architecture: content
//! generation, quiz sourcing and durable storage all live behind them.

use crate::domain::{
    ExegeticalInsight, GenerationConfig, MorphologyBreakdown, Passage, QuizAttempt, QuizQuestion,
    ResponseEvaluation, SessionStatus, StudySession, TrainingUnit, UnitPreview, UnitProgress,
    UserResponse, WordCacheEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
///
/// `Clone` so that one upstream result can be handed to every single-flight waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflicting write: {0}")]
    Conflict(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Produces all natural-language content. Every call is expensive.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Lists the significant surface forms in a passage.
    async fn identify_forms(
        &self,
        passage: &str,
        store_id: Option<&str>,
        config: Option<&GenerationConfig>,
        language: &str,
    ) -> PortResult<Vec<String>>;

    /// Expands one surface form into full unit content. The returned unit is
    /// not attached to any session.
    async fn create_training_unit(
        &self,
        form: &str,
        passage: &str,
        store_id: Option<&str>,
        config: Option<&GenerationConfig>,
        language: &str,
    ) -> PortResult<TrainingUnit>;

    async fn identify_word_for_unit(
        &self,
        word: &str,
        context: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<UnitPreview>;

    async fn explain_morphology(
        &self,
        word: &str,
        passage: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<MorphologyBreakdown>;

    /// Grades a free-form answer about a unit.
    async fn evaluate_response(
        &self,
        unit: &TrainingUnit,
        answer: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<ResponseEvaluation>;

    /// Answers an open question. `style_guidance` carries the coaching
    /// strategy's prompt additions.
    async fn answer_free_question(
        &self,
        question: &str,
        context: &str,
        style_guidance: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<String>;

    async fn get_passage_text(
        &self,
        reference: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<Passage>;
}

/// Sources quiz questions for a unit, with its own cache/generate strategy.
#[async_trait]
pub trait QuizService: Send + Sync {
    async fn generate_quiz_questions(
        &self,
        unit: &TrainingUnit,
        count: usize,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<Vec<QuizQuestion>>;
}

/// Durable storage for sessions, progress and insights.
///
/// Units and responses are keyed sub-collections of a session so that
/// concurrent writers never rewrite the whole aggregate.
#[async_trait]
pub trait StudyStore: Send + Sync {
    // --- Sessions ---
    /// Persists a session together with all of its units in one call.
    async fn create_session(&self, session: &StudySession) -> PortResult<()>;

    /// Loads the full aggregate: units in insertion order and the response map.
    async fn get_session(&self, session_id: Uuid) -> PortResult<StudySession>;

    async fn list_sessions_by_user(&self, user_id: &str) -> PortResult<Vec<StudySession>>;

    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    // --- Session sub-collections ---
    /// Appends a unit to an existing session. `NotFound` if the session is absent.
    async fn add_unit(&self, session_id: Uuid, unit: &TrainingUnit) -> PortResult<()>;

    /// Stores a response under its own id. `NotFound` if the session is absent.
    async fn save_response(&self, session_id: Uuid, response: &UserResponse) -> PortResult<()>;

    // --- Progress ---
    async fn get_progress(&self, session_id: Uuid, unit_id: Uuid)
        -> PortResult<Option<UnitProgress>>;

    /// Upserts the mutable part of a progress record (sections, level, last view).
    async fn save_progress(&self, progress: &UnitProgress) -> PortResult<()>;

    /// Appends one attempt to the log. Attempts are never updated.
    async fn save_attempt(&self, session_id: Uuid, attempt: &QuizAttempt) -> PortResult<()>;

    // --- Insights ---
    async fn create_insight(&self, insight: &ExegeticalInsight) -> PortResult<()>;

    async fn get_insight(&self, insight_id: Uuid) -> PortResult<ExegeticalInsight>;

    async fn update_insight(&self, insight: &ExegeticalInsight) -> PortResult<()>;

    async fn delete_insight(&self, insight_id: Uuid) -> PortResult<()>;

    async fn list_insights_by_user(&self, user_id: &str) -> PortResult<Vec<ExegeticalInsight>>;
}

/// Backing storage for the two global content caches. Keys arrive already
/// normalized; implementations store and compare them verbatim.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_cached_passage(&self, key: &str) -> PortResult<Option<Passage>>;

    async fn cache_passage(&self, key: &str, passage: &Passage) -> PortResult<()>;

    async fn get_word_entry(&self, key: &str) -> PortResult<Option<WordCacheEntry>>;

    async fn set_word_entry(&self, key: &str, entry: &WordCacheEntry) -> PortResult<()>;
}
