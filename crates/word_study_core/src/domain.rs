//! crates/word_study_core/src/domain.rs
//!
//! Defines the pure, core data structures for the word-study engine.
//! These structs carry no database or transport concerns; `serde` derives are
//! only there so the delivery layer can hand them out as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Output language used when a caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "Spanish";

/// Resolves an optional caller language to the one actually sent upstream.
pub fn language_or_default(language: Option<&str>) -> String {
    match language.map(str::trim) {
        Some(lang) if !lang.is_empty() => lang.to_string(),
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

//=========================================================================================
// Sessions and Units
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Abandoned => "ABANDONED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(SessionStatus::Active),
            "COMPLETED" => Some(SessionStatus::Completed),
            "ABANDONED" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

/// The Greek form a training unit is built around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreekForm {
    pub lemma: String,
    pub surface: String,
    pub transliteration: String,
    pub gloss: String,
}

/// One learnable item derived from a single word/form in a passage.
///
/// `session_id` is a back-reference only: it is `None` while the unit is a
/// preview and is stamped once the unit is attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingUnit {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub greek_form: GreekForm,
    pub identification: String,
    pub function_in_context: String,
    pub significance: String,
}

impl TrainingUnit {
    /// Returns the unit re-pointed at `session_id`. Nothing else changes.
    pub fn attached_to(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// A word identified in context but not yet turned into a persisted unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPreview {
    pub greek_form: GreekForm,
    pub identification: String,
}

/// A graded free-form answer, kept in its session's response map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub user_answer: String,
    pub feedback: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

/// The gateway's verdict on a free-form answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvaluation {
    pub feedback: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: String,
    pub passage: String,
    pub status: SessionStatus,
    pub units: Vec<TrainingUnit>,
    pub responses: HashMap<Uuid, UserResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudySession {
    /// A fresh, empty, active session. Nothing is persisted.
    pub fn new(user_id: impl Into<String>, passage: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            passage: passage.into(),
            status: SessionStatus::Active,
            units: Vec::new(),
            responses: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

//=========================================================================================
// Progress and Quizzes
//=========================================================================================

/// A learner's command of a unit. Ordered so that `max` raises the level.
/// Travels as its 0-3 integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum MasteryLevel {
    /// Nothing viewed or attempted yet. Only ever an initial value.
    #[default]
    Unseen,
    Viewed,
    Practiced,
    Mastered,
}

impl MasteryLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            MasteryLevel::Unseen => 0,
            MasteryLevel::Viewed => 1,
            MasteryLevel::Practiced => 2,
            MasteryLevel::Mastered => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MasteryLevel::Unseen),
            1 => Some(MasteryLevel::Viewed),
            2 => Some(MasteryLevel::Practiced),
            3 => Some(MasteryLevel::Mastered),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MasteryLevel::from_u8(value).ok_or_else(|| format!("mastery level {} is not in 0-3", value))
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.as_u8()
    }
}

/// Serialized with the same spelling the quiz bank stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuizType {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    /// Anything the generator produced that we do not know how to grade.
    Other(String),
}

impl QuizType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "multiple-choice" => QuizType::MultipleChoice,
            "true-false" => QuizType::TrueFalse,
            "fill-blank" => QuizType::FillBlank,
            other => QuizType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QuizType::MultipleChoice => "multiple-choice",
            QuizType::TrueFalse => "true-false",
            QuizType::FillBlank => "fill-blank",
            QuizType::Other(raw) => raw,
        }
    }
}

impl From<String> for QuizType {
    fn from(raw: String) -> Self {
        QuizType::parse(&raw)
    }
}

impl From<QuizType> for String {
    fn from(question_type: QuizType) -> Self {
        question_type.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question_type: QuizType,
    pub prompt: String,
    /// Choices for multiple-choice questions; empty otherwise.
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// One graded quiz answer. Append-only: never edited once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub question_id: Uuid,
    pub user_answer: String,
    pub is_correct: bool,
    pub attempted_at: DateTime<Utc>,
}

/// Mutable per-(session, unit) learning state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitProgress {
    pub session_id: Uuid,
    pub unit_id: Uuid,
    pub viewed_sections: BTreeSet<String>,
    pub attempts: Vec<QuizAttempt>,
    pub mastery_level: MasteryLevel,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

impl UnitProgress {
    pub fn new(session_id: Uuid, unit_id: Uuid) -> Self {
        Self {
            session_id,
            unit_id,
            viewed_sections: BTreeSet::new(),
            attempts: Vec::new(),
            mastery_level: MasteryLevel::Unseen,
            last_viewed_at: None,
        }
    }

    pub fn correct_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_correct).count()
    }

    /// Share of correct attempts, `None` when nothing has been attempted.
    pub fn accuracy(&self) -> Option<f64> {
        if self.attempts.is_empty() {
            None
        } else {
            Some(self.correct_attempts() as f64 / self.attempts.len() as f64)
        }
    }
}

//=========================================================================================
// Cached Content
//=========================================================================================

/// One translation/version of a passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageVersion {
    pub version: String,
    pub text: String,
}

/// The multi-version text bundle for a scripture reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub reference: String,
    pub greek_text: String,
    pub versions: Vec<PassageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCacheEntry {
    pub lemma: String,
    pub language: String,
    pub gloss: String,
    pub grammatical_category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Morphological parse of a single word. Fields that do not apply to the
/// word's part of speech stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyBreakdown {
    pub word: String,
    pub lemma: String,
    pub part_of_speech: String,
    pub tense: Option<String>,
    pub voice: Option<String>,
    pub mood: Option<String>,
    pub case: Option<String>,
    pub number: Option<String>,
    pub gender: Option<String>,
    pub person: Option<String>,
    pub explanation: String,
}

/// Optional knobs forwarded to the generation gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

//=========================================================================================
// Insights
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExegeticalInsight {
    pub id: Uuid,
    pub session_id: Uuid,
    pub unit_id: Uuid,
    pub user_id: String,
    pub passage: String,
    pub greek_word: String,
    pub title: String,
    pub question: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastery_levels_travel_as_integers() {
        assert_eq!(serde_json::to_string(&MasteryLevel::Practiced).unwrap(), "2");
        let level: MasteryLevel = serde_json::from_str("3").unwrap();
        assert_eq!(level, MasteryLevel::Mastered);
        assert!(serde_json::from_str::<MasteryLevel>("4").is_err());
    }

    #[test]
    fn quiz_types_use_the_hyphenated_spelling() {
        assert_eq!(
            serde_json::to_string(&QuizType::MultipleChoice).unwrap(),
            "\"multiple-choice\""
        );
        let parsed: QuizType = serde_json::from_str("\"fill_blank\"").unwrap();
        assert_eq!(parsed, QuizType::FillBlank);
        let unknown: QuizType = serde_json::from_str("\"matching\"").unwrap();
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"matching\"");
    }
}
