//! crates/word_study_core/src/service.rs
//!
//! The use cases exposed to the surrounding application. Each method takes
//! plain data, talks to the ports, and returns plain data or a
//! `WordStudyError`.
//!
//! Writes on non-critical paths (caches, progress, section views, responses)
//! never fail the call; their outcome is returned alongside the result.

use crate::cache::{CacheStatus, LexicalCache, PassageCache, WriteOutcome};
use crate::coaching::{select_strategy, CoachingContext, StrategyPreference, StrategySelection};
use crate::domain::{
    language_or_default, ExegeticalInsight, MorphologyBreakdown, Passage, QuizAttempt,
    QuizQuestion, SessionStatus, StudySession, TrainingUnit, UnitPreview, UnitProgress,
    UserResponse, WordCacheEntry,
};
use crate::error::{WordStudyError, WordStudyResult};
use crate::filters::{sanitize_tags, InsightFilters, SessionFilters};
use crate::ports::{CacheStore, GenerationGateway, PortError, QuizService, StudyStore};
use crate::progress::{record_attempt, record_section_view, validate_answer};
use crate::units::{excerpt, AddWordRequest, UnitBuilder, UnitGenerationRequest};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_QUIZ_SIZE: usize = 3;
pub const MAX_QUIZ_SIZE: usize = 20;

//=========================================================================================
// Use-case inputs and outputs
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PassageLookup {
    pub passage: Passage,
    pub cache: CacheStatus,
}

#[derive(Debug, Clone)]
pub struct QuizAnswer {
    pub session_id: Uuid,
    pub unit_id: Uuid,
    pub question: QuizQuestion,
    pub user_answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSubmission {
    pub is_correct: bool,
    pub explanation: String,
    pub attempt: QuizAttempt,
    pub progress: UnitProgress,
    /// Whether the attempt and updated progress reached the store.
    pub persisted: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub progress: UnitProgress,
    pub persisted: WriteOutcome,
}

/// What happened to a graded response on its way to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStorage {
    /// The unit is not attached to a session; nothing to store.
    Detached,
    Saved,
    /// The unit points at a session that no longer exists.
    SessionMissing,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedResponse {
    pub response: UserResponse,
    pub storage: ResponseStorage,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachedAnswer {
    pub answer: String,
    pub selection: StrategySelection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInsight {
    pub session_id: Uuid,
    pub unit_id: Uuid,
    pub user_id: String,
    pub passage: String,
    pub greek_word: String,
    pub title: String,
    pub question: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightUpdate {
    pub title: Option<String>,
    pub question: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn required<'a>(value: &'a str, what: &str) -> WordStudyResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(WordStudyError::validation(format!("{} is required", what)))
    } else {
        Ok(trimmed)
    }
}

fn required_id(id: Uuid, what: &str) -> WordStudyResult<Uuid> {
    if id.is_nil() {
        Err(WordStudyError::validation(format!("{} is required", what)))
    } else {
        Ok(id)
    }
}

//=========================================================================================
// The Service
//=========================================================================================

pub struct WordStudyService {
    gateway: Arc<dyn GenerationGateway>,
    quizzes: Arc<dyn QuizService>,
    store: Arc<dyn StudyStore>,
    passages: PassageCache,
    lexicon: Arc<LexicalCache>,
    units: UnitBuilder,
}

impl WordStudyService {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        quizzes: Arc<dyn QuizService>,
        store: Arc<dyn StudyStore>,
        cache_store: Arc<dyn CacheStore>,
    ) -> Self {
        let lexicon = Arc::new(LexicalCache::new(cache_store.clone()));
        let units = UnitBuilder::new(gateway.clone(), store.clone(), lexicon.clone());
        Self {
            gateway,
            quizzes,
            store,
            passages: PassageCache::new(cache_store),
            lexicon,
            units,
        }
    }

    // --- Sessions and units ---

    /// Builds an empty active session. The caller decides when to save it.
    pub fn start_greek_training(&self, user_id: &str, passage: &str) -> WordStudyResult<StudySession> {
        let user_id = required(user_id, "user id")?;
        let passage = required(passage, "passage")?;
        Ok(StudySession::new(user_id, passage))
    }

    pub async fn generate_training_units(
        &self,
        request: UnitGenerationRequest,
    ) -> WordStudyResult<Vec<TrainingUnit>> {
        self.units.generate_training_units(request).await
    }

    pub async fn add_passage_word_to_units(
        &self,
        request: AddWordRequest,
    ) -> WordStudyResult<TrainingUnit> {
        self.units.add_previewed_word(request).await
    }

    // --- Content ---

    /// Cache-first passage retrieval. Concurrent misses on one reference
    /// share a single generation.
    pub async fn get_passage_text(
        &self,
        reference: &str,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<PassageLookup> {
        let reference = required(reference, "reference")?.to_string();
        let language = language_or_default(language);
        let gateway = self.gateway.clone();
        let store_id = store_id.map(str::to_string);
        let upstream_reference = reference.clone();

        let (passage, cache) = self
            .passages
            .get_or_generate(&reference, move || async move {
                gateway
                    .get_passage_text(&upstream_reference, store_id.as_deref(), &language)
                    .await
            })
            .await
            .map_err(|e| WordStudyError::generation(format!("fetch passage {}", reference), e))?;

        info!(reference = %reference, cache = ?cache, "passage served");
        Ok(PassageLookup { passage, cache })
    }

    /// Identifies a selected word in context without creating a unit.
    pub async fn identify_passage_word(
        &self,
        word: &str,
        full_context: &str,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<UnitPreview> {
        let word = required(word, "word")?;
        let language = language_or_default(language);

        let mut preview = self
            .gateway
            .identify_word_for_unit(word, full_context, store_id, &language)
            .await
            .map_err(|e| WordStudyError::generation(format!("identify word \"{}\"", word), e))?;

        let lemma = preview.greek_form.lemma.clone();
        if preview.greek_form.gloss.trim().is_empty() {
            if let Some(entry) = self.lexicon.get(&lemma, &language).await {
                preview.greek_form.gloss = entry.gloss;
            }
        } else if !self
            .lexicon
            .remember(
                &lemma,
                &language,
                &preview.greek_form.gloss,
                &preview.identification,
            )
            .await
            .is_written()
        {
            warn!(lemma = %lemma, "gloss from identification was not cached");
        }
        Ok(preview)
    }

    pub async fn explain_morphology(
        &self,
        word: &str,
        passage: &str,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<MorphologyBreakdown> {
        let word = required(word, "word")?;
        let language = language_or_default(language);
        self.gateway
            .explain_morphology(word, passage, store_id, &language)
            .await
            .map_err(|e| {
                WordStudyError::generation(format!("explain morphology of \"{}\"", word), e)
            })
    }

    /// Reads the shared lexical cache. Never calls the gateway.
    pub async fn lookup_word(
        &self,
        lemma: &str,
        language: Option<&str>,
    ) -> WordStudyResult<Option<WordCacheEntry>> {
        let lemma = required(lemma, "lemma")?;
        Ok(self.lexicon.get(lemma, &language_or_default(language)).await)
    }

    // --- Quizzes and progress ---

    pub async fn generate_quiz(
        &self,
        unit: &TrainingUnit,
        count: Option<usize>,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<Vec<QuizQuestion>> {
        let count = count.unwrap_or(DEFAULT_QUIZ_SIZE);
        if count == 0 || count > MAX_QUIZ_SIZE {
            return Err(WordStudyError::validation(format!(
                "question count must be between 1 and {}",
                MAX_QUIZ_SIZE
            )));
        }
        let language = language_or_default(language);

        let mut questions = self
            .quizzes
            .generate_quiz_questions(unit, count, store_id, &language)
            .await
            .map_err(|e| {
                WordStudyError::generation(
                    format!("generate quiz for \"{}\"", unit.greek_form.lemma),
                    e,
                )
            })?;
        questions.truncate(count);
        Ok(questions)
    }

    /// Grades an answer, appends the attempt, and recomputes mastery from the
    /// full attempt log. Persistence is best-effort; the graded result is
    /// returned either way.
    pub async fn submit_quiz_answer(
        &self,
        answer: QuizAnswer,
        current_progress: &UnitProgress,
    ) -> WordStudyResult<QuizSubmission> {
        let session_id = required_id(answer.session_id, "session id")?;
        let unit_id = required_id(answer.unit_id, "unit id")?;
        if current_progress.session_id != session_id || current_progress.unit_id != unit_id {
            return Err(WordStudyError::validation(
                "progress does not belong to the given session and unit",
            ));
        }

        let question = &answer.question;
        let is_correct = validate_answer(
            &answer.user_answer,
            &question.correct_answer,
            &question.question_type,
        );
        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            unit_id,
            question_id: question.id,
            user_answer: answer.user_answer.clone(),
            is_correct,
            attempted_at: Utc::now(),
        };
        let progress = record_attempt(current_progress, attempt.clone());

        let persisted = match self.store.save_attempt(session_id, &attempt).await {
            Ok(()) => match self.store.save_progress(&progress).await {
                Ok(()) => WriteOutcome::Written,
                Err(e) => {
                    warn!(%session_id, %unit_id, error = %e, "progress not saved after quiz attempt");
                    WriteOutcome::Failed
                }
            },
            Err(e) => {
                warn!(%session_id, %unit_id, error = %e, "quiz attempt not saved");
                WriteOutcome::Failed
            }
        };

        Ok(QuizSubmission {
            is_correct,
            explanation: question.explanation.clone(),
            attempt,
            progress,
            persisted,
        })
    }

    /// Marks a section as viewed. Storage failures are logged, never raised.
    pub async fn track_section_view(
        &self,
        session_id: Uuid,
        unit_id: Uuid,
        section: &str,
        current_progress: &UnitProgress,
    ) -> WordStudyResult<SectionView> {
        required_id(session_id, "session id")?;
        required_id(unit_id, "unit id")?;
        let section = required(section, "section")?;

        let progress = record_section_view(current_progress, section, Utc::now());
        let persisted = match self.store.save_progress(&progress).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                warn!(%session_id, %unit_id, section, error = %e, "section view not saved");
                WriteOutcome::Failed
            }
        };
        Ok(SectionView {
            progress,
            persisted,
        })
    }

    /// Stored progress for a unit, or a fresh level-0 record.
    pub async fn get_unit_progress(
        &self,
        session_id: Uuid,
        unit_id: Uuid,
    ) -> WordStudyResult<UnitProgress> {
        required_id(session_id, "session id")?;
        required_id(unit_id, "unit id")?;
        Ok(self
            .store
            .get_progress(session_id, unit_id)
            .await
            .map_err(WordStudyError::Store)?
            .unwrap_or_else(|| UnitProgress::new(session_id, unit_id)))
    }

    // --- Free-form answers and questions ---

    /// Grades a free-form answer and files it under the unit's session.
    /// A missing session is logged; the graded response is still returned.
    pub async fn evaluate_user_response(
        &self,
        unit: &TrainingUnit,
        user_answer: &str,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<EvaluatedResponse> {
        let user_answer = required(user_answer, "answer")?;
        let language = language_or_default(language);

        let evaluation = self
            .gateway
            .evaluate_response(unit, user_answer, store_id, &language)
            .await
            .map_err(|e| {
                WordStudyError::generation(
                    format!("evaluate answer for \"{}\"", unit.greek_form.lemma),
                    e,
                )
            })?;

        let response = UserResponse {
            id: Uuid::new_v4(),
            unit_id: unit.id,
            user_answer: user_answer.to_string(),
            feedback: evaluation.feedback,
            is_correct: evaluation.is_correct,
            created_at: Utc::now(),
        };

        let storage = match unit.session_id {
            None => ResponseStorage::Detached,
            Some(session_id) => match self.store.save_response(session_id, &response).await {
                Ok(()) => ResponseStorage::Saved,
                Err(PortError::NotFound(_)) => {
                    warn!(%session_id, response_id = %response.id, "session not found, response not stored");
                    ResponseStorage::SessionMissing
                }
                Err(e) => {
                    warn!(%session_id, response_id = %response.id, error = %e, "response not stored");
                    ResponseStorage::Failed
                }
            },
        };

        Ok(EvaluatedResponse { response, storage })
    }

    /// Answers an open question in the coaching style picked for it.
    pub async fn ask_question(
        &self,
        question: &str,
        context: &CoachingContext,
        preference: StrategyPreference,
        store_id: Option<&str>,
        language: Option<&str>,
    ) -> WordStudyResult<CoachedAnswer> {
        let question = required(question, "question")?;
        let language = language_or_default(language);
        let selection = select_strategy(question, context, preference);
        info!(
            strategy = selection.strategy.name(),
            intent = ?selection.analysis.intent,
            vague = selection.analysis.is_vague,
            "coaching strategy selected"
        );

        let mut context_text = String::new();
        if let Some(passage) = context.passage.as_deref().filter(|p| !p.trim().is_empty()) {
            context_text.push_str(&format!("PASSAGE:\n{}\n", passage.trim()));
        }
        if let Some(word) = context.greek_word.as_deref().filter(|w| !w.trim().is_empty()) {
            context_text.push_str(&format!("GREEK WORD: {}\n", word.trim()));
        }

        let answer = self
            .gateway
            .answer_free_question(
                question,
                &context_text,
                &selection.prompt_additions,
                store_id,
                &language,
            )
            .await
            .map_err(|e| {
                WordStudyError::generation(format!("answer question \"{}\"", excerpt(question)), e)
            })?;

        Ok(CoachedAnswer { answer, selection })
    }

    // --- Session management ---

    async fn owned_session(&self, session_id: Uuid, user_id: &str) -> WordStudyResult<StudySession> {
        let session = self.store.get_session(session_id).await?;
        if !session.is_owned_by(user_id) {
            warn!(%session_id, user_id, "session access by non-owner rejected");
            return Err(WordStudyError::session_not_owned(session_id, user_id));
        }
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid, user_id: &str) -> WordStudyResult<StudySession> {
        let session_id = required_id(session_id, "session id")?;
        let user_id = required(user_id, "user id")?;
        self.owned_session(session_id, user_id).await
    }

    /// Deletes a session after verifying the caller owns it.
    pub async fn delete_session(&self, session_id: Uuid, user_id: &str) -> WordStudyResult<()> {
        let session_id = required_id(session_id, "session id")?;
        let user_id = required(user_id, "user id")?;
        self.owned_session(session_id, user_id).await?;
        self.store.delete_session(session_id).await?;
        info!(%session_id, user_id, "session deleted");
        Ok(())
    }

    /// Moves an active session to COMPLETED or ABANDONED.
    pub async fn update_session_status(
        &self,
        session_id: Uuid,
        user_id: &str,
        status: SessionStatus,
    ) -> WordStudyResult<StudySession> {
        let session_id = required_id(session_id, "session id")?;
        let user_id = required(user_id, "user id")?;
        let mut session = self.owned_session(session_id, user_id).await?;
        if session.status != SessionStatus::Active || status == SessionStatus::Active {
            return Err(WordStudyError::validation(format!(
                "cannot move session from {} to {}",
                session.status.as_str(),
                status.as_str()
            )));
        }
        let now = Utc::now();
        self.store
            .update_session_status(session_id, status, now)
            .await?;
        session.status = status;
        session.updated_at = now;
        Ok(session)
    }

    pub async fn get_user_sessions(
        &self,
        user_id: &str,
        filters: &SessionFilters,
    ) -> WordStudyResult<Vec<StudySession>> {
        let user_id = required(user_id, "user id")?;
        filters.validate()?;
        let sessions = self
            .store
            .list_sessions_by_user(user_id)
            .await
            .map_err(WordStudyError::Store)?;
        Ok(filters.apply(sessions, Utc::now()))
    }

    // --- Insights ---

    pub async fn create_insight(&self, new: NewInsight) -> WordStudyResult<ExegeticalInsight> {
        let user_id = required(&new.user_id, "user id")?;
        required_id(new.session_id, "session id")?;
        required_id(new.unit_id, "unit id")?;
        let content = required(&new.content, "insight content")?;
        let session = self.owned_session(new.session_id, user_id).await?;
        if !session.units.iter().any(|unit| unit.id == new.unit_id) {
            return Err(WordStudyError::NotFound(format!(
                "Unit {} in session {}",
                new.unit_id, new.session_id
            )));
        }

        let now = Utc::now();
        let insight = ExegeticalInsight {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            unit_id: new.unit_id,
            user_id: user_id.to_string(),
            passage: new.passage.trim().to_string(),
            greek_word: new.greek_word.trim().to_string(),
            title: new.title.trim().to_string(),
            question: new.question.filter(|q| !q.trim().is_empty()),
            content: content.to_string(),
            tags: sanitize_tags(&new.tags),
            created_at: now,
            updated_at: now,
        };
        self.store
            .create_insight(&insight)
            .await
            .map_err(WordStudyError::Store)?;
        Ok(insight)
    }

    async fn owned_insight(
        &self,
        user_id: &str,
        insight_id: Uuid,
    ) -> WordStudyResult<(String, ExegeticalInsight)> {
        let user_id = required(user_id, "user id")?.to_string();
        let insight_id = required_id(insight_id, "insight id")?;
        let insight = self.store.get_insight(insight_id).await?;
        if insight.user_id != user_id {
            return Err(WordStudyError::insight_not_owned(insight_id, &user_id));
        }
        Ok((user_id, insight))
    }

    pub async fn update_insight(
        &self,
        user_id: &str,
        insight_id: Uuid,
        update: InsightUpdate,
    ) -> WordStudyResult<ExegeticalInsight> {
        let (_, mut insight) = self.owned_insight(user_id, insight_id).await?;

        if let Some(title) = update.title {
            insight.title = title.trim().to_string();
        }
        if let Some(question) = update.question {
            insight.question = Some(question).filter(|q| !q.trim().is_empty());
        }
        if let Some(content) = update.content {
            insight.content = required(&content, "insight content")?.to_string();
        }
        if let Some(tags) = update.tags {
            insight.tags = sanitize_tags(tags);
        }
        insight.updated_at = Utc::now();

        self.store.update_insight(&insight).await?;
        Ok(insight)
    }

    pub async fn delete_insight(&self, user_id: &str, insight_id: Uuid) -> WordStudyResult<()> {
        let (user_id, insight) = self.owned_insight(user_id, insight_id).await?;
        self.store.delete_insight(insight.id).await?;
        info!(%insight_id, user_id = %user_id, "insight deleted");
        Ok(())
    }

    /// One full fetch of the user's insights, filtered in memory.
    pub async fn get_user_insights(
        &self,
        user_id: &str,
        filters: &InsightFilters,
    ) -> WordStudyResult<Vec<ExegeticalInsight>> {
        let user_id = required(user_id, "user id")?;
        let insights = self
            .store
            .list_insights_by_user(user_id)
            .await
            .map_err(WordStudyError::Store)?;
        Ok(filters.apply(insights))
    }
}
