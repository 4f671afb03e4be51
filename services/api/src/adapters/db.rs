//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `StudyStore` and `CacheStore` ports from the core crate. It handles all
//! interactions with PostgreSQL using `sqlx`.
//!
//! Queries are checked at runtime (`query_as::<_, Record>`) so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;
use word_study_core::domain::{
    ExegeticalInsight, GreekForm, MasteryLevel, Passage, PassageVersion, QuizAttempt,
    SessionStatus, StudySession, TrainingUnit, UnitProgress, UserResponse, WordCacheEntry,
};
use word_study_core::ports::{CacheStore, PortError, PortResult, StudyStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(unexpected)
    }

    /// Bumps `updated_at` on a session, failing with `NotFound` when it is gone.
    async fn touch_session(
        tx: &mut Transaction<'static, Postgres>,
        session_id: Uuid,
    ) -> PortResult<()> {
        let touched = sqlx::query("UPDATE study_sessions SET updated_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(&mut **tx)
            .await
            .map_err(unexpected)?;
        if touched.rows_affected() == 0 {
            return Err(session_not_found(session_id));
        }
        Ok(())
    }

    /// Loads units and responses for a batch of sessions and assembles the
    /// aggregates in the order the session rows came in.
    async fn assemble(&self, records: Vec<SessionRecord>) -> PortResult<Vec<StudySession>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();

        let units = sqlx::query_as::<_, UnitRecord>(
            "SELECT id, session_id, lemma, surface, transliteration, gloss, identification, \
             function_in_context, significance \
             FROM training_units WHERE session_id = ANY($1) ORDER BY seq ASC",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool);
        let responses = sqlx::query_as::<_, ResponseRecord>(
            "SELECT id, session_id, unit_id, user_answer, feedback, is_correct, created_at \
             FROM user_responses WHERE session_id = ANY($1)",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool);
        let (units, responses) = futures::try_join!(units, responses).map_err(unexpected)?;

        let mut units_by_session: HashMap<Uuid, Vec<TrainingUnit>> = HashMap::new();
        for unit in units {
            units_by_session
                .entry(unit.session_id)
                .or_default()
                .push(unit.to_domain());
        }
        let mut responses_by_session: HashMap<Uuid, HashMap<Uuid, UserResponse>> = HashMap::new();
        for response in responses {
            let session_id = response.session_id;
            let response = response.to_domain();
            responses_by_session
                .entry(session_id)
                .or_default()
                .insert(response.id, response);
        }

        records
            .into_iter()
            .map(|record| {
                let units = units_by_session.remove(&record.id).unwrap_or_default();
                let responses = responses_by_session.remove(&record.id).unwrap_or_default();
                record.to_domain(units, responses)
            })
            .collect()
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn session_not_found(session_id: Uuid) -> PortError {
    PortError::NotFound(format!("Session {} not found", session_id))
}

fn insight_not_found(insight_id: Uuid) -> PortError {
    PortError::NotFound(format!("Insight {} not found", insight_id))
}

/// Unique violations become `Conflict`; everything else is unexpected.
fn conflict_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(what()),
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: String,
    passage: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(
        self,
        units: Vec<TrainingUnit>,
        responses: HashMap<Uuid, UserResponse>,
    ) -> PortResult<StudySession> {
        let status = SessionStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Session {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(StudySession {
            id: self.id,
            user_id: self.user_id,
            passage: self.passage,
            status,
            units,
            responses,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UnitRecord {
    id: Uuid,
    session_id: Uuid,
    lemma: String,
    surface: String,
    transliteration: String,
    gloss: String,
    identification: String,
    function_in_context: String,
    significance: String,
}
impl UnitRecord {
    fn to_domain(self) -> TrainingUnit {
        TrainingUnit {
            id: self.id,
            session_id: Some(self.session_id),
            greek_form: GreekForm {
                lemma: self.lemma,
                surface: self.surface,
                transliteration: self.transliteration,
                gloss: self.gloss,
            },
            identification: self.identification,
            function_in_context: self.function_in_context,
            significance: self.significance,
        }
    }
}

#[derive(FromRow)]
struct ResponseRecord {
    id: Uuid,
    session_id: Uuid,
    unit_id: Uuid,
    user_answer: String,
    feedback: String,
    is_correct: bool,
    created_at: DateTime<Utc>,
}
impl ResponseRecord {
    fn to_domain(self) -> UserResponse {
        UserResponse {
            id: self.id,
            unit_id: self.unit_id,
            user_answer: self.user_answer,
            feedback: self.feedback,
            is_correct: self.is_correct,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    session_id: Uuid,
    unit_id: Uuid,
    viewed_sections: Vec<String>,
    mastery_level: i16,
    last_viewed_at: Option<DateTime<Utc>>,
}
impl ProgressRecord {
    fn to_domain(self, attempts: Vec<QuizAttempt>) -> PortResult<UnitProgress> {
        let mastery_level = u8::try_from(self.mastery_level)
            .ok()
            .and_then(MasteryLevel::from_u8)
            .ok_or_else(|| {
                PortError::Unexpected(format!(
                    "Unit {} has invalid mastery level {}",
                    self.unit_id, self.mastery_level
                ))
            })?;
        Ok(UnitProgress {
            session_id: self.session_id,
            unit_id: self.unit_id,
            viewed_sections: self.viewed_sections.into_iter().collect::<BTreeSet<_>>(),
            attempts,
            mastery_level,
            last_viewed_at: self.last_viewed_at,
        })
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: Uuid,
    unit_id: Uuid,
    question_id: Uuid,
    user_answer: String,
    is_correct: bool,
    attempted_at: DateTime<Utc>,
}
impl AttemptRecord {
    fn to_domain(self) -> QuizAttempt {
        QuizAttempt {
            id: self.id,
            unit_id: self.unit_id,
            question_id: self.question_id,
            user_answer: self.user_answer,
            is_correct: self.is_correct,
            attempted_at: self.attempted_at,
        }
    }
}

#[derive(FromRow)]
struct InsightRecord {
    id: Uuid,
    session_id: Uuid,
    unit_id: Uuid,
    user_id: String,
    passage: String,
    greek_word: String,
    title: String,
    question: Option<String>,
    content: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl InsightRecord {
    fn to_domain(self) -> ExegeticalInsight {
        ExegeticalInsight {
            id: self.id,
            session_id: self.session_id,
            unit_id: self.unit_id,
            user_id: self.user_id,
            passage: self.passage,
            greek_word: self.greek_word,
            title: self.title,
            question: self.question,
            content: self.content,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PassageRecord {
    reference: String,
    greek_text: String,
    versions: Json<Vec<PassageVersion>>,
}
impl PassageRecord {
    fn to_domain(self) -> Passage {
        Passage {
            reference: self.reference,
            greek_text: self.greek_text,
            versions: self.versions.0,
        }
    }
}

#[derive(FromRow)]
struct WordRecord {
    lemma: String,
    language: String,
    gloss: String,
    grammatical_category: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl WordRecord {
    fn to_domain(self) -> WordCacheEntry {
        WordCacheEntry {
            lemma: self.lemma,
            language: self.language,
            gloss: self.gloss,
            grammatical_category: self.grammatical_category,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, passage, status, created_at, updated_at";
const INSIGHT_COLUMNS: &str = "id, session_id, unit_id, user_id, passage, greek_word, title, \
                               question, content, tags, created_at, updated_at";

async fn insert_unit(
    tx: &mut Transaction<'static, Postgres>,
    session_id: Uuid,
    unit: &TrainingUnit,
) -> PortResult<()> {
    let form = &unit.greek_form;
    sqlx::query(
        "INSERT INTO training_units (id, session_id, lemma, surface, transliteration, gloss, \
         identification, function_in_context, significance) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(unit.id)
    .bind(session_id)
    .bind(&form.lemma)
    .bind(&form.surface)
    .bind(&form.transliteration)
    .bind(&form.gloss)
    .bind(&unit.identification)
    .bind(&unit.function_in_context)
    .bind(&unit.significance)
    .execute(&mut **tx)
    .await
    .map_err(|e| conflict_or_unexpected(e, || format!("Unit {} already exists", unit.id)))?;
    Ok(())
}

async fn insert_response(
    tx: &mut Transaction<'static, Postgres>,
    session_id: Uuid,
    response: &UserResponse,
) -> PortResult<()> {
    sqlx::query(
        "INSERT INTO user_responses (id, session_id, unit_id, user_answer, feedback, is_correct, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET feedback = EXCLUDED.feedback, is_correct = EXCLUDED.is_correct",
    )
    .bind(response.id)
    .bind(session_id)
    .bind(response.unit_id)
    .bind(&response.user_answer)
    .bind(&response.feedback)
    .bind(response.is_correct)
    .bind(response.created_at)
    .execute(&mut **tx)
    .await
    .map_err(unexpected)?;
    Ok(())
}

//=========================================================================================
// `StudyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyStore for DbAdapter {
    async fn create_session(&self, session: &StudySession) -> PortResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO study_sessions (id, user_id, passage, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id)
        .bind(&session.user_id)
        .bind(&session.passage)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, || format!("Session {} already exists", session.id)))?;

        for unit in &session.units {
            insert_unit(&mut tx, session.id, unit).await?;
        }
        for response in session.responses.values() {
            insert_response(&mut tx, session.id, response).await?;
        }
        tx.commit().await.map_err(unexpected)?;
        debug!(session_id = %session.id, units = session.units.len(), "session stored");
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM study_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => session_not_found(session_id),
            _ => unexpected(e),
        })?;

        let mut sessions = self.assemble(vec![record]).await?;
        sessions.pop().ok_or_else(|| session_not_found(session_id))
    }

    async fn list_sessions_by_user(&self, user_id: &str) -> PortResult<Vec<StudySession>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM study_sessions WHERE user_id = $1 ORDER BY updated_at DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.assemble(records).await
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE study_sessions SET status = $1, updated_at = $2 WHERE id = $3")
                .bind(status.as_str())
                .bind(updated_at)
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(session_not_found(session_id));
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let mut tx = self.begin().await?;
        for table in ["unit_progress", "quiz_attempts"] {
            sqlx::query(&format!("DELETE FROM {} WHERE session_id = $1", table))
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        let deleted = sqlx::query("DELETE FROM study_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(session_not_found(session_id));
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn add_unit(&self, session_id: Uuid, unit: &TrainingUnit) -> PortResult<()> {
        let mut tx = self.begin().await?;
        Self::touch_session(&mut tx, session_id).await?;
        insert_unit(&mut tx, session_id, unit).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn save_response(&self, session_id: Uuid, response: &UserResponse) -> PortResult<()> {
        let mut tx = self.begin().await?;
        Self::touch_session(&mut tx, session_id).await?;
        insert_response(&mut tx, session_id, response).await?;
        tx.commit().await.map_err(unexpected)
    }

    async fn get_progress(
        &self,
        session_id: Uuid,
        unit_id: Uuid,
    ) -> PortResult<Option<UnitProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT session_id, unit_id, viewed_sections, mastery_level, last_viewed_at \
             FROM unit_progress WHERE session_id = $1 AND unit_id = $2",
        )
        .bind(session_id)
        .bind(unit_id)
        .fetch_optional(&self.pool);
        let attempts = sqlx::query_as::<_, AttemptRecord>(
            "SELECT id, unit_id, question_id, user_answer, is_correct, attempted_at \
             FROM quiz_attempts WHERE session_id = $1 AND unit_id = $2 ORDER BY attempted_at ASC",
        )
        .bind(session_id)
        .bind(unit_id)
        .fetch_all(&self.pool);
        let (record, attempts) = futures::try_join!(record, attempts).map_err(unexpected)?;
        let attempts: Vec<QuizAttempt> = attempts.into_iter().map(|a| a.to_domain()).collect();

        match record {
            Some(record) => record.to_domain(attempts).map(Some),
            None if !attempts.is_empty() => Ok(Some(UnitProgress {
                attempts,
                ..UnitProgress::new(session_id, unit_id)
            })),
            None => Ok(None),
        }
    }

    async fn save_progress(&self, progress: &UnitProgress) -> PortResult<()> {
        let sections: Vec<String> = progress.viewed_sections.iter().cloned().collect();
        sqlx::query(
            "INSERT INTO unit_progress (session_id, unit_id, viewed_sections, mastery_level, last_viewed_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (session_id, unit_id) DO UPDATE SET \
             viewed_sections = EXCLUDED.viewed_sections, \
             mastery_level = EXCLUDED.mastery_level, \
             last_viewed_at = EXCLUDED.last_viewed_at",
        )
        .bind(progress.session_id)
        .bind(progress.unit_id)
        .bind(&sections[..])
        .bind(i16::from(progress.mastery_level.as_u8()))
        .bind(progress.last_viewed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_attempt(&self, session_id: Uuid, attempt: &QuizAttempt) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO quiz_attempts (id, session_id, unit_id, question_id, user_answer, is_correct, attempted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(attempt.id)
        .bind(session_id)
        .bind(attempt.unit_id)
        .bind(attempt.question_id)
        .bind(&attempt.user_answer)
        .bind(attempt.is_correct)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, || format!("Attempt {} already recorded", attempt.id)))?;
        Ok(())
    }

    async fn create_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO exegetical_insights ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            INSIGHT_COLUMNS
        ))
        .bind(insight.id)
        .bind(insight.session_id)
        .bind(insight.unit_id)
        .bind(&insight.user_id)
        .bind(&insight.passage)
        .bind(&insight.greek_word)
        .bind(&insight.title)
        .bind(&insight.question)
        .bind(&insight.content)
        .bind(&insight.tags[..])
        .bind(insight.created_at)
        .bind(insight.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, || format!("Insight {} already exists", insight.id)))?;
        Ok(())
    }

    async fn get_insight(&self, insight_id: Uuid) -> PortResult<ExegeticalInsight> {
        let record = sqlx::query_as::<_, InsightRecord>(&format!(
            "SELECT {} FROM exegetical_insights WHERE id = $1",
            INSIGHT_COLUMNS
        ))
        .bind(insight_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => insight_not_found(insight_id),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE exegetical_insights SET title = $1, question = $2, content = $3, tags = $4, \
             updated_at = $5 WHERE id = $6",
        )
        .bind(&insight.title)
        .bind(&insight.question)
        .bind(&insight.content)
        .bind(&insight.tags[..])
        .bind(insight.updated_at)
        .bind(insight.id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(insight_not_found(insight.id));
        }
        Ok(())
    }

    async fn delete_insight(&self, insight_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM exegetical_insights WHERE id = $1")
            .bind(insight_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(insight_not_found(insight_id));
        }
        Ok(())
    }

    async fn list_insights_by_user(&self, user_id: &str) -> PortResult<Vec<ExegeticalInsight>> {
        let records = sqlx::query_as::<_, InsightRecord>(&format!(
            "SELECT {} FROM exegetical_insights WHERE user_id = $1 ORDER BY created_at DESC",
            INSIGHT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `CacheStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CacheStore for DbAdapter {
    async fn get_cached_passage(&self, key: &str) -> PortResult<Option<Passage>> {
        let record = sqlx::query_as::<_, PassageRecord>(
            "SELECT reference, greek_text, versions FROM passage_cache WHERE cache_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn cache_passage(&self, key: &str, passage: &Passage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO passage_cache (cache_key, reference, greek_text, versions) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cache_key) DO UPDATE SET \
             reference = EXCLUDED.reference, greek_text = EXCLUDED.greek_text, versions = EXCLUDED.versions",
        )
        .bind(key)
        .bind(&passage.reference)
        .bind(&passage.greek_text)
        .bind(Json(&passage.versions))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_word_entry(&self, key: &str) -> PortResult<Option<WordCacheEntry>> {
        let record = sqlx::query_as::<_, WordRecord>(
            "SELECT lemma, language, gloss, grammatical_category, created_at, updated_at \
             FROM word_cache WHERE cache_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn set_word_entry(&self, key: &str, entry: &WordCacheEntry) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO word_cache (cache_key, lemma, language, gloss, grammatical_category, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (cache_key) DO UPDATE SET \
             gloss = EXCLUDED.gloss, grammatical_category = EXCLUDED.grammatical_category, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(&entry.lemma)
        .bind(&entry.language)
        .bind(&entry.gloss)
        .bind(&entry.grammatical_category)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
