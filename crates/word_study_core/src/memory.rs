//! crates/word_study_core/src/memory.rs
//!
//! An in-process implementation of the `StudyStore` and `CacheStore` ports.
//! Mirrors the database adapter's semantics (sub-collections, append-only
//! attempts, overwrite-only caches) without any I/O.

use crate::domain::{
    ExegeticalInsight, Passage, QuizAttempt, SessionStatus, StudySession, TrainingUnit,
    UnitProgress, UserResponse, WordCacheEntry,
};
use crate::ports::{CacheStore, PortError, PortResult, StudyStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, StudySession>,
    progress: HashMap<(Uuid, Uuid), UnitProgress>,
    attempts: HashMap<(Uuid, Uuid), Vec<QuizAttempt>>,
    insights: HashMap<Uuid, ExegeticalInsight>,
    passages: HashMap<String, Passage>,
    words: HashMap<String, WordCacheEntry>,
}

/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn cached_passage_count(&self) -> usize {
        self.tables.read().await.passages.len()
    }
}

fn session_not_found(session_id: Uuid) -> PortError {
    PortError::NotFound(format!("Session {} not found", session_id))
}

#[async_trait]
impl StudyStore for InMemoryStore {
    async fn create_session(&self, session: &StudySession) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(PortError::Conflict(format!(
                "Session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<StudySession> {
        self.tables
            .read()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| session_not_found(session_id))
    }

    async fn list_sessions_by_user(&self, user_id: &str) -> PortResult<Vec<StudySession>> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        session.status = status;
        session.updated_at = updated_at;
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .remove(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        tables.progress.retain(|(sid, _), _| *sid != session_id);
        tables.attempts.retain(|(sid, _), _| *sid != session_id);
        Ok(())
    }

    async fn add_unit(&self, session_id: Uuid, unit: &TrainingUnit) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        session.units.push(unit.clone());
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn save_response(&self, session_id: Uuid, response: &UserResponse) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        session.responses.insert(response.id, response.clone());
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn get_progress(
        &self,
        session_id: Uuid,
        unit_id: Uuid,
    ) -> PortResult<Option<UnitProgress>> {
        let tables = self.tables.read().await;
        let key = (session_id, unit_id);
        let attempts = tables.attempts.get(&key).cloned().unwrap_or_default();
        let progress = match tables.progress.get(&key) {
            Some(stored) => Some(UnitProgress {
                attempts,
                ..stored.clone()
            }),
            None if !attempts.is_empty() => Some(UnitProgress {
                attempts,
                ..UnitProgress::new(session_id, unit_id)
            }),
            None => None,
        };
        Ok(progress)
    }

    async fn save_progress(&self, progress: &UnitProgress) -> PortResult<()> {
        let mut stored = progress.clone();
        // The attempt log lives in its own table.
        stored.attempts.clear();
        self.tables
            .write()
            .await
            .progress
            .insert((progress.session_id, progress.unit_id), stored);
        Ok(())
    }

    async fn save_attempt(&self, session_id: Uuid, attempt: &QuizAttempt) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let log = tables
            .attempts
            .entry((session_id, attempt.unit_id))
            .or_default();
        if log.iter().any(|a| a.id == attempt.id) {
            return Err(PortError::Conflict(format!(
                "Attempt {} already recorded",
                attempt.id
            )));
        }
        log.push(attempt.clone());
        Ok(())
    }

    async fn create_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        self.tables
            .write()
            .await
            .insights
            .insert(insight.id, insight.clone());
        Ok(())
    }

    async fn get_insight(&self, insight_id: Uuid) -> PortResult<ExegeticalInsight> {
        self.tables
            .read()
            .await
            .insights
            .get(&insight_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Insight {} not found", insight_id)))
    }

    async fn update_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        match tables.insights.get_mut(&insight.id) {
            Some(existing) => {
                *existing = insight.clone();
                Ok(())
            }
            None => Err(PortError::NotFound(format!(
                "Insight {} not found",
                insight.id
            ))),
        }
    }

    async fn delete_insight(&self, insight_id: Uuid) -> PortResult<()> {
        self.tables
            .write()
            .await
            .insights
            .remove(&insight_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Insight {} not found", insight_id)))
    }

    async fn list_insights_by_user(&self, user_id: &str) -> PortResult<Vec<ExegeticalInsight>> {
        let mut insights: Vec<_> = self
            .tables
            .read()
            .await
            .insights
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        insights.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(insights)
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get_cached_passage(&self, key: &str) -> PortResult<Option<Passage>> {
        Ok(self.tables.read().await.passages.get(key).cloned())
    }

    async fn cache_passage(&self, key: &str, passage: &Passage) -> PortResult<()> {
        self.tables
            .write()
            .await
            .passages
            .insert(key.to_string(), passage.clone());
        Ok(())
    }

    async fn get_word_entry(&self, key: &str) -> PortResult<Option<WordCacheEntry>> {
        Ok(self.tables.read().await.words.get(key).cloned())
    }

    async fn set_word_entry(&self, key: &str, entry: &WordCacheEntry) -> PortResult<()> {
        self.tables
            .write()
            .await
            .words
            .insert(key.to_string(), entry.clone());
        Ok(())
    }
}
