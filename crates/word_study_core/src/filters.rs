//! crates/word_study_core/src/filters.rs
//!
//! In-memory filtering for session and insight listings, plus tag hygiene.

use crate::domain::{ExegeticalInsight, SessionStatus, StudySession};
use crate::error::{WordStudyError, WordStudyResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_TAGS: usize = 10;
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Trims, lower-cases and de-duplicates tags (first occurrence wins), then
/// keeps at most [`MAX_TAGS`].
pub fn sanitize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .take(MAX_TAGS)
        .collect()
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

//=========================================================================================
// Sessions
//=========================================================================================

/// Session listing filters. Date bounds apply to `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilters {
    pub status: Option<SessionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Only sessions created within the last N days.
    pub last_days: Option<i64>,
    pub passage: Option<String>,
}

impl SessionFilters {
    pub fn validate(&self) -> WordStudyResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(WordStudyError::validation(
                    "date range start must not be after its end",
                ));
            }
        }
        if let Some(days) = self.last_days {
            if days <= 0 || days > MAX_LOOKBACK_DAYS {
                return Err(WordStudyError::validation(format!(
                    "day count must be between 1 and {}, got {}",
                    MAX_LOOKBACK_DAYS, days
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, session: &StudySession, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|status| session.status != status) {
            return false;
        }
        if self.from.is_some_and(|from| session.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| session.created_at > to) {
            return false;
        }
        if let Some(days) = self.last_days {
            if session.created_at < now - Duration::days(days) {
                return false;
            }
        }
        match non_blank(&self.passage) {
            Some(passage) => contains_folded(&session.passage, passage),
            None => true,
        }
    }

    /// Keeps matching sessions, most recently updated first.
    pub fn apply(&self, sessions: Vec<StudySession>, now: DateTime<Utc>) -> Vec<StudySession> {
        let mut kept: Vec<StudySession> = sessions
            .into_iter()
            .filter(|s| self.matches(s, now))
            .collect();
        kept.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        kept
    }
}

//=========================================================================================
// Insights
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightFilters {
    pub passage: Option<String>,
    pub greek_word: Option<String>,
    /// Matched against title, content and question.
    pub search: Option<String>,
    /// Matches insights sharing at least one tag.
    pub tags: Vec<String>,
}

impl InsightFilters {
    pub fn matches(&self, insight: &ExegeticalInsight) -> bool {
        if let Some(passage) = non_blank(&self.passage) {
            if !contains_folded(&insight.passage, passage) {
                return false;
            }
        }
        if let Some(word) = non_blank(&self.greek_word) {
            if !contains_folded(&insight.greek_word, word) {
                return false;
            }
        }
        if let Some(text) = non_blank(&self.search) {
            let in_question = insight
                .question
                .as_deref()
                .is_some_and(|q| contains_folded(q, text));
            if !contains_folded(&insight.title, text)
                && !contains_folded(&insight.content, text)
                && !in_question
            {
                return false;
            }
        }
        let wanted = sanitize_tags(&self.tags);
        if !wanted.is_empty() && !insight.tags.iter().any(|t| wanted.contains(t)) {
            return false;
        }
        true
    }

    pub fn apply(&self, insights: Vec<ExegeticalInsight>) -> Vec<ExegeticalInsight> {
        insights.into_iter().filter(|i| self.matches(i)).collect()
    }
}
