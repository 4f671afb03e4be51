//! crates/word_study_core/src/cache.rs
//!
//! The global content caches: passages by reference and lexical entries by
//! lemma + language. Both sit in front of the generation gateway and are
//! shared by every user.
//!
//! Cache failures never surface as errors. A failed read is a miss and a
//! failed write is reported as `WriteOutcome::Failed`; both are logged.
//! Concurrent passage misses for the same key are collapsed into one upstream
//! call and one cache write through [`SingleFlight`].

use crate::domain::{Passage, WordCacheEntry};
use crate::ports::{CacheStore, PortResult};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Whether a best-effort write actually landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Written,
    Failed,
}

impl WriteOutcome {
    pub fn is_written(self) -> bool {
        self == WriteOutcome::Written
    }
}

/// How a cache-first lookup obtained its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from the cache; no generation happened.
    Hit,
    /// This caller drove the generation. Carries the outcome of the cache write.
    Generated(WriteOutcome),
    /// Another caller was already generating this key; its result was reused.
    Joined,
}

//=========================================================================================
// Single-flight
//=========================================================================================

type Flight<V> = Shared<BoxFuture<'static, PortResult<V>>>;

/// At most one in-flight computation per key. Late arrivals await the
/// running computation instead of starting their own.
pub struct SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    inflight: Mutex<HashMap<String, Flight<V>>>,
}

impl<V> Default for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `start` for `key` unless a computation for it is already running.
    /// Returns the shared result and whether this caller started it.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> (PortResult<V>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<V>> + Send + 'static,
    {
        let (flight, leader) = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(running) => (running.clone(), false),
                None => {
                    let flight = start().boxed().shared();
                    inflight.insert(key.to_string(), flight.clone());
                    (flight, true)
                }
            }
        };

        let result = flight.clone().await;

        // Whoever finishes first clears the slot, so a dropped leader cannot
        // leave a stale flight behind.
        let mut inflight = self.inflight.lock().await;
        if inflight.get(key).is_some_and(|f| f.ptr_eq(&flight)) {
            inflight.remove(key);
        }
        (result, leader)
    }

    /// Number of keys currently being computed.
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

//=========================================================================================
// Passage Cache
//=========================================================================================

/// Normalizes a scripture reference for use as a cache key: trimmed, inner
/// whitespace collapsed to single spaces.
pub fn normalize_reference(reference: &str) -> String {
    reference.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reference → multi-version passage bundle.
pub struct PassageCache {
    store: Arc<dyn CacheStore>,
    flights: SingleFlight<(Passage, Option<WriteOutcome>)>,
}

impl PassageCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            flights: SingleFlight::new(),
        }
    }

    pub async fn get(&self, reference: &str) -> Option<Passage> {
        read_passage(self.store.as_ref(), &normalize_reference(reference)).await
    }

    pub async fn set(&self, reference: &str, passage: &Passage) -> WriteOutcome {
        write_passage(self.store.as_ref(), &normalize_reference(reference), passage).await
    }

    /// Cache-first lookup. On a miss `generate` is run at most once per key
    /// across all concurrent callers, and its value is written back before
    /// any caller returns.
    pub async fn get_or_generate<F, Fut>(
        &self,
        reference: &str,
        generate: F,
    ) -> PortResult<(Passage, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<Passage>> + Send + 'static,
    {
        let key = normalize_reference(reference);
        if let Some(passage) = read_passage(self.store.as_ref(), &key).await {
            debug!(reference = %key, "passage cache hit");
            return Ok((passage, CacheStatus::Hit));
        }

        let store = self.store.clone();
        let flight_key = key.clone();
        let (result, leader) = self
            .flights
            .run(&key, move || {
                // Not polled unless the second read misses.
                let generation = generate();
                async move {
                    // An earlier flight may have landed since the first read.
                    if let Some(passage) = read_passage(store.as_ref(), &flight_key).await {
                        return Ok((passage, None));
                    }
                    let passage = generation.await?;
                    let write = write_passage(store.as_ref(), &flight_key, &passage).await;
                    Ok((passage, Some(write)))
                }
            })
            .await;

        let (passage, write) = result?;
        let status = match (leader, write) {
            (false, _) => CacheStatus::Joined,
            (true, None) => CacheStatus::Hit,
            (true, Some(write)) => CacheStatus::Generated(write),
        };
        debug!(reference = %key, ?status, "passage served after miss");
        Ok((passage, status))
    }
}

async fn read_passage(store: &dyn CacheStore, key: &str) -> Option<Passage> {
    match store.get_cached_passage(key).await {
        Ok(found) => found,
        Err(e) => {
            warn!(reference = %key, error = %e, "passage cache read failed, treating as miss");
            None
        }
    }
}

async fn write_passage(store: &dyn CacheStore, key: &str, passage: &Passage) -> WriteOutcome {
    match store.cache_passage(key, passage).await {
        Ok(()) => WriteOutcome::Written,
        Err(e) => {
            warn!(reference = %key, error = %e, "passage cache write failed");
            WriteOutcome::Failed
        }
    }
}

//=========================================================================================
// Lexical Cache
//=========================================================================================

/// Composes the single string key for a lemma in an output language.
/// Lemma text is trimmed; the language is trimmed and case-folded.
pub fn lexical_key(lemma: &str, language: &str) -> String {
    format!("{}::{}", lemma.trim(), language.trim().to_lowercase())
}

/// (lemma, language) → gloss and grammatical category.
///
/// Entries are by-products of identification and unit generation, so there is
/// no lexical generation of its own to collapse; writes are last-write-wins.
pub struct LexicalCache {
    store: Arc<dyn CacheStore>,
}

impl LexicalCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, lemma: &str, language: &str) -> Option<WordCacheEntry> {
        read_entry(self.store.as_ref(), &lexical_key(lemma, language)).await
    }

    /// Overwrites whatever is stored for the entry's (lemma, language).
    pub async fn set(&self, entry: &WordCacheEntry) -> WriteOutcome {
        let key = lexical_key(&entry.lemma, &entry.language);
        write_entry(self.store.as_ref(), &key, entry).await
    }

    /// Stores a gloss, keeping the original `created_at` if the key was
    /// already cached.
    pub async fn remember(
        &self,
        lemma: &str,
        language: &str,
        gloss: &str,
        grammatical_category: &str,
    ) -> WriteOutcome {
        let lemma = lemma.trim();
        if lemma.is_empty() {
            return WriteOutcome::Failed;
        }
        let now = Utc::now();
        let created_at = self
            .get(lemma, language)
            .await
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let entry = WordCacheEntry {
            lemma: lemma.to_string(),
            language: language.trim().to_string(),
            gloss: gloss.trim().to_string(),
            grammatical_category: grammatical_category.trim().to_string(),
            created_at,
            updated_at: now,
        };
        self.set(&entry).await
    }
}

async fn read_entry(store: &dyn CacheStore, key: &str) -> Option<WordCacheEntry> {
    match store.get_word_entry(key).await {
        Ok(found) => found,
        Err(e) => {
            warn!(key = %key, error = %e, "word cache read failed, treating as miss");
            None
        }
    }
}

async fn write_entry(store: &dyn CacheStore, key: &str, entry: &WordCacheEntry) -> WriteOutcome {
    match store.set_word_entry(key, entry).await {
        Ok(()) => WriteOutcome::Written,
        Err(e) => {
            warn!(key = %key, error = %e, "word cache write failed");
            WriteOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn references_collapse_whitespace() {
        assert_eq!(normalize_reference("  Romanos   12:1-2 "), "Romanos 12:1-2");
    }

    #[test]
    fn lexical_keys_trim_lemma_and_fold_language() {
        assert_eq!(lexical_key(" λόγος ", "Spanish"), lexical_key("λόγος", " spanish"));
        assert_ne!(lexical_key("λόγος", "Spanish"), lexical_key("λόγος", "English"));
    }

    #[tokio::test]
    async fn single_flight_runs_once_for_concurrent_callers() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = flights.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run("logos", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let (result, leader) = handle.await.unwrap();
            assert_eq!(result.unwrap(), 7);
            if leader {
                leaders += 1;
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert_eq!(flights.in_flight().await, 0);
    }

    #[tokio::test]
    async fn single_flight_shares_errors_and_allows_retry() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let (first, _) = flights
            .run("k", || async { Err(PortError::Unexpected("boom".into())) })
            .await;
        assert!(first.is_err());

        let (second, leader) = flights.run("k", || async { Ok(1) }).await;
        assert_eq!(second.unwrap(), 1);
        assert!(leader);
    }
}
