//! Fakes shared by the scenario tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use word_study_core::{
    CacheStore, ExegeticalInsight, GenerationConfig, GenerationGateway, GreekForm,
    InMemoryStore, MorphologyBreakdown, Passage, PassageVersion, PortError, PortResult,
    QuizAttempt, QuizQuestion, QuizService, QuizType, ResponseEvaluation, SessionStatus,
    StudySession, StudyStore, TrainingUnit, UnitPreview, UnitProgress, UserResponse,
    WordCacheEntry, WordStudyService,
};

pub fn greek_form(surface: &str) -> GreekForm {
    GreekForm {
        lemma: format!("{}-lemma", surface),
        surface: surface.to_string(),
        transliteration: format!("{}-translit", surface),
        gloss: format!("gloss of {}", surface),
    }
}

pub fn unit_for(form: &str) -> TrainingUnit {
    TrainingUnit {
        id: Uuid::new_v4(),
        session_id: None,
        greek_form: greek_form(form),
        identification: "verbo, presente".to_string(),
        function_in_context: "verbo principal".to_string(),
        significance: "introduce la exhortación".to_string(),
    }
}

//=========================================================================================
// Gateway
//=========================================================================================

#[derive(Default)]
pub struct FakeGateway {
    pub forms: Vec<String>,
    pub failing_form: Option<String>,
    pub fail_passages: bool,
    pub passage_delay: Duration,
    pub blank_gloss: bool,
    pub passage_calls: AtomicUsize,
    pub unit_calls: AtomicUsize,
    pub last_guidance: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn with_forms(forms: &[&str]) -> Self {
        Self {
            forms: forms.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn passage_calls(&self) -> usize {
        self.passage_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationGateway for FakeGateway {
    async fn identify_forms(
        &self,
        _passage: &str,
        _store_id: Option<&str>,
        _config: Option<&GenerationConfig>,
        _language: &str,
    ) -> PortResult<Vec<String>> {
        Ok(self.forms.clone())
    }

    async fn create_training_unit(
        &self,
        form: &str,
        _passage: &str,
        _store_id: Option<&str>,
        _config: Option<&GenerationConfig>,
        _language: &str,
    ) -> PortResult<TrainingUnit> {
        self.unit_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_form.as_deref() == Some(form) {
            return Err(PortError::Unexpected(format!("model refused {}", form)));
        }
        Ok(unit_for(form))
    }

    async fn identify_word_for_unit(
        &self,
        word: &str,
        _context: &str,
        _store_id: Option<&str>,
        _language: &str,
    ) -> PortResult<UnitPreview> {
        let mut form = greek_form(word);
        if self.blank_gloss {
            form.gloss.clear();
        }
        Ok(UnitPreview {
            greek_form: form,
            identification: "sustantivo".to_string(),
        })
    }

    async fn explain_morphology(
        &self,
        word: &str,
        _passage: &str,
        _store_id: Option<&str>,
        _language: &str,
    ) -> PortResult<MorphologyBreakdown> {
        Ok(MorphologyBreakdown {
            word: word.to_string(),
            lemma: format!("{}-lemma", word),
            part_of_speech: "verb".to_string(),
            tense: Some("present".to_string()),
            ..Default::default()
        })
    }

    async fn evaluate_response(
        &self,
        _unit: &TrainingUnit,
        answer: &str,
        _store_id: Option<&str>,
        _language: &str,
    ) -> PortResult<ResponseEvaluation> {
        Ok(ResponseEvaluation {
            feedback: format!("feedback on {}", answer),
            is_correct: answer.contains("ruego"),
        })
    }

    async fn answer_free_question(
        &self,
        question: &str,
        _context: &str,
        style_guidance: &str,
        _store_id: Option<&str>,
        _language: &str,
    ) -> PortResult<String> {
        if let Ok(mut last) = self.last_guidance.lock() {
            *last = Some(style_guidance.to_string());
        }
        Ok(format!("answer to {}", question))
    }

    async fn get_passage_text(
        &self,
        reference: &str,
        _store_id: Option<&str>,
        language: &str,
    ) -> PortResult<Passage> {
        self.passage_calls.fetch_add(1, Ordering::SeqCst);
        if !self.passage_delay.is_zero() {
            tokio::time::sleep(self.passage_delay).await;
        }
        if self.fail_passages {
            return Err(PortError::Unexpected("upstream timeout".to_string()));
        }
        Ok(Passage {
            reference: reference.to_string(),
            greek_text: "Παρακαλῶ οὖν ὑμᾶς, ἀδελφοί".to_string(),
            versions: vec![PassageVersion {
                version: format!("RVR1960 ({})", language),
                text: "Así que, hermanos, os ruego".to_string(),
            }],
        })
    }
}

//=========================================================================================
// Quiz service
//=========================================================================================

pub struct FakeQuizzes;

#[async_trait]
impl QuizService for FakeQuizzes {
    async fn generate_quiz_questions(
        &self,
        unit: &TrainingUnit,
        count: usize,
        _store_id: Option<&str>,
        _language: &str,
    ) -> PortResult<Vec<QuizQuestion>> {
        // One more than asked, to check the service trims.
        Ok((0..=count)
            .map(|i| QuizQuestion {
                id: Uuid::new_v4(),
                question_type: QuizType::MultipleChoice,
                prompt: format!("Q{} about {}", i, unit.greek_form.lemma),
                options: vec!["a".to_string(), "b".to_string()],
                correct_answer: "a".to_string(),
                explanation: "because".to_string(),
            })
            .collect())
    }
}

//=========================================================================================
// Store with switchable failures
//=========================================================================================

#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_create_session: Arc<AtomicBool>,
    pub fail_progress: Arc<AtomicBool>,
    pub fail_cache_reads: Arc<AtomicBool>,
    pub fail_cache_writes: Arc<AtomicBool>,
    /// Passage reads see the store as it was, then stall this long.
    pub slow_cache_reads: Arc<AtomicBool>,
}

pub const SLOW_READ: Duration = Duration::from_millis(100);

fn injected(flag: &AtomicBool, what: &str) -> PortResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(PortError::Unexpected(format!("injected {} failure", what)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl StudyStore for FlakyStore {
    async fn create_session(&self, session: &StudySession) -> PortResult<()> {
        injected(&self.fail_create_session, "create_session")?;
        self.inner.create_session(session).await
    }
    async fn get_session(&self, session_id: Uuid) -> PortResult<StudySession> {
        self.inner.get_session(session_id).await
    }
    async fn list_sessions_by_user(&self, user_id: &str) -> PortResult<Vec<StudySession>> {
        self.inner.list_sessions_by_user(user_id).await
    }
    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .update_session_status(session_id, status, updated_at)
            .await
    }
    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        self.inner.delete_session(session_id).await
    }
    async fn add_unit(&self, session_id: Uuid, unit: &TrainingUnit) -> PortResult<()> {
        self.inner.add_unit(session_id, unit).await
    }
    async fn save_response(&self, session_id: Uuid, response: &UserResponse) -> PortResult<()> {
        self.inner.save_response(session_id, response).await
    }
    async fn get_progress(
        &self,
        session_id: Uuid,
        unit_id: Uuid,
    ) -> PortResult<Option<UnitProgress>> {
        self.inner.get_progress(session_id, unit_id).await
    }
    async fn save_progress(&self, progress: &UnitProgress) -> PortResult<()> {
        injected(&self.fail_progress, "save_progress")?;
        self.inner.save_progress(progress).await
    }
    async fn save_attempt(&self, session_id: Uuid, attempt: &QuizAttempt) -> PortResult<()> {
        injected(&self.fail_progress, "save_attempt")?;
        self.inner.save_attempt(session_id, attempt).await
    }
    async fn create_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        self.inner.create_insight(insight).await
    }
    async fn get_insight(&self, insight_id: Uuid) -> PortResult<ExegeticalInsight> {
        self.inner.get_insight(insight_id).await
    }
    async fn update_insight(&self, insight: &ExegeticalInsight) -> PortResult<()> {
        self.inner.update_insight(insight).await
    }
    async fn delete_insight(&self, insight_id: Uuid) -> PortResult<()> {
        self.inner.delete_insight(insight_id).await
    }
    async fn list_insights_by_user(&self, user_id: &str) -> PortResult<Vec<ExegeticalInsight>> {
        self.inner.list_insights_by_user(user_id).await
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get_cached_passage(&self, key: &str) -> PortResult<Option<Passage>> {
        injected(&self.fail_cache_reads, "passage read")?;
        let found = self.inner.get_cached_passage(key).await;
        if self.slow_cache_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(SLOW_READ).await;
        }
        found
    }
    async fn cache_passage(&self, key: &str, passage: &Passage) -> PortResult<()> {
        injected(&self.fail_cache_writes, "passage write")?;
        self.inner.cache_passage(key, passage).await
    }
    async fn get_word_entry(&self, key: &str) -> PortResult<Option<WordCacheEntry>> {
        injected(&self.fail_cache_reads, "word read")?;
        self.inner.get_word_entry(key).await
    }
    async fn set_word_entry(&self, key: &str, entry: &WordCacheEntry) -> PortResult<()> {
        injected(&self.fail_cache_writes, "word write")?;
        self.inner.set_word_entry(key, entry).await
    }
}

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub store: FlakyStore,
    pub service: WordStudyService,
}

pub fn harness(gateway: FakeGateway) -> Harness {
    let gateway = Arc::new(gateway);
    let store = FlakyStore::default();
    let service = WordStudyService::new(
        gateway.clone(),
        Arc::new(FakeQuizzes),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );
    Harness {
        gateway,
        store,
        service,
    }
}
