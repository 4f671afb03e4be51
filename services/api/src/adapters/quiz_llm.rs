//! services/api/src/adapters/quiz_llm.rs
//!
//! The `QuizService` adapter. Questions are banked per (lemma, language) in
//! PostgreSQL; a request is served from the bank first and only the shortfall
//! is generated, then banked for the next learner.

use crate::adapters::llm::ChatModel;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use word_study_core::domain::{QuizQuestion, QuizType, TrainingUnit};
use word_study_core::ports::{PortError, PortResult, QuizService};

const QUIZ_INSTRUCTIONS: &str = r#"You write short quiz questions that check a student's grasp of one Greek word in context: its parsing, its function in the sentence, and its meaning. Mix multiple-choice, true-false and fill-blank questions. For multiple-choice, the correct answer must be one of the options, written exactly the same way. For true-false, the answer is "true" or "false".

Reply with JSON only:
{"questions": [{"type": "multiple-choice|true-false|fill-blank", "prompt": "...", "options": ["..."], "correct_answer": "...", "explanation": "..."}]}"#;

#[derive(Deserialize)]
struct QuizReply {
    questions: Vec<QuestionReply>,
}

#[derive(Deserialize)]
struct QuestionReply {
    #[serde(rename = "type", alias = "question_type")]
    question_type: String,
    prompt: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}
impl QuestionReply {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            question_type: QuizType::parse(&self.question_type),
            prompt: self.prompt,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
    }
}

#[derive(FromRow)]
struct BankRecord {
    id: Uuid,
    question_type: String,
    prompt: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: String,
}
impl BankRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id,
            question_type: QuizType::parse(&self.question_type),
            prompt: self.prompt,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct HybridQuizAdapter {
    pool: PgPool,
    model: ChatModel,
}

impl HybridQuizAdapter {
    pub fn new(pool: PgPool, model: ChatModel) -> Self {
        Self { pool, model }
    }

    async fn banked(&self, lemma: &str, language: &str, limit: usize) -> Vec<QuizQuestion> {
        let rows = sqlx::query_as::<_, BankRecord>(
            "SELECT id, question_type, prompt, options, correct_answer, explanation \
             FROM quiz_bank WHERE lemma = $1 AND language = $2 ORDER BY random() LIMIT $3",
        )
        .bind(lemma)
        .bind(language)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;
        match rows {
            Ok(rows) => rows.into_iter().map(|r| r.to_domain()).collect(),
            Err(e) => {
                warn!(lemma, error = %e, "quiz bank read failed, generating everything");
                Vec::new()
            }
        }
    }

    async fn bank(&self, lemma: &str, language: &str, questions: &[QuizQuestion]) {
        for question in questions {
            let stored = sqlx::query(
                "INSERT INTO quiz_bank (id, lemma, language, question_type, prompt, options, correct_answer, explanation) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(question.id)
            .bind(lemma)
            .bind(language)
            .bind(question.question_type.as_str())
            .bind(&question.prompt)
            .bind(&question.options[..])
            .bind(&question.correct_answer)
            .bind(&question.explanation)
            .execute(&self.pool)
            .await;
            if let Err(e) = stored {
                warn!(lemma, question_id = %question.id, error = %e, "question not banked");
            }
        }
    }

    async fn generate(
        &self,
        unit: &TrainingUnit,
        count: usize,
        language: &str,
    ) -> PortResult<Vec<QuizQuestion>> {
        let system = format!(
            "{}\n\nWrite prompts, options and explanations in {}. Greek stays in Greek.",
            QUIZ_INSTRUCTIONS, language
        );
        let user = format!(
            "Write {} question(s).\n\nWORD: {} ({})\nGLOSS: {}\nIDENTIFICATION: {}\nFUNCTION IN CONTEXT: {}",
            count,
            unit.greek_form.surface,
            unit.greek_form.lemma,
            unit.greek_form.gloss,
            unit.identification,
            unit.function_in_context
        );
        let reply: QuizReply = self.model.complete_json(&system, &user, None).await?;
        Ok(reply
            .questions
            .into_iter()
            .filter(|q| !q.prompt.trim().is_empty() && !q.correct_answer.trim().is_empty())
            .map(QuestionReply::to_domain)
            .collect())
    }
}

//=========================================================================================
// `QuizService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizService for HybridQuizAdapter {
    async fn generate_quiz_questions(
        &self,
        unit: &TrainingUnit,
        count: usize,
        _store_id: Option<&str>,
        language: &str,
    ) -> PortResult<Vec<QuizQuestion>> {
        let lemma = unit.greek_form.lemma.trim();
        let language = language.trim().to_lowercase();
        let mut questions = self.banked(lemma, &language, count).await;
        let shortfall = count.saturating_sub(questions.len());
        info!(
            lemma,
            banked = questions.len(),
            shortfall,
            "serving quiz questions"
        );
        if shortfall == 0 {
            return Ok(questions);
        }

        let fresh = match self.generate(unit, shortfall, &language).await {
            Ok(fresh) => fresh,
            // Serve the banked questions alone.
            Err(e) if !questions.is_empty() => {
                warn!(lemma, error = %e, "quiz generation failed, serving banked questions only");
                return Ok(questions);
            }
            Err(e) => return Err(e),
        };
        if fresh.is_empty() && questions.is_empty() {
            return Err(PortError::Unexpected(format!(
                "No quiz questions could be produced for {}",
                lemma
            )));
        }
        self.bank(lemma, &language, &fresh).await;
        questions.extend(fresh);
        Ok(questions)
    }
}
