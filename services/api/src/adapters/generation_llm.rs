//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for all generated study content. It
//! implements the `GenerationGateway` port from the core crate on top of an
//! OpenAI-compatible chat model that answers in JSON.

use crate::adapters::llm::ChatModel;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;
use word_study_core::domain::{
    GenerationConfig, GreekForm, MorphologyBreakdown, Passage, PassageVersion,
    ResponseEvaluation, TrainingUnit, UnitPreview,
};
use word_study_core::ports::{GenerationGateway, PortError, PortResult};

const TUTOR_ROLE: &str = "You are a Koine Greek tutor helping pastors and Bible students study \
the Greek New Testament word by word. You are precise about morphology and careful to ground \
every claim in the passage at hand.";

const FORMS_INSTRUCTIONS: &str = r#"List the Greek words in the passage that are most worth studying: key verbs, theologically loaded nouns, and forms whose grammar changes the meaning. Skip articles and common particles unless they carry weight.

Reply with JSON only:
{"forms": ["<surface form exactly as it appears>", ...]}"#;

const UNIT_INSTRUCTIONS: &str = r#"Build a training unit for the given Greek form as it is used in the passage.

Reply with JSON only:
{
  "lemma": "<dictionary form>",
  "surface": "<form as in the passage>",
  "transliteration": "<latin transliteration>",
  "gloss": "<short translation>",
  "identification": "<full parsing: part of speech, tense, voice, mood, case, number, gender, person as applicable>",
  "function_in_context": "<what the form does in this sentence>",
  "significance": "<why it matters for interpreting the passage>"
}"#;

const PREVIEW_INSTRUCTIONS: &str = r#"Identify the selected Greek word in its context.

Reply with JSON only:
{
  "lemma": "<dictionary form>",
  "surface": "<form as selected>",
  "transliteration": "<latin transliteration>",
  "gloss": "<short translation, or empty if unsure>",
  "identification": "<part of speech and parsing>"
}"#;

const MORPHOLOGY_INSTRUCTIONS: &str = r#"Give the full morphological parse of the Greek word as used in the passage. Use null for categories that do not apply to its part of speech.

Reply with JSON only:
{
  "word": "<form>",
  "lemma": "<dictionary form>",
  "part_of_speech": "<noun, verb, participle, ...>",
  "tense": null, "voice": null, "mood": null,
  "case": null, "number": null, "gender": null, "person": null,
  "explanation": "<how the parse shapes the meaning here>"
}"#;

const EVALUATION_INSTRUCTIONS: &str = r#"Grade the student's answer about the training unit. Be encouraging but honest; point to the specific part of the parse or function they missed.

Reply with JSON only:
{"feedback": "<feedback for the student>", "is_correct": true|false}"#;

const PASSAGE_INSTRUCTIONS: &str = r#"Give the text of the requested scripture reference: the Greek text (NA28/UBS5 tradition) and the passage in common versions of the output language.

Reply with JSON only:
{
  "greek_text": "<Greek text>",
  "versions": [{"version": "<version name>", "text": "<text>"}, ...]
}"#;

const FREE_QUESTION_INSTRUCTIONS: &str = "Answer the student's question about the Greek text. \
Stay grounded in the passage and the word under study when they are given.";

//=========================================================================================
// LLM Reply Records
//=========================================================================================

#[derive(Deserialize)]
struct FormsReply {
    forms: Vec<String>,
}

#[derive(Deserialize)]
struct UnitReply {
    lemma: String,
    surface: String,
    #[serde(default)]
    transliteration: String,
    #[serde(default)]
    gloss: String,
    identification: String,
    function_in_context: String,
    significance: String,
}
impl UnitReply {
    fn to_domain(self) -> TrainingUnit {
        TrainingUnit {
            id: Uuid::new_v4(),
            session_id: None,
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

#[derive(Deserialize)]
struct PreviewReply {
    lemma: String,
    surface: String,
    #[serde(default)]
    transliteration: String,
    #[serde(default)]
    gloss: String,
    identification: String,
}
impl PreviewReply {
    fn to_domain(self) -> UnitPreview {
        UnitPreview {
            greek_form: GreekForm {
                lemma: self.lemma,
                surface: self.surface,
                transliteration: self.transliteration,
                gloss: self.gloss,
            },
            identification: self.identification,
        }
    }
}

#[derive(Deserialize)]
struct MorphologyReply {
    #[serde(default)]
    word: String,
    #[serde(default)]
    lemma: String,
    #[serde(default)]
    part_of_speech: String,
    tense: Option<String>,
    voice: Option<String>,
    mood: Option<String>,
    case: Option<String>,
    number: Option<String>,
    gender: Option<String>,
    person: Option<String>,
    #[serde(default)]
    explanation: String,
}
impl MorphologyReply {
    /// `requested` stands in for a word the model left out.
    fn to_domain(self, requested: &str) -> MorphologyBreakdown {
        let word = if self.word.trim().is_empty() {
            requested.to_string()
        } else {
            self.word
        };
        MorphologyBreakdown {
            word,
            lemma: self.lemma,
            part_of_speech: self.part_of_speech,
            tense: self.tense,
            voice: self.voice,
            mood: self.mood,
            case: self.case,
            number: self.number,
            gender: self.gender,
            person: self.person,
            explanation: self.explanation,
        }
    }
}

#[derive(Deserialize)]
struct PassageReply {
    greek_text: String,
    #[serde(default)]
    versions: Vec<PassageVersion>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationGateway` using an OpenAI-compatible LLM.
///
/// `store_id` names an external retrieval index. Plain chat completions cannot
/// search it, so it is only logged.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    model: ChatModel,
}

impl OpenAiGenerationAdapter {
    pub fn new(model: ChatModel) -> Self {
        Self { model }
    }

    fn system_prompt(instructions: &str, language: &str) -> String {
        format!(
            "{}\n\nWrite every explanation, gloss and translation in {}. Greek stays in Greek.\n\n{}",
            TUTOR_ROLE, language, instructions
        )
    }
}

fn unit_summary(unit: &TrainingUnit) -> String {
    format!(
        "WORD: {} ({})\nIDENTIFICATION: {}\nFUNCTION IN CONTEXT: {}\nSIGNIFICANCE: {}",
        unit.greek_form.surface,
        unit.greek_form.lemma,
        unit.identification,
        unit.function_in_context,
        unit.significance
    )
}

//=========================================================================================
// `GenerationGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationGateway for OpenAiGenerationAdapter {
    async fn identify_forms(
        &self,
        passage: &str,
        store_id: Option<&str>,
        config: Option<&GenerationConfig>,
        language: &str,
    ) -> PortResult<Vec<String>> {
        debug!(?store_id, "identifying forms");
        let reply: FormsReply = self
            .model
            .complete_json(
                &Self::system_prompt(FORMS_INSTRUCTIONS, language),
                &format!("PASSAGE:\n{}", passage),
                config,
            )
            .await?;
        Ok(reply.forms)
    }

    async fn create_training_unit(
        &self,
        form: &str,
        passage: &str,
        store_id: Option<&str>,
        config: Option<&GenerationConfig>,
        language: &str,
    ) -> PortResult<TrainingUnit> {
        debug!(form, ?store_id, "creating training unit");
        let reply: UnitReply = self
            .model
            .complete_json(
                &Self::system_prompt(UNIT_INSTRUCTIONS, language),
                &format!("PASSAGE:\n{}\n\nFORM: {}", passage, form),
                config,
            )
            .await?;
        Ok(reply.to_domain())
    }

    async fn identify_word_for_unit(
        &self,
        word: &str,
        context: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<UnitPreview> {
        debug!(word, ?store_id, "identifying word");
        let reply: PreviewReply = self
            .model
            .complete_json(
                &Self::system_prompt(PREVIEW_INSTRUCTIONS, language),
                &format!("CONTEXT:\n{}\n\nSELECTED WORD: {}", context, word),
                None,
            )
            .await?;
        Ok(reply.to_domain())
    }

    async fn explain_morphology(
        &self,
        word: &str,
        passage: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<MorphologyBreakdown> {
        debug!(word, ?store_id, "explaining morphology");
        let reply: MorphologyReply = self
            .model
            .complete_json(
                &Self::system_prompt(MORPHOLOGY_INSTRUCTIONS, language),
                &format!("PASSAGE:\n{}\n\nWORD: {}", passage, word),
                None,
            )
            .await?;
        Ok(reply.to_domain(word))
    }

    async fn evaluate_response(
        &self,
        unit: &TrainingUnit,
        answer: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<ResponseEvaluation> {
        debug!(unit_id = %unit.id, ?store_id, "evaluating response");
        self.model
            .complete_json(
                &Self::system_prompt(EVALUATION_INSTRUCTIONS, language),
                &format!("{}\n\nSTUDENT ANSWER:\n{}", unit_summary(unit), answer),
                None,
            )
            .await
    }

    async fn answer_free_question(
        &self,
        question: &str,
        context: &str,
        style_guidance: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<String> {
        debug!(?store_id, "answering free question");
        let system = format!(
            "{}\n\n{}",
            Self::system_prompt(FREE_QUESTION_INSTRUCTIONS, language),
            style_guidance
        );
        let user = if context.trim().is_empty() {
            format!("QUESTION:\n{}", question)
        } else {
            format!("{}\nQUESTION:\n{}", context, question)
        };
        let answer = self.model.complete(&system, &user, None).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            warn!("free question produced an empty answer");
            return Err(PortError::Unexpected("LLM returned an empty answer.".to_string()));
        }
        Ok(answer.to_string())
    }

    async fn get_passage_text(
        &self,
        reference: &str,
        store_id: Option<&str>,
        language: &str,
    ) -> PortResult<Passage> {
        debug!(reference, ?store_id, "fetching passage text");
        let reply: PassageReply = self
            .model
            .complete_json(
                &Self::system_prompt(PASSAGE_INSTRUCTIONS, language),
                &format!("REFERENCE: {}", reference),
                None,
            )
            .await?;
        if reply.greek_text.trim().is_empty() {
            return Err(PortError::NotFound(format!(
                "No Greek text for {}",
                reference
            )));
        }
        Ok(Passage {
            reference: reference.to_string(),
            greek_text: reply.greek_text,
            versions: reply.versions,
        })
    }
}
