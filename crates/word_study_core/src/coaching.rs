//! crates/word_study_core/src/coaching.rs
//!
//! Chooses how a free-form question should be answered. The strategies only
//! classify the query and contribute prompt text; they perform no I/O.

use crate::domain::MasteryLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoachingStrategy {
    /// Leads the learner to the answer with questions.
    Socratic,
    /// Answers plainly and briefly.
    Direct,
    /// Opens up readings and connections to weigh.
    Exploratory,
    /// Teaches step by step, grammar first.
    Didactic,
}

/// Either a learner-chosen strategy or automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyPreference {
    #[default]
    Auto,
    Fixed(CoachingStrategy),
}

impl StrategyPreference {
    /// Accepts `auto` or a strategy name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        if raw.is_empty() || raw == "auto" {
            return Some(StrategyPreference::Auto);
        }
        CoachingStrategy::ALL
            .into_iter()
            .find(|s| s.name() == raw)
            .map(StrategyPreference::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Definition,
    Grammar,
    Interpretation,
    Comparison,
    Application,
    General,
}

/// What the learner is looking at while asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoachingContext {
    pub passage: Option<String>,
    pub greek_word: Option<String>,
    pub mastery_level: Option<MasteryLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub is_vague: bool,
    pub intent: QueryIntent,
    pub suggested_approach: CoachingStrategy,
    pub detected_topics: Vec<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    pub strategy: CoachingStrategy,
    pub analysis: QueryAnalysis,
    pub prompt_additions: String,
    pub guiding_questions: Vec<String>,
    /// True when the learner's explicit choice was used.
    pub overridden: bool,
}

//=========================================================================================
// Query analysis
//=========================================================================================

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "grammar",
        &[
            "aorist", "aoristo", "participle", "participio", "genitive", "genitivo", "dative",
            "dativo", "accusative", "acusativo", "imperative", "imperativo", "subjunctive",
            "subjuntivo", "tense", "tiempo verbal", "voice", "voz", "mood", "modo", "case",
            "caso", "morphology", "morfología", "declension", "declinación", "conjugation",
            "conjugación", "verb", "verbo", "noun", "sustantivo", "article", "artículo",
        ],
    ),
    (
        "lexical",
        &[
            "meaning", "means", "mean", "significa", "significado", "definition", "definición",
            "root", "raíz", "etymology", "etimología", "translate", "traducir", "traducción",
            "gloss", "lemma", "lema",
        ],
    ),
    (
        "theology",
        &[
            "grace", "gracia", "faith", "fe", "justification", "justificación", "sacrifice",
            "sacrificio", "salvation", "salvación", "spirit", "espíritu", "worship", "culto",
            "adoración", "mercy", "misericordia", "holiness", "santidad", "sin", "pecado",
        ],
    ),
    (
        "historical-context",
        &[
            "historical", "histórico", "culture", "cultura", "author", "autor", "audience",
            "audiencia", "first century", "primer siglo", "roman", "romano", "jewish", "judío",
            "temple", "templo",
        ],
    ),
    (
        "application",
        &[
            "sermon", "sermón", "preach", "predicar", "congregation", "congregación", "apply",
            "aplicar", "application", "aplicación", "today", "hoy", "illustration",
            "ilustración",
        ],
    ),
];

const COMPARISON_MARKERS: &[&str] = &[
    "difference", "differ", "compare", "versus", " vs ", "contrast", "diferencia", "comparar",
    "contraste",
];
const APPLICATION_MARKERS: &[&str] = &[
    "apply", "preach", "sermon", "congregation", "aplicar", "predicar", "sermón",
    "congregación", "how can i use", "cómo puedo usar",
];
const DEFINITION_MARKERS: &[&str] = &[
    "what does", "what is", "meaning", "define", "qué significa", "qué es", "significado",
    "definición", "significa",
];
const INTERPRETATION_MARKERS: &[&str] = &[
    "why", "interpret", "how should", "understand", "por qué", "interpretar", "cómo entender",
    "sentido",
];
const VAGUE_MARKERS: &[&str] = &[
    "help", "ayuda", "no entiendo", "i don't understand", "explain this", "explícame esto",
    "confused", "confundido", "no sé",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whole-word check for single keywords, substring for phrases.
fn mentions(tokens: &[&str], normalized: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        normalized.contains(keyword)
    } else {
        tokens.contains(&keyword)
    }
}

/// Strategy-independent classification of a query.
pub fn analyze_query(query: &str, context: &CoachingContext) -> QueryAnalysis {
    let normalized = format!(" {} ", query.trim().to_lowercase());
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let detected_topics: Vec<String> = TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| mentions(&tokens, &normalized, k)))
        .map(|(topic, _)| topic.to_string())
        .collect();
    let has_topic = |name: &str| detected_topics.iter().any(|t| t == name);

    let intent = if contains_any(&normalized, COMPARISON_MARKERS) {
        QueryIntent::Comparison
    } else if contains_any(&normalized, APPLICATION_MARKERS) {
        QueryIntent::Application
    } else if has_topic("grammar") {
        QueryIntent::Grammar
    } else if contains_any(&normalized, DEFINITION_MARKERS) {
        QueryIntent::Definition
    } else if contains_any(&normalized, INTERPRETATION_MARKERS) {
        QueryIntent::Interpretation
    } else {
        QueryIntent::General
    };

    let is_vague = tokens.len() < 3
        || (detected_topics.is_empty() && contains_any(&normalized, VAGUE_MARKERS))
        || (tokens.len() < 6 && detected_topics.is_empty() && intent == QueryIntent::General);

    let mut suggested_approach = if is_vague {
        CoachingStrategy::Socratic
    } else {
        match intent {
            QueryIntent::Definition | QueryIntent::General => CoachingStrategy::Direct,
            QueryIntent::Grammar => CoachingStrategy::Didactic,
            QueryIntent::Comparison | QueryIntent::Interpretation => {
                CoachingStrategy::Exploratory
            }
            QueryIntent::Application => CoachingStrategy::Socratic,
        }
    };
    // Learners who already practiced the unit can reason their way through grammar.
    if suggested_approach == CoachingStrategy::Didactic
        && context.mastery_level.unwrap_or_default() >= MasteryLevel::Practiced
    {
        suggested_approach = CoachingStrategy::Socratic;
    }

    let mut confidence = 0.5 + 0.1 * detected_topics.len().min(3) as f32;
    if intent != QueryIntent::General {
        confidence += 0.15;
    }
    if is_vague {
        confidence -= 0.2;
    }

    QueryAnalysis {
        is_vague,
        intent,
        suggested_approach,
        detected_topics,
        confidence: confidence.clamp(0.1, 0.95),
    }
}

//=========================================================================================
// Strategies
//=========================================================================================

impl CoachingStrategy {
    pub const ALL: [CoachingStrategy; 4] = [
        CoachingStrategy::Socratic,
        CoachingStrategy::Direct,
        CoachingStrategy::Exploratory,
        CoachingStrategy::Didactic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoachingStrategy::Socratic => "socratic",
            CoachingStrategy::Direct => "direct",
            CoachingStrategy::Exploratory => "exploratory",
            CoachingStrategy::Didactic => "didactic",
        }
    }

    /// How well this strategy serves a query it was not the first pick for.
    fn affinity(self, analysis: &QueryAnalysis) -> f32 {
        use CoachingStrategy::*;
        if analysis.is_vague {
            return match self {
                Socratic => 1.0,
                Exploratory => 0.6,
                Didactic => 0.4,
                Direct => 0.3,
            };
        }
        match (self, analysis.intent) {
            (Direct, QueryIntent::Definition | QueryIntent::General) => 0.9,
            (Didactic, QueryIntent::Grammar | QueryIntent::Definition) => 0.7,
            (Socratic, QueryIntent::Grammar) => 0.7,
            (Exploratory, QueryIntent::Comparison | QueryIntent::Interpretation) => 0.9,
            (Socratic, QueryIntent::Interpretation | QueryIntent::Application) => 0.7,
            (Exploratory, QueryIntent::Application) => 0.6,
            _ => 0.4,
        }
    }

    /// Analyzes a query and scores how well this strategy fits it.
    pub fn analyze(self, query: &str, context: &CoachingContext) -> QueryAnalysis {
        let base = analyze_query(query, context);
        let fit = if self == base.suggested_approach {
            1.0
        } else {
            self.affinity(&base).min(0.95)
        };
        QueryAnalysis {
            confidence: (base.confidence * fit).clamp(0.05, 0.95),
            ..base
        }
    }

    pub fn system_prompt_additions(self) -> &'static str {
        match self {
            CoachingStrategy::Socratic => {
                "Coaching style: Socratic. Do not hand over the full answer at once. \
                 Ask one or two short guiding questions that point the learner at the \
                 Greek form and its context, then confirm or gently correct their reasoning."
            }
            CoachingStrategy::Direct => {
                "Coaching style: direct. Answer the question plainly in a few sentences, \
                 cite the Greek form and its gloss, and stop."
            }
            CoachingStrategy::Exploratory => {
                "Coaching style: exploratory. Lay out the plausible readings, what in the \
                 grammar or context supports each, and invite the learner to weigh them."
            }
            CoachingStrategy::Didactic => {
                "Coaching style: didactic. Teach step by step: morphology first, then \
                 syntax, then meaning in context. Define every technical term you use."
            }
        }
    }

    /// Follow-up questions for styles that lead with questions. Empty for
    /// styles that answer outright.
    pub fn guiding_questions(self, query: &str, context: &CoachingContext) -> Vec<String> {
        let word = context
            .greek_word
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or("this word");
        let passage = context
            .passage
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("the passage");

        match self {
            CoachingStrategy::Socratic => {
                let mut questions = vec![
                    format!("What do you notice about the form of {} in {}?", word, passage),
                    format!("Who is acting, and who is acted upon, in the clause with {}?", word),
                ];
                if analyze_query(query, context).intent == QueryIntent::Application {
                    questions.push(format!(
                        "How would your listeners hear {} in their own situation?",
                        word
                    ));
                }
                questions
            }
            CoachingStrategy::Exploratory => vec![
                format!("What other readings of {} are possible here?", word),
                format!("How does the surrounding argument of {} constrain its meaning?", passage),
                format!("Where else does the author use {}, and does the sense shift?", word),
            ],
            CoachingStrategy::Direct | CoachingStrategy::Didactic => Vec::new(),
        }
    }
}

//=========================================================================================
// Selector
//=========================================================================================

/// Picks a strategy. With `Auto`, every strategy scores the query and the
/// most confident one wins.
pub fn select_strategy(
    query: &str,
    context: &CoachingContext,
    preference: StrategyPreference,
) -> StrategySelection {
    let (strategy, analysis, overridden) = match preference {
        StrategyPreference::Fixed(strategy) => (strategy, strategy.analyze(query, context), true),
        StrategyPreference::Auto => {
            let mut best: Option<(CoachingStrategy, QueryAnalysis)> = None;
            for strategy in CoachingStrategy::ALL {
                let analysis = strategy.analyze(query, context);
                let better = best
                    .as_ref()
                    .map_or(true, |(_, current)| analysis.confidence > current.confidence);
                if better {
                    best = Some((strategy, analysis));
                }
            }
            match best {
                Some((strategy, analysis)) => (strategy, analysis, false),
                None => {
                    let analysis = analyze_query(query, context);
                    (analysis.suggested_approach, analysis, false)
                }
            }
        }
    };

    StrategySelection {
        strategy,
        prompt_additions: strategy.system_prompt_additions().to_string(),
        guiding_questions: strategy.guiding_questions(query, context),
        analysis,
        overridden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CoachingContext {
        CoachingContext {
            passage: Some("Romanos 12:1-2".to_string()),
            greek_word: Some("παρακαλῶ".to_string()),
            mastery_level: None,
        }
    }

    #[test]
    fn short_query_is_vague_and_socratic() {
        let analysis = analyze_query("help", &context());
        assert!(analysis.is_vague);
        assert_eq!(analysis.suggested_approach, CoachingStrategy::Socratic);
    }

    #[test]
    fn grammar_question_goes_didactic_for_beginners() {
        let query = "Why is this verb in the aorist tense here?";
        let analysis = analyze_query(query, &context());
        assert_eq!(analysis.intent, QueryIntent::Grammar);
        assert!(analysis.detected_topics.contains(&"grammar".to_string()));
        assert_eq!(analysis.suggested_approach, CoachingStrategy::Didactic);

        let practiced = CoachingContext {
            mastery_level: Some(MasteryLevel::Practiced),
            ..context()
        };
        assert_eq!(
            analyze_query(query, &practiced).suggested_approach,
            CoachingStrategy::Socratic
        );
    }

    #[test]
    fn comparison_question_is_exploratory() {
        let selection = select_strategy(
            "What is the difference between logos and rhema in this passage?",
            &context(),
            StrategyPreference::Auto,
        );
        assert_eq!(selection.analysis.intent, QueryIntent::Comparison);
        assert_eq!(selection.strategy, CoachingStrategy::Exploratory);
        assert!(!selection.overridden);
        assert_eq!(selection.guiding_questions.len(), 3);
    }

    #[test]
    fn spanish_definition_question_is_direct() {
        let selection = select_strategy(
            "¿Qué significa la palabra misericordias en este versículo?",
            &context(),
            StrategyPreference::Auto,
        );
        assert_eq!(selection.analysis.intent, QueryIntent::Definition);
        assert_eq!(selection.strategy, CoachingStrategy::Direct);
        assert!(selection.guiding_questions.is_empty());
    }

    #[test]
    fn explicit_preference_wins_over_analysis() {
        let selection = select_strategy(
            "help",
            &context(),
            StrategyPreference::Fixed(CoachingStrategy::Direct),
        );
        assert_eq!(selection.strategy, CoachingStrategy::Direct);
        assert!(selection.overridden);
        assert!(selection.prompt_additions.contains("direct"));
    }

    #[test]
    fn auto_pick_matches_suggested_approach() {
        for query in [
            "help",
            "How should I preach this to my congregation today?",
            "Explain the genitive case of this noun",
        ] {
            let selection = select_strategy(query, &context(), StrategyPreference::Auto);
            assert_eq!(selection.strategy, selection.analysis.suggested_approach);
        }
    }

    #[test]
    fn preference_parsing() {
        assert_eq!(StrategyPreference::parse("AUTO"), Some(StrategyPreference::Auto));
        assert_eq!(
            StrategyPreference::parse(" Socratic "),
            Some(StrategyPreference::Fixed(CoachingStrategy::Socratic))
        );
        assert_eq!(StrategyPreference::parse("lecture"), None);
    }
}
