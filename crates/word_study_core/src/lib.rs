pub mod cache;
pub mod coaching;
pub mod domain;
pub mod error;
pub mod filters;
pub mod memory;
pub mod ports;
pub mod progress;
pub mod service;
pub mod units;

pub use cache::{CacheStatus, LexicalCache, PassageCache, SingleFlight, WriteOutcome};
pub use coaching::{
    CoachingContext, CoachingStrategy, QueryAnalysis, QueryIntent, StrategyPreference,
    StrategySelection,
};
pub use domain::{
    ExegeticalInsight, GenerationConfig, GreekForm, MasteryLevel, MorphologyBreakdown, Passage,
    PassageVersion, QuizAttempt, QuizQuestion, QuizType, ResponseEvaluation, SessionStatus,
    StudySession, TrainingUnit, UnitPreview, UnitProgress, UserResponse, WordCacheEntry,
    DEFAULT_LANGUAGE,
};
pub use error::{WordStudyError, WordStudyResult};
pub use filters::{InsightFilters, SessionFilters};
pub use memory::InMemoryStore;
pub use ports::{
    CacheStore, GenerationGateway, PortError, PortResult, QuizService, StudyStore,
};
pub use service::{
    CoachedAnswer, EvaluatedResponse, InsightUpdate, NewInsight, PassageLookup, QuizAnswer,
    QuizSubmission, ResponseStorage, SectionView, WordStudyService,
};
pub use units::{AddWordRequest, UnitGenerationRequest};
