pub mod db;
pub mod generation_llm;
pub mod llm;
pub mod quiz_llm;

pub use db::DbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;
pub use llm::ChatModel;
pub use quiz_llm::HybridQuizAdapter;
