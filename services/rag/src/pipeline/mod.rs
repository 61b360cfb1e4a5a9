pub mod chat;
pub mod ingest;
pub mod namespace;
pub mod quiz;
pub mod retrieve;
pub mod rewrite;
pub mod retry;
pub mod synthesize;

pub use chat::{ChatService, ChatTurnOutcome};
pub use ingest::IngestionPipeline;
pub use quiz::QuizGenerator;
pub use retrieve::{RetrievedContext, Retriever};
pub use rewrite::QueryRewriter;
pub use synthesize::{AnswerSynthesizer, NO_ANSWER_FALLBACK};
