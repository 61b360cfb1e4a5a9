//! services/rag/src/lib.rs
//!
//! The RAG service library: adapters for the core ports plus the pipeline
//! services that orchestrate ingestion, retrieval, answering, and quizzes.

pub mod adapters;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;

pub use config::Config;
pub use error::RagError;
pub use state::AppState;
