pub mod chunker;
pub mod domain;
pub mod ports;

pub use chunker::{chunk_pages, ChunkConfig, ChunkConfigError};
pub use domain::{
    ChatMessage, Chunk, Document, Page, QuizAnswer, QuizAttempt, QuizKind, QuizQuestion,
    RankedMatch, Role,
};
pub use ports::{
    ConversationStore, DocumentStore, EmbeddingService, GenerationService, IndexEntry, PortError,
    PortResult, ScoredEntry, SimilarityMetric, VectorIndexService, VersionedHistory,
};
