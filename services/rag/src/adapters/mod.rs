pub mod db;
pub mod embeddings;
pub mod generation;
pub mod vector_index;

pub use db::DbAdapter;
pub use embeddings::OpenAiEmbeddingAdapter;
pub use generation::OpenAiGenerationAdapter;
pub use vector_index::PgVectorIndex;
