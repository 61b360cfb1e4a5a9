//! services/rag/src/pipeline/retrieve.rs
//!
//! Embeds a query, runs the top-K similarity search against a document's
//! namespace, and assembles the ordered, truncated context block fed to the
//! answer synthesizer.

use smartlearn_core::domain::RankedMatch;
use smartlearn_core::ports::{EmbeddingService, PortResult, VectorIndexService};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

/// The retrieved grounding for one query: the formatted prompt block plus
/// the raw ranked matches for citation display.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub prompt_block: String,
    pub matches: Vec<RankedMatch>,
}

impl RetrievedContext {
    /// True when the namespace returned no matches at all; the synthesizer
    /// treats this as "no grounding available".
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Runs query-time similarity search over one document namespace.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndexService>,
    snippet_max_chars: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndexService>,
        snippet_max_chars: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            snippet_max_chars,
        }
    }

    /// Embeds `query` and fetches the top-K nearest chunks from `namespace`.
    ///
    /// Matches come back ordered by descending similarity; ties keep the
    /// store's original order (stable sort). Zero matches yield an empty
    /// context, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> PortResult<RetrievedContext> {
        let query_vector = self.embedder.embed_query(query).await?;
        let mut entries = self.index.query(namespace, &query_vector, top_k).await?;
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));

        let matches: Vec<RankedMatch> = entries
            .into_iter()
            .map(|entry| RankedMatch {
                score: entry.score,
                page_number: entry.page,
                snippet: truncate_snippet(&entry.text, self.snippet_max_chars),
            })
            .collect();

        debug!(namespace, matches = matches.len(), "Retrieved context");
        Ok(RetrievedContext {
            prompt_block: format_context(&matches),
            matches,
        })
    }
}

/// Formats ranked matches as numbered, page-cited sources for the prompt.
fn format_context(matches: &[RankedMatch]) -> String {
    let mut block = String::new();
    for (i, m) in matches.iter().enumerate() {
        if i > 0 {
            block.push('\n');
        }
        // write! into a String cannot fail.
        let _ = write!(
            block,
            "Source {} (Page {}): \"{}\"",
            i + 1,
            m.page_number,
            m.snippet
        );
    }
    block
}

/// Truncates to at most `max_chars` characters, marking the cut with an
/// ellipsis. Operates on char boundaries.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(max_chars).collect();
    snippet.push_str("...");
    snippet
}
