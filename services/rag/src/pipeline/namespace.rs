//! services/rag/src/pipeline/namespace.rs
//!
//! Namespace naming for the vector index. A namespace name must be unique
//! for the lifetime of the system; the uuid suffix guarantees that even for
//! repeated uploads of identically titled documents.

use uuid::Uuid;

const MAX_SLUG_CHARS: usize = 40;

/// Builds a unique, index-safe namespace name from a document title.
///
/// The title is lowercased and reduced to `[a-z0-9-]`, then suffixed with a
/// fresh uuid. Re-uploading a document therefore always lands in a new
/// namespace; old namespaces are never silently overwritten.
pub fn namespace_name(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(MAX_SLUG_CHARS)
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "document" } else { slug };
    format!("{}-{}", slug, Uuid::new_v4().simple())
}
