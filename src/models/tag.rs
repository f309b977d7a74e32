//! Tag model and name canonicalization.

use serde::{Deserialize, Serialize};

/// A canonical tag. One row exists per slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    /// Spelling of the first name that created this tag.
    pub name: String,
    pub slug: String,
    /// Number of live posts carrying this tag.
    pub usage_count: i64,
}

/// Derive the canonical slug for a tag name.
///
/// Only case and spacing are normalized: the name is lowercased, trimmed and
/// each run of whitespace becomes a single `-`. Punctuation is kept, so
/// `"C++"`, `"C#"` and `"C"` stay distinct while `"Go"`, `"go"` and `" GO "`
/// share the slug `go`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
