//! Row records and write-time normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row to be written to a table.
///
/// For tool tables, `tool_name` is the routable `skill.command` identifier and
/// `content` its description. Knowledge tables leave the tool fields empty and
/// use `id`/`content` only. `vector` is optional; rows without an embedding
/// are stored with a zero vector of the table's dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the table.
    pub id: String,
    /// Free text: tool description or knowledge passage.
    pub content: String,
    /// Embedding vector; length must equal the store dimension when present.
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    /// Parent skill (e.g. "git"); empty for knowledge rows.
    #[serde(default)]
    pub skill_name: String,
    /// Category label; stored and filterable, not query-scored by default.
    #[serde(default)]
    pub category: String,
    /// Full tool identifier (e.g. "git.commit"); empty for knowledge rows.
    #[serde(default)]
    pub tool_name: String,
    /// Source file path, when the row was derived from a file.
    #[serde(default)]
    pub file_path: String,
    /// Routing keywords; normalized (trimmed, deduped, empties dropped) on write.
    #[serde(default)]
    pub routing_keywords: Vec<String>,
    /// Intent labels; normalized on write.
    #[serde(default)]
    pub intents: Vec<String>,
    /// Free-form JSON metadata stored alongside the typed columns.
    #[serde(default)]
    pub metadata: Value,
}

impl Record {
    /// Apply the write-path normalization invariant in place: token lists are
    /// trimmed, de-duplicated (first occurrence wins), empties dropped.
    pub fn normalize(&mut self) {
        self.routing_keywords = normalize_tokens(std::mem::take(&mut self.routing_keywords));
        self.intents = normalize_tokens(std::mem::take(&mut self.intents));
    }

    /// True when the record carries a routable `skill.command`-style identifier.
    #[must_use]
    pub fn is_tool(&self) -> bool {
        is_identifier_shaped(&self.tool_name)
    }
}

/// Trim, drop empties, and de-duplicate keeping first occurrence.
pub fn normalize_tokens(tokens: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// True for `namespace.command`-style identifiers: two or more non-empty
/// segments of word characters joined by dots, no whitespace.
pub fn is_identifier_shaped(s: &str) -> bool {
    let s = s.trim();
    if !s.contains('.') {
        return false;
    }
    let mut segments = 0;
    for seg in s.split('.') {
        if seg.is_empty() {
            return false;
        }
        if !seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}
