//! Multi-pattern matching for the boost phase (Aho-Corasick, one pass).

use std::collections::HashSet;

use aho_corasick::AhoCorasick;

/// Lowercase an identifier and map its separators (`.`, `_`, `-`) to spaces,
/// so phrase matching treats `git.commit` and `git commit` as the same text.
#[must_use]
pub fn normalize_identifier_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect()
}

/// Result of one matcher scan over a normalized identifier.
#[derive(Clone, Copy, Default)]
pub struct NameMatchResult {
    /// Distinct query tokens found in the identifier.
    pub token_count: usize,
    /// Whether the full query appeared verbatim.
    pub exact_phrase: bool,
}

/// Compiled query matcher: a token automaton plus the normalized full-query
/// phrase. The phrase is checked by substring, not as an automaton pattern;
/// non-overlapping automaton iteration reports the earliest-ending match, so
/// a token prefix would shadow the longer phrase pattern and the phrase
/// would never be reported for multi-token queries.
pub struct QueryMatcher {
    tokens: Option<AhoCorasick>,
    phrase: Option<String>,
}

impl QueryMatcher {
    /// Compile a matcher for a query, or `None` when the query is too short
    /// to carry any signal.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let normalized = normalize_identifier_text(query);
        let trimmed = normalized.trim();

        let token_patterns: Vec<&str> = {
            let mut seen = HashSet::new();
            trimmed
                .split_whitespace()
                .filter(|t| t.len() > 1 && seen.insert(*t))
                .collect()
        };
        let tokens = if token_patterns.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&token_patterns).ok()?)
        };
        let phrase = (trimmed.len() > 2).then(|| trimmed.to_string());

        if tokens.is_none() && phrase.is_none() {
            return None;
        }
        Some(Self { tokens, phrase })
    }

    /// Scan one normalized identifier, counting distinct token patterns and
    /// checking the full phrase.
    #[must_use]
    pub fn scan(&self, haystack: &str) -> NameMatchResult {
        let mut seen = HashSet::new();
        if let Some(ac) = &self.tokens {
            for mat in ac.find_overlapping_iter(haystack) {
                seen.insert(mat.pattern());
            }
        }
        NameMatchResult {
            token_count: seen.len(),
            exact_phrase: self
                .phrase
                .as_deref()
                .is_some_and(|p| haystack.contains(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_separators() {
        assert_eq!(normalize_identifier_text("Git.Commit"), "git commit");
        assert_eq!(normalize_identifier_text("writer_polish-v2"), "writer polish v2");
    }

    #[test]
    fn multi_word_query_phrase_matches_dotted_name() {
        let m = QueryMatcher::new("git commit").unwrap();
        let r = m.scan(&normalize_identifier_text("git.commit"));
        assert!(r.exact_phrase);
        assert_eq!(r.token_count, 2);

        let r2 = m.scan(&normalize_identifier_text("git.status"));
        assert!(!r2.exact_phrase);
        assert_eq!(r2.token_count, 1);
    }

    #[test]
    fn single_word_query_earns_both_token_and_phrase() {
        let m = QueryMatcher::new("commit").unwrap();
        let r = m.scan(&normalize_identifier_text("git.commit"));
        assert!(r.exact_phrase, "commit is a substring of the normalized name");
        assert_eq!(r.token_count, 1);
    }

    #[test]
    fn dotted_query_matches_after_normalization() {
        let m = QueryMatcher::new("git.commit").unwrap();
        let r = m.scan(&normalize_identifier_text("git.commit"));
        assert!(r.exact_phrase);
        assert_eq!(r.token_count, 2);
    }

    #[test]
    fn phrase_not_shadowed_by_leading_token() {
        // A token that is a prefix of the phrase must not hide it.
        let m = QueryMatcher::new("git commit").unwrap();
        let r = m.scan("git commit all");
        assert!(r.exact_phrase);
        assert_eq!(r.token_count, 2);
    }

    #[test]
    fn short_queries_yield_no_matcher() {
        assert!(QueryMatcher::new("a").is_none());
        assert!(QueryMatcher::new("  ").is_none());
    }
}
