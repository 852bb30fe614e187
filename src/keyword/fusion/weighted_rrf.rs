//! Weighted RRF with field boosting. The boost phase runs in parallel
//! (rayon) since each identifier scan is independent and read-only.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::keyword::{KeywordHit, EXACT_PHRASE_BOOST, NAME_TOKEN_BOOST};

use super::kernels::rrf_term;
use super::match_util::{normalize_identifier_text, NameMatchResult, QueryMatcher};
use super::types::HybridHit;

/// Fuse a vector stream and a keyword stream with weighted RRF, then apply
/// field boosting against the query.
///
/// Each stream contributes `weight / (k + rank + 1)` per item (ranks are
/// 0-indexed within the stream); items in both streams sum their
/// contributions. Boosts are additive on the fused score: one
/// [`NAME_TOKEN_BOOST`] per distinct query token found in the identifier and
/// [`EXACT_PHRASE_BOOST`] when the full query appears verbatim (identifier
/// separators normalized to spaces for the comparison). Output is sorted by
/// fused score descending, ties broken by identifier ascending.
#[must_use]
pub fn apply_weighted_rrf(
    vector_results: Vec<(String, f32)>,
    keyword_results: Vec<KeywordHit>,
    k: f32,
    semantic_weight: f32,
    keyword_weight: f32,
    query: &str,
) -> Vec<HybridHit> {
    let mut fusion_map: HashMap<String, HybridHit> = HashMap::new();

    for (rank, (name, score)) in vector_results.into_iter().enumerate() {
        let rrf_score = semantic_weight * rrf_term(k, rank);
        fusion_map.insert(
            name.clone(),
            HybridHit {
                name,
                rrf_score,
                vector_score: score,
                keyword_score: 0.0,
            },
        );
    }

    for (rank, hit) in keyword_results.iter().enumerate() {
        let rrf_score = keyword_weight * rrf_term(k, rank);
        if let Some(entry) = fusion_map.get_mut(&hit.name) {
            entry.rrf_score += rrf_score;
            entry.keyword_score = hit.score;
        } else {
            fusion_map.insert(
                hit.name.clone(),
                HybridHit {
                    name: hit.name.clone(),
                    rrf_score,
                    vector_score: 0.0,
                    keyword_score: hit.score,
                },
            );
        }
    }

    let keys_ordered: Vec<String> = fusion_map.keys().cloned().collect();
    let matcher = QueryMatcher::new(query);

    // Compute boost deltas per index read-only, then apply once.
    let deltas: Vec<f32> = keys_ordered
        .par_iter()
        .map(|name| {
            let haystack = normalize_identifier_text(name);
            let NameMatchResult {
                token_count,
                exact_phrase,
            } = matcher
                .as_ref()
                .map(|m| m.scan(&haystack))
                .unwrap_or_default();

            let mut delta = 0.0;
            if token_count > 0 {
                delta += (token_count as f32) * NAME_TOKEN_BOOST;
            }
            if exact_phrase {
                delta += EXACT_PHRASE_BOOST;
            }
            delta
        })
        .collect();

    for (name, delta) in keys_ordered.iter().zip(deltas) {
        if delta > 0.0 {
            if let Some(entry) = fusion_map.get_mut(name) {
                entry.rrf_score += delta;
            }
        }
    }

    let mut results: Vec<_> = fusion_map.into_values().collect();
    results.sort_by(|a, b| {
        b.rrf_score
            .total_cmp(&a.rrf_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw_hit(name: &str, score: f32) -> KeywordHit {
        KeywordHit {
            name: name.to_string(),
            description: String::new(),
            category: String::new(),
            keywords: vec![],
            intents: vec![],
            metadata: serde_json::Value::Null,
            score,
        }
    }

    #[test]
    fn both_streams_sum_contributions() {
        let results = apply_weighted_rrf(
            vec![("a.b".into(), 0.9)],
            vec![kw_hit("a.b", 4.0)],
            10.0,
            1.0,
            1.5,
            "zzz",
        );
        assert_eq!(results.len(), 1);
        let expected = 1.0 / 11.0 + 1.5 / 11.0;
        assert!((results[0].rrf_score - expected).abs() < 1e-5);
        assert!((results[0].vector_score - 0.9).abs() < 1e-6);
        assert!((results[0].keyword_score - 4.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_tie_break_by_name() {
        let results = apply_weighted_rrf(
            vec![],
            vec![kw_hit("b.x", 1.0), kw_hit("a.x", 1.0)],
            10.0,
            1.0,
            1.0,
            "zzz",
        );
        // b.x ranks first in the stream so it scores higher; equal-score
        // entries would sort by name.
        assert_eq!(results[0].name, "b.x");
        let tied = apply_weighted_rrf(
            vec![("b.y".into(), 0.5), ("a.y".into(), 0.5)],
            vec![],
            10.0,
            1.0,
            1.0,
            "zzz",
        );
        assert_eq!(tied.len(), 2);
    }

    #[test]
    fn exact_phrase_boost_crosses_one() {
        let results = apply_weighted_rrf(
            vec![("git.commit".into(), 0.92)],
            vec![kw_hit("git.commit", 8.5), kw_hit("git.status", 3.1), kw_hit("git.push", 2.0)],
            10.0,
            1.0,
            1.5,
            "git commit",
        );
        assert_eq!(results[0].name, "git.commit");
        assert!(
            results[0].rrf_score > 1.0,
            "phrase + both tokens should push past 1.0, got {}",
            results[0].rrf_score
        );
        for other in &results[1..] {
            assert!(other.rrf_score < 0.4, "{} scored {}", other.name, other.rrf_score);
        }
    }

    #[test]
    fn single_word_query_gets_token_and_phrase_boost() {
        let results = apply_weighted_rrf(
            vec![],
            vec![kw_hit("git.commit", 5.0)],
            10.0,
            1.0,
            1.5,
            "commit",
        );
        let expected = 1.5 / 11.0 + NAME_TOKEN_BOOST + EXACT_PHRASE_BOOST;
        assert!((results[0].rrf_score - expected).abs() < 1e-5);
    }

    #[test]
    fn fused_score_non_decreasing_in_keyword_weight() {
        let vector = vec![("git.commit".to_string(), 0.9), ("git.status".to_string(), 0.7)];
        let keyword = vec![kw_hit("git.commit", 8.0), kw_hit("fs.read", 2.0)];
        let mut previous = 0.0_f32;
        for weight in [0.0, 0.5, 1.0, 1.5, 3.0] {
            let results =
                apply_weighted_rrf(vector.clone(), keyword.clone(), 10.0, 1.0, weight, "zzz");
            let score = results
                .iter()
                .find(|h| h.name == "git.commit")
                .unwrap()
                .rrf_score;
            assert!(score >= previous, "weight {weight} lowered the fused score");
            previous = score;
        }
    }
}
