//! Free-text category resolution against a taxonomy.

use crate::similarity::best_match;
use crate::types::{normalize_key, MatchResult, MatchTier, Taxonomy};

/// Minimum normalized Levenshtein similarity for a fuzzy match.
///
/// Accepts single-character typos and one transposition in seven-letter
/// names ("histroy" → "History" scores 0.714), rejects unrelated words.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.66;

/// Resolve `query` to a taxonomy entry.
///
/// Tiers are tried in strict order and the first hit wins: blank query,
/// exact name, substring (first in taxonomy order), fuzzy (best score).
/// An exact hit is never displaced by a better fuzzy candidate.
pub fn resolve(query: &str, taxonomy: &Taxonomy) -> MatchResult {
    let needle = normalize_key(query);
    if needle.is_empty() {
        return MatchResult::list_all();
    }

    let keys: Vec<String> = taxonomy.iter().map(|e| normalize_key(&e.name)).collect();

    if let Some(idx) = keys.iter().position(|k| *k == needle) {
        return MatchResult::matched(&taxonomy.entries()[idx], MatchTier::Exact, None);
    }

    if let Some(idx) = keys.iter().position(|k| k.contains(&needle)) {
        return MatchResult::matched(&taxonomy.entries()[idx], MatchTier::Substring, None);
    }

    if let Some((idx, score)) = best_match(
        &needle,
        keys.iter().map(String::as_str),
        FUZZY_MATCH_THRESHOLD,
    ) {
        return MatchResult::matched(&taxonomy.entries()[idx], MatchTier::Fuzzy, Some(score));
    }

    MatchResult::no_match()
}
