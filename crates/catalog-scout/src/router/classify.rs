//! Free-text goal classification.
//!
//! Rules are tried in table order; the first predicate that matches picks
//! the intent. Anything no rule claims is a search.

use regex::Regex;
use std::sync::OnceLock;

use super::goal::Intent;
use crate::types::collapse_whitespace;

/// One classification rule.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub intent: Intent,
}

/// Ordered rule table. Predicates receive lowercased, whitespace-collapsed text.
pub const RULES: &[Rule] = &[
    Rule {
        name: "health",
        matches: is_health,
        intent: Intent::Health,
    },
    Rule {
        name: "list_categories",
        matches: is_list_categories,
        intent: Intent::ListCategories,
    },
];

/// The whole goal is a health request: "health", "ping", "healthcheck",
/// optionally followed by "check". "Health" is also a catalog section, so
/// the word alone inside a longer goal is a search.
fn is_health(text: &str) -> bool {
    let words: Vec<&str> = words(text).collect();
    match words.as_slice() {
        [w] | [w, "check"] => matches!(*w, "health" | "ping" | "healthcheck"),
        _ => false,
    }
}

fn is_list_categories(text: &str) -> bool {
    (text.contains("list") && text.contains("categor"))
        || text.contains("all categories")
        || text.contains("show categories")
        || text.contains("taxonomy")
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

/// Intent for a free-text goal.
pub fn classify(text: &str) -> Intent {
    let text = collapse_whitespace(text).to_lowercase();
    match RULES.iter().find(|r| (r.matches)(&text)) {
        Some(rule) => {
            tracing::debug!(rule = rule.name, "goal classified");
            rule.intent
        }
        None => Intent::SearchProduct,
    }
}

fn query_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:search(?:\s+for)?|category|find|show\s+me|browse|look\s+for)\s+(?:the\s+)?['"]?([\p{L}\p{N}' &-]+?)['"]?\s*$"#,
        )
        .expect("query regex is valid")
    })
}

const FILLER: &[&str] = &["books", "book", "category", "categories", "section"];
const LEADING_FILLER: &[&str] = &["me", "a", "an", "some", "the", "any"];

/// Pull the category query out of a search goal.
///
/// Falls back to the whole text when no verb pattern matches. Leading and
/// trailing filler words are stripped unless that would leave nothing.
pub fn extract_query(text: &str) -> String {
    let text = collapse_whitespace(text);
    let captured = query_pattern()
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| text.clone());

    let mut words: Vec<&str> = captured.split(' ').collect();
    let lead = words
        .iter()
        .take(words.len() - 1)
        .take_while(|w| LEADING_FILLER.contains(&w.to_lowercase().as_str()))
        .count();
    words.drain(..lead);
    while words.len() > 1
        && words
            .last()
            .is_some_and(|w| FILLER.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order() {
        assert_eq!(classify("ping"), Intent::Health);
        assert_eq!(classify("Health check?"), Intent::Health);
        assert_eq!(classify("healthcheck"), Intent::Health);
        assert_eq!(classify("list categories"), Intent::ListCategories);
        assert_eq!(classify("show me all categories"), Intent::ListCategories);
        assert_eq!(classify("what's in the taxonomy"), Intent::ListCategories);
        assert_eq!(classify("search for travel"), Intent::SearchProduct);
        assert_eq!(classify("poetry"), Intent::SearchProduct);
    }

    #[test]
    fn test_health_section_is_a_search() {
        assert_eq!(classify("healthy cooking"), Intent::SearchProduct);
        assert_eq!(classify("search for health books"), Intent::SearchProduct);
        assert_eq!(classify("is the health ok?"), Intent::SearchProduct);
        assert_eq!(classify("health"), Intent::Health);
        assert_eq!(extract_query("search for health books"), "health");
    }

    #[test]
    fn test_extract_query_strips_leading_filler() {
        assert_eq!(extract_query("find me a mystery"), "mystery");
        assert_eq!(extract_query("find some poetry books"), "poetry");
        assert_eq!(extract_query("show me the a"), "a");
    }

    #[test]
    fn test_extract_query_patterns() {
        assert_eq!(extract_query("search for travel books"), "travel");
        assert_eq!(extract_query("Search for 'Science Fiction'"), "Science Fiction");
        assert_eq!(extract_query("category mystery"), "mystery");
        assert_eq!(extract_query("find poetry section"), "poetry");
        assert_eq!(extract_query("show me food and drink"), "food and drink");
        assert_eq!(extract_query("browse the historical fiction category"), "historical fiction");
        assert_eq!(extract_query("sequential art"), "sequential art");
    }

    #[test]
    fn test_extract_query_keeps_lone_filler() {
        assert_eq!(extract_query("books"), "books");
    }
}
