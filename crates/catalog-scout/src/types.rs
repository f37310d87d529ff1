//! Core data types shared by the resolver, extractor, normalizer, and router.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One named catalog section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub name: String,
    pub url: String,
}

/// Ordered, deduplicated list of catalog sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
}

impl Taxonomy {
    /// Build a taxonomy from raw `(name, url)` pairs.
    ///
    /// Names are whitespace-collapsed. Blank names, the synthetic root
    /// category, and later duplicates (compared case-folded) are dropped.
    /// First-seen order is preserved.
    pub fn from_entries<I>(raw: I, root_category: &str) -> Self
    where
        I: IntoIterator<Item = TaxonomyEntry>,
    {
        let root = normalize_key(root_category);
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for entry in raw {
            let name = collapse_whitespace(&entry.name);
            if name.is_empty() {
                continue;
            }
            let key = normalize_key(&name);
            if !root.is_empty() && key == root {
                continue;
            }
            if !seen.insert(key) {
                continue;
            }
            entries.push(TaxonomyEntry {
                name,
                url: entry.url.trim().to_string(),
            });
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaxonomyEntry> {
        self.entries.iter()
    }

    /// Section names in taxonomy order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&TaxonomyEntry> {
        let key = normalize_key(name);
        self.entries.iter().find(|e| normalize_key(&e.name) == key)
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key: whitespace-collapsed and lowercased.
pub fn normalize_key(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Confidence classification of a category match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Substring,
    Fuzzy,
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Substring => "substring",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::None => "none",
        }
    }
}

/// Outcome of resolving a query against a taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched_name: Option<String>,
    pub url: Option<String>,
    pub tier: MatchTier,
    /// Similarity score, set for fuzzy matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Set when the query was blank: the caller should list every section.
    #[serde(default)]
    pub list_all: bool,
}

impl MatchResult {
    pub fn matched(entry: &TaxonomyEntry, tier: MatchTier, score: Option<f64>) -> Self {
        Self {
            matched_name: Some(entry.name.clone()),
            url: Some(entry.url.clone()),
            tier,
            score,
            list_all: false,
        }
    }

    pub fn no_match() -> Self {
        Self {
            matched_name: None,
            url: None,
            tier: MatchTier::None,
            score: None,
            list_all: false,
        }
    }

    pub fn list_all() -> Self {
        Self {
            list_all: true,
            ..Self::no_match()
        }
    }
}

/// One extracted catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    /// Display string as shown by the source, currency symbol included.
    pub price: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Success,
    Choices,
    Error,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Success => "success",
            SearchStatus::Choices => "choices",
            SearchStatus::Error => "error",
        }
    }
}

/// Canonical response of a catalog search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub status: SearchStatus,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl SearchResult {
    pub fn success(category: impl Into<String>, items: Vec<Item>) -> Self {
        let mut meta = Map::new();
        meta.insert("count".to_string(), Value::from(items.len()));
        Self {
            status: SearchStatus::Success,
            category: category.into(),
            items,
            categories: None,
            message: None,
            meta,
        }
    }

    pub fn choices(
        category: impl Into<String>,
        categories: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: SearchStatus::Choices,
            category: category.into(),
            items: Vec::new(),
            categories: Some(categories),
            message: Some(message.into()),
            meta: Map::new(),
        }
    }

    pub fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SearchStatus::Error,
            category: category.into(),
            items: Vec::new(),
            categories: None,
            message: Some(message.into()),
            meta: Map::new(),
        }
    }

    /// Attach a diagnostic entry to `meta`.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Whether the result is a well-formed answer (success or choices).
    pub fn is_answer(&self) -> bool {
        matches!(self.status, SearchStatus::Success | SearchStatus::Choices)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "status": "error", "items": [], "message": "unserializable result" })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, url: &str) -> TaxonomyEntry {
        TaxonomyEntry {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_taxonomy_dedupes_and_drops_root() {
        let tax = Taxonomy::from_entries(
            vec![
                entry("Books", "/books_1"),
                entry("  Travel\n ", "/travel_2"),
                entry("Mystery", "/mystery_3"),
                entry("TRAVEL", "/travel_dup"),
                entry("   ", "/blank"),
                entry("Food   and Drink", "/food_33"),
            ],
            "Books",
        );
        assert_eq!(tax.names(), vec!["Travel", "Mystery", "Food and Drink"]);
        assert_eq!(tax.get("travel").unwrap().url, "/travel_2");
    }

    #[test]
    fn test_search_result_items_serialize_as_list() {
        let result = SearchResult::error("Travel", "boom");
        let v = result.to_value();
        assert!(v["items"].is_array());
        assert_eq!(v["status"], "error");
        assert!(v.get("categories").is_none());
    }

    #[test]
    fn test_match_result_camel_case() {
        let m = MatchResult::matched(&entry("Travel", "/t"), MatchTier::Substring, None);
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["matchedName"], "Travel");
        assert_eq!(v["tier"], "substring");
    }
}
