//! Coerce upstream search payloads into a [`SearchResult`].
//!
//! Accepts the canonical shape, the legacy flat single-item shape, and the
//! older variants seen from earlier endpoint versions. Anything else becomes
//! an error-shaped result. Never fails.

use serde_json::{Map, Value};

use crate::types::{collapse_whitespace, Item, SearchResult, SearchStatus};

const SHAPE_KEYS: &[&str] = &["status", "items", "title", "categories"];

/// Normalize `raw` into a canonical result for `requested_category`.
pub fn normalize(raw: &Value, requested_category: &str) -> SearchResult {
    let Some(obj) = raw.as_object() else {
        return unrecognized(requested_category, format!("expected an object, got {}", kind(raw)));
    };
    if !SHAPE_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return unrecognized(requested_category, "no recognizable fields in upstream payload".to_string());
    }

    let mut meta = match obj.get("meta") {
        Some(Value::Object(m)) => m.clone(),
        Some(Value::String(note)) => {
            let mut m = Map::new();
            m.insert("note".to_string(), Value::String(note.clone()));
            m
        }
        _ => Map::new(),
    };

    let status = match obj.get("status") {
        None | Some(Value::Null) => SearchStatus::Success,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "success" | "ok" => SearchStatus::Success,
            "choices" => SearchStatus::Choices,
            "error" => SearchStatus::Error,
            _ => {
                meta.insert("upstream_status".to_string(), Value::String(s.clone()));
                SearchStatus::Error
            }
        },
        Some(other) => {
            meta.insert("upstream_status".to_string(), other.clone());
            SearchStatus::Error
        }
    };

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| requested_category.to_string());

    let candidates: Vec<&Value> = match obj.get("items") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        Some(_) => Vec::new(),
        None if obj.contains_key("title") => vec![raw],
        None => Vec::new(),
    };
    let items: Vec<Item> = candidates.iter().filter_map(|v| item_from(v)).collect();
    let dropped = candidates.len() - items.len();
    if dropped > 0 {
        meta.insert("dropped_items".to_string(), Value::from(dropped));
    }

    let mut categories = obj.get("categories").and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(collapse_whitespace)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
    });
    if status == SearchStatus::Choices && categories.is_none() {
        categories = Some(Vec::new());
    }

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    if status == SearchStatus::Success && !meta.contains_key("count") {
        meta.insert("count".to_string(), Value::from(items.len()));
    }

    SearchResult {
        status,
        category,
        items,
        categories,
        message,
        meta,
    }
}

fn item_from(value: &Value) -> Option<Item> {
    let obj = value.as_object()?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())?;
    let price = match obj.get("price") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Some(Item { title, price })
}

fn unrecognized(requested_category: &str, note: String) -> SearchResult {
    tracing::debug!(note = %note, "unrecognized upstream payload");
    SearchResult::error(requested_category, "Unrecognized response from upstream").with_meta("note", note)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
