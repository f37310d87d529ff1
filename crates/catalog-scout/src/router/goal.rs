//! Goal parsing: raw JSON goal → validated [`Goal`].

use serde::Serialize;
use serde_json::{Map, Value};

use super::classify;
use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};

/// The bounded set of actions a goal can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SearchProduct,
    ListCategories,
    Health,
}

impl Intent {
    /// Look up an intent by name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "search_product" | "search" => Some(Intent::SearchProduct),
            "list_categories" | "list_taxonomy" | "categories" => Some(Intent::ListCategories),
            "health" | "health_check" => Some(Intent::Health),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SearchProduct => "search_product",
            Intent::ListCategories => "list_categories",
            Intent::Health => "health",
        }
    }
}

/// A validated goal ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub intent: Intent,
    pub params: Map<String, Value>,
    /// Attempt budget, already clamped to `[1, max_steps]`.
    pub steps: u32,
}

impl Goal {
    /// The search query, from the first of `query`, `product`, `category`, `q`.
    pub fn query(&self) -> String {
        ["query", "product", "category", "q"]
            .iter()
            .find_map(|k| self.params.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Item limit, if a positive integer was given.
    pub fn limit(&self) -> Option<usize> {
        self.params
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }
}

/// Clamp a requested step budget. Absent means one attempt.
pub fn clamp_steps(requested: Option<i64>, max_steps: u32) -> u32 {
    let max = i64::from(max_steps.max(1));
    requested.unwrap_or(1).clamp(1, max) as u32
}

/// Validate and interpret `raw`.
///
/// `steps` from the request wins over a `steps` key inside a structured goal.
pub fn parse_goal(raw: &Value, steps: Option<i64>, config: &ScoutConfig) -> ScoutResult<Goal> {
    let size = serde_json::to_string(raw)?.len();
    if size > config.max_goal_bytes {
        return Err(ScoutError::GoalTooLarge {
            size,
            max: config.max_goal_bytes,
        });
    }

    match raw {
        Value::Null => Err(ScoutError::EmptyGoal),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ScoutError::EmptyGoal);
            }
            let intent = classify::classify(text);
            let mut params = Map::new();
            params.insert("text".to_string(), Value::String(text.to_string()));
            if intent == Intent::SearchProduct {
                params.insert(
                    "query".to_string(),
                    Value::String(classify::extract_query(text)),
                );
            }
            Ok(Goal {
                intent,
                params,
                steps: clamp_steps(steps, config.max_steps),
            })
        }
        Value::Object(obj) => {
            if obj.is_empty() {
                return Err(ScoutError::EmptyGoal);
            }
            let intent = match obj.get("intent") {
                Some(Value::String(name)) => Intent::from_name(name)
                    .ok_or_else(|| ScoutError::UnsupportedIntent(name.clone()))?,
                Some(_) => {
                    return Err(ScoutError::InvalidGoal("`intent` must be a string".into()))
                }
                None => {
                    return Err(ScoutError::InvalidGoal(
                        "structured goal needs an `intent`".into(),
                    ))
                }
            };

            let mut params = match obj.get("params") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(p)) => p.clone(),
                Some(_) => {
                    return Err(ScoutError::InvalidGoal("`params` must be an object".into()))
                }
            };
            for (key, value) in obj {
                if matches!(key.as_str(), "intent" | "params" | "steps") {
                    continue;
                }
                params.entry(key.clone()).or_insert_with(|| value.clone());
            }

            let steps = steps.or_else(|| obj.get("steps").and_then(Value::as_i64));
            Ok(Goal {
                intent,
                params,
                steps: clamp_steps(steps, config.max_steps),
            })
        }
        other => Err(ScoutError::InvalidGoal(format!(
            "goal must be a string or an object, got {other}"
        ))),
    }
}
