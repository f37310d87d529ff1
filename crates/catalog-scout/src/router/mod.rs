//! Goal routing: parse a goal, pick an intent, execute it with fallback.
//!
//! Execution runs the primary (browser) backend first. When it fails with an
//! error, the same intent is retried once through the fallback backend; the
//! fallback is never used twice in one run. Each step is one attempt, and the
//! run stops at the first `success` or `choices` answer.

pub mod classify;
pub mod fallback;
pub mod goal;
pub mod trace;

pub use fallback::{JsonEndpointFallback, ENGINE_HEADER};
pub use goal::{parse_goal, Goal, Intent};
pub use trace::{ExecutionTrace, RunState, StepLog, Timings};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogBackend;
use crate::config::ScoutConfig;
use crate::error::{ScoutError, ScoutResult};
use crate::types::SearchResult;
use trace::now_ms;

/// Body of a run request.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub goal: Value,
    #[serde(default)]
    pub steps: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// Outcome of a run plus its trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub status: RunStatus,
    pub run_id: Uuid,
    pub result: Value,
    pub steps: Vec<StepLog>,
    pub timings: Timings,
}

/// Routes goals to catalog backends.
pub struct GoalRouter {
    primary: Arc<dyn CatalogBackend>,
    fallback: Option<Arc<dyn CatalogBackend>>,
    config: Arc<ScoutConfig>,
}

impl GoalRouter {
    pub fn new(
        primary: Arc<dyn CatalogBackend>,
        fallback: Option<Arc<dyn CatalogBackend>>,
        config: Arc<ScoutConfig>,
    ) -> Self {
        Self {
            primary,
            fallback,
            config,
        }
    }

    /// Execute one goal. Never fails; failures are reported in the response.
    pub async fn run(&self, request: RunRequest) -> RunResponse {
        let mut trace = ExecutionTrace::start();
        let received = trace.timings.started_ms;
        trace.record("receive", RunState::Received, received, "ok", None);

        let t0 = now_ms();
        let goal = match parse_goal(&request.goal, request.steps, &self.config) {
            Ok(goal) => {
                let detail = format!("intent={} steps={}", goal.intent.as_str(), goal.steps);
                trace.record(
                    "resolve_intent",
                    RunState::IntentResolved,
                    t0,
                    "ok",
                    Some(detail),
                );
                goal
            }
            Err(e) => {
                let detail = Some(e.to_string());
                trace.record("resolve_intent", RunState::Failed, t0, "error", detail);
                return self.finish(trace, "", Err(e));
            }
        };

        let query = goal.query();
        let outcome = match goal.intent {
            Intent::Health => {
                let t = now_ms();
                trace.record("health", RunState::Completed, t, "ok", None);
                Ok(self.health())
            }
            Intent::ListCategories | Intent::SearchProduct => {
                self.execute(&goal, &mut trace).await
            }
        };
        self.finish(trace, &query, outcome)
    }

    fn health(&self) -> Value {
        json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "engine": self.primary.name(),
            "fallback": self.fallback.as_ref().map(|f| f.name()),
        })
    }

    /// The step loop. Returns the first usable answer, else the last
    /// unusable answer or error.
    async fn execute(&self, goal: &Goal, trace: &mut ExecutionTrace) -> ScoutResult<Value> {
        let action = goal.intent.as_str();
        let mut fallback_used = false;
        let mut last: ScoutResult<Value> = Err(ScoutError::InvalidGoal("no attempt made".into()));

        for step in 1..=goal.steps {
            let t = now_ms();
            let outcome = match attempt(self.primary.as_ref(), goal).await {
                Err(e) => {
                    let detail = Some(e.to_string());
                    trace.record(action, RunState::ExecutingBrowser, t, "error", detail);
                    match &self.fallback {
                        Some(fallback) if !fallback_used => {
                            fallback_used = true;
                            tracing::warn!(
                                run_id = %trace.run_id,
                                step,
                                error = %e,
                                "primary path failed; trying HTTP fallback"
                            );
                            let t = now_ms();
                            let outcome = attempt(fallback.as_ref(), goal).await;
                            trace.record(
                                action,
                                RunState::ExecutingFallback,
                                t,
                                status_of(&outcome),
                                outcome.as_ref().err().map(|e| e.to_string()),
                            );
                            outcome
                        }
                        _ => Err(e),
                    }
                }
                Ok(value) => {
                    let status = status_of_value(&value);
                    trace.record(action, RunState::ExecutingBrowser, t, status, None);
                    Ok(value)
                }
            };

            if outcome.as_ref().is_ok_and(is_usable) {
                let t = now_ms();
                trace.record("complete", RunState::Completed, t, "ok", None);
                return outcome;
            }
            last = outcome;
        }

        let t = now_ms();
        let detail = match &last {
            Ok(_) => "step budget exhausted without a usable result".to_string(),
            Err(e) => e.to_string(),
        };
        trace.record("complete", RunState::Failed, t, "error", Some(detail));
        last
    }

    fn finish(
        &self,
        mut trace: ExecutionTrace,
        query: &str,
        outcome: ScoutResult<Value>,
    ) -> RunResponse {
        trace.finish();
        let completed = trace.state() == RunState::Completed;

        let result = match outcome {
            Ok(value) => value,
            Err(e) if e.is_goal_rejection() => {
                tracing::info!(run_id = %trace.run_id, code = e.code(), "goal rejected");
                SearchResult::error(query, "The goal was rejected")
                    .with_meta("code", e.code())
                    .with_meta("detail", e.to_string())
                    .with_meta("rejected", true)
                    .to_value()
            }
            Err(e) => {
                tracing::warn!(run_id = %trace.run_id, code = e.code(), error = %e, "goal failed");
                SearchResult::error(query, "Unable to complete the goal")
                    .with_meta("code", e.code())
                    .with_meta("detail", e.to_string())
                    .to_value()
            }
        };

        tracing::info!(
            run_id = %trace.run_id,
            completed,
            steps = trace.steps.len(),
            duration_ms = trace.timings.duration_ms,
            "goal run finished"
        );

        RunResponse {
            status: if completed {
                RunStatus::Success
            } else {
                RunStatus::Error
            },
            run_id: trace.run_id,
            result,
            steps: trace.steps,
            timings: trace.timings,
        }
    }
}

async fn attempt(backend: &dyn CatalogBackend, goal: &Goal) -> ScoutResult<Value> {
    match goal.intent {
        Intent::SearchProduct => {
            let result = backend.search(&goal.query(), goal.limit()).await?;
            Ok(result.to_value())
        }
        Intent::ListCategories => {
            let categories = backend.categories().await?;
            Ok(json!({
                "status": "success",
                "count": categories.len(),
                "categories": categories,
            }))
        }
        Intent::Health => Err(ScoutError::UnsupportedIntent("health".into())),
    }
}

fn is_usable(value: &Value) -> bool {
    matches!(value["status"].as_str(), Some("success" | "choices"))
}

fn status_of_value(value: &Value) -> &'static str {
    match value["status"].as_str() {
        Some("success") => "success",
        Some("choices") => "choices",
        _ => "error",
    }
}

fn status_of(outcome: &ScoutResult<Value>) -> &'static str {
    outcome.as_ref().map_or("error", status_of_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Item;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend with a fixed behaviour and call counters.
    struct FakeBackend {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn broken(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogBackend for FakeBackend {
        async fn search(&self, query: &str, _limit: Option<usize>) -> ScoutResult<SearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScoutError::BrowserUnavailable("no chromium".into()));
            }
            if query.starts_with("zzz") {
                return Ok(SearchResult::choices(
                    query,
                    vec!["Travel".into(), "Mystery".into(), "Poetry".into()],
                    crate::catalog::no_match_message(query),
                ));
            }
            Ok(SearchResult::success(
                "Travel",
                vec![Item {
                    title: "A Summer in Europe".into(),
                    price: "£44.34".into(),
                }],
            ))
        }

        async fn categories(&self) -> ScoutResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScoutError::BrowserUnavailable("no chromium".into()));
            }
            Ok(vec!["Travel".into(), "Poetry".into()])
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn router(primary: &Arc<FakeBackend>, fallback: Option<&Arc<FakeBackend>>) -> GoalRouter {
        GoalRouter::new(
            Arc::clone(primary) as Arc<dyn CatalogBackend>,
            fallback.map(|f| Arc::clone(f) as Arc<dyn CatalogBackend>),
            Arc::new(ScoutConfig::default()),
        )
    }

    fn request(goal: Value, steps: Option<i64>) -> RunRequest {
        RunRequest { goal, steps }
    }

    #[tokio::test]
    async fn test_primary_success() {
        let primary = FakeBackend::ok("browser");
        let fallback = FakeBackend::ok("http_fallback");
        let resp = router(&primary, Some(&fallback))
            .run(request(json!("search for travel books"), None))
            .await;

        assert_eq!(resp.status, RunStatus::Success);
        assert_eq!(resp.result["status"], "success");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        assert_eq!(resp.steps.last().unwrap().state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_fallback_runs_once_and_succeeds() {
        let primary = FakeBackend::broken("browser");
        let fallback = FakeBackend::ok("http_fallback");
        let resp = router(&primary, Some(&fallback))
            .run(request(json!("search for travel"), Some(3)))
            .await;

        assert_eq!(resp.status, RunStatus::Success);
        assert_eq!(resp.result["items"].as_array().unwrap().len(), 1);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        assert!(resp.steps.iter().any(|s| s.state == RunState::ExecutingFallback));
    }

    #[tokio::test]
    async fn test_fallback_never_repeats() {
        let primary = FakeBackend::broken("browser");
        let fallback = FakeBackend::broken("http_fallback");
        let resp = router(&primary, Some(&fallback))
            .run(request(json!({"intent": "search", "query": "travel"}), Some(3)))
            .await;

        assert_eq!(resp.status, RunStatus::Error);
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(resp.result["status"], "error");
        assert!(resp.result["items"].is_array());
        assert_eq!(resp.result["meta"]["code"], "E_BROWSER_UNAVAILABLE");
        assert!(resp.result["meta"].get("rejected").is_none());
        assert_eq!(resp.steps.last().unwrap().state, RunState::Failed);
    }

    #[tokio::test]
    async fn test_oversized_goal_is_not_executed() {
        let primary = FakeBackend::ok("browser");
        let fallback = FakeBackend::ok("http_fallback");
        let resp = router(&primary, Some(&fallback))
            .run(request(json!("a".repeat(2000)), None))
            .await;

        assert_eq!(resp.status, RunStatus::Error);
        assert_eq!(resp.result["meta"]["code"], "E_GOAL_TOO_LARGE");
        assert_eq!(resp.result["meta"]["rejected"], true);
        assert_eq!(primary.calls() + fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_intent() {
        let primary = FakeBackend::ok("browser");
        let resp = router(&primary, None)
            .run(request(json!({"intent": "checkout"}), None))
            .await;

        assert_eq!(resp.status, RunStatus::Error);
        assert_eq!(resp.result["meta"]["code"], "E_UNSUPPORTED_INTENT");
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_match_completes_with_choices() {
        let primary = FakeBackend::ok("browser");
        let resp = router(&primary, None)
            .run(request(json!("search for zzz-nonsense"), None))
            .await;

        assert_eq!(resp.status, RunStatus::Success);
        assert_eq!(resp.result["status"], "choices");
        assert_eq!(resp.result["categories"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_categories_and_health() {
        let primary = FakeBackend::ok("browser");
        let r = router(&primary, None);

        let resp = r.run(request(json!("list categories"), None)).await;
        assert_eq!(resp.result["categories"], json!(["Travel", "Poetry"]));
        assert_eq!(resp.result["count"], 2);

        let resp = r.run(request(json!({"intent": "health_check"}), None)).await;
        assert_eq!(resp.status, RunStatus::Success);
        assert_eq!(resp.result["status"], "ok");
        assert_eq!(resp.result["engine"], "browser");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_response_shape() {
        let primary = FakeBackend::ok("browser");
        let resp = router(&primary, None).run(request(json!("ping"), None)).await;
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["status"], "success");
        assert!(v["runId"].is_string());
        assert!(v["steps"].is_array());
        assert!(v["timings"]["startedMs"].is_i64());
    }
}
