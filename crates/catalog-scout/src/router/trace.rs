//! Per-run execution trace.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Router states a step can leave the run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Received,
    IntentResolved,
    ExecutingBrowser,
    ExecutingFallback,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// One recorded transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    pub action: String,
    pub state: RunState,
    pub started_ms: i64,
    pub ended_ms: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub started_ms: i64,
    pub ended_ms: i64,
    pub duration_ms: i64,
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Everything that happened during one goal run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub run_id: Uuid,
    pub steps: Vec<StepLog>,
    pub timings: Timings,
}

impl ExecutionTrace {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            steps: Vec::new(),
            timings: Timings {
                started_ms: now_ms(),
                ..Timings::default()
            },
        }
    }

    /// Append a step that began at `started_ms` and ends now.
    pub fn record(
        &mut self,
        action: &str,
        state: RunState,
        started_ms: i64,
        status: &str,
        detail: Option<String>,
    ) {
        let ended_ms = now_ms();
        tracing::debug!(
            run_id = %self.run_id,
            action,
            state = ?state,
            status,
            elapsed_ms = ended_ms - started_ms,
            detail = detail.as_deref().unwrap_or(""),
            "router transition"
        );
        self.steps.push(StepLog {
            action: action.to_string(),
            state,
            started_ms,
            ended_ms,
            status: status.to_string(),
            detail,
        });
    }

    /// State after the last recorded step.
    pub fn state(&self) -> RunState {
        self.steps.last().map_or(RunState::Received, |s| s.state)
    }

    /// Close the trace. A run that never reached a terminal state is
    /// recorded as failed.
    pub fn finish(&mut self) {
        if !self.state().is_terminal() {
            let started = self.steps.last().map_or(self.timings.started_ms, |s| s.ended_ms);
            let detail = Some("run ended before reaching a terminal state".to_string());
            self.record("complete", RunState::Failed, started, "error", detail);
        }
        let ended = now_ms();
        self.timings.ended_ms = ended;
        self.timings.duration_ms = (ended - self.timings.started_ms).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_serializes_camel_case() {
        let mut trace = ExecutionTrace::start();
        let t0 = now_ms();
        trace.record("parse_goal", RunState::IntentResolved, t0, "ok", None);
        trace.record("search", RunState::Failed, t0, "error", Some("boom".into()));
        trace.finish();

        assert_eq!(trace.state(), RunState::Failed);
        let v = serde_json::to_value(&trace).unwrap();
        assert_eq!(v["runId"].as_str().unwrap().len(), 36);
        assert_eq!(v["steps"][0]["state"], "intent_resolved");
        assert!(v["steps"][0].get("detail").is_none());
        assert_eq!(v["steps"][1]["detail"], "boom");
        assert!(v["timings"]["durationMs"].as_i64().unwrap() >= 0);
        assert!(v["steps"][1]["endedMs"].as_i64().unwrap() >= t0);
    }

    #[test]
    fn test_unfinished_run_is_closed_as_failed() {
        let mut trace = ExecutionTrace::start();
        let t0 = now_ms();
        trace.record("search_product", RunState::ExecutingBrowser, t0, "error", None);
        trace.finish();

        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.state(), RunState::Failed);

        let mut done = ExecutionTrace::start();
        done.record("health", RunState::Completed, t0, "ok", None);
        done.finish();
        assert_eq!(done.steps.len(), 1);
    }
}
