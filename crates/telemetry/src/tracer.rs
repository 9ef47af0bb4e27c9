//! Workflow step tracing.
//!
//! A run is a sequence of named steps (retrieve, build_prompt, model_call,
//! execute_tools, persist). Each step is timed from `start_step` to
//! `end_step`/`fail_step` and reported as a `workflow_step` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{EventContext, names};
use crate::facade::Telemetry;

// ── Step ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One timed phase of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub status: StepStatus,
    pub payload: Map<String, Value>,
    pub error: Option<String>,
}

impl StepRecord {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            status: StepStatus::Running,
            payload: Map::new(),
            error: None,
        }
    }

    fn finish(&mut self, status: StepStatus) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.status = status;
    }

    fn merge(&mut self, payload: Value) {
        if let Value::Object(map) = payload {
            self.payload.extend(map);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tracer ────────────────────────────────────────────────────────────────

/// Per-run step tracer bound to one correlation context.
pub struct WorkflowTracer {
    telemetry: Telemetry,
    context: EventContext,
    active: Mutex<HashMap<String, StepRecord>>,
    finished: Mutex<Vec<StepRecord>>,
}

impl WorkflowTracer {
    pub fn new(telemetry: Telemetry, context: EventContext) -> Self {
        Self {
            telemetry,
            context,
            active: Mutex::new(HashMap::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    pub fn set_context(&mut self, context: EventContext) {
        self.context = context;
    }

    /// Begin a step. Returns its id.
    pub fn start_step(&self, name: &str, payload: Value) -> String {
        let mut step = StepRecord::new(name);
        step.merge(payload);
        let id = step.id.clone();
        debug!(step = %name, step_id = %id, "Step started");
        lock(&self.active).insert(id.clone(), step);
        id
    }

    /// Complete a step, merging `payload` into what it started with.
    pub fn end_step(&self, id: &str, payload: Value) -> Option<StepRecord> {
        self.close(id, StepStatus::Completed, payload, None)
    }

    /// Mark a step failed.
    pub fn fail_step(&self, id: &str, error: &str) -> Option<StepRecord> {
        self.close(id, StepStatus::Failed, Value::Null, Some(error.to_string()))
    }

    /// Run `fut` inside a step, ending or failing it by outcome.
    pub async fn scoped<T, E, F>(&self, name: &str, fut: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let id = self.start_step(name, Value::Null);
        let result = fut.await;
        match &result {
            Ok(_) => {
                self.end_step(&id, Value::Null);
            }
            Err(e) => {
                self.fail_step(&id, &e.to_string());
            }
        }
        result
    }

    /// Steps finished so far, in completion order.
    pub fn steps(&self) -> Vec<StepRecord> {
        lock(&self.finished).clone()
    }

    fn close(
        &self,
        id: &str,
        status: StepStatus,
        payload: Value,
        error: Option<String>,
    ) -> Option<StepRecord> {
        let Some(mut step) = lock(&self.active).remove(id) else {
            warn!(step_id = %id, "Attempted to close unknown step");
            return None;
        };
        step.merge(payload);
        step.error = error;
        step.finish(status);

        let mut event_payload = json!({
            "step": step.name,
            "step_id": step.id,
            "status": step.status,
            "duration_ms": step.duration_ms,
        });
        if let Value::Object(map) = &mut event_payload {
            if !step.payload.is_empty() {
                map.insert("data".into(), Value::Object(step.payload.clone()));
            }
            if let Some(err) = &step.error {
                map.insert("error".into(), Value::String(err.clone()));
            }
        }
        self.telemetry
            .event(names::WORKFLOW_STEP, event_payload, &self.context);

        lock(&self.finished).push(step.clone());
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    fn tracer() -> (WorkflowTracer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(sink.clone());
        (WorkflowTracer::new(telemetry, EventContext::new("corr")), sink)
    }

    #[test]
    fn start_and_end_records_duration() {
        let (tracer, sink) = tracer();
        let id = tracer.start_step("retrieve", json!({"query_chars": 12}));
        let step = tracer.end_step(&id, json!({"hits": 2})).unwrap();

        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.duration_ms.is_some());
        assert_eq!(step.payload["query_chars"], 12);
        assert_eq!(step.payload["hits"], 2);

        let events = sink.named("workflow_step");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["step"], "retrieve");
        assert_eq!(events[0].payload["status"], "completed");
        assert_eq!(events[0].correlation_id.as_deref(), Some("corr"));
    }

    #[test]
    fn fail_step_records_error() {
        let (tracer, sink) = tracer();
        let id = tracer.start_step("model_call", Value::Null);
        let step = tracer.fail_step(&id, "connection refused").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(sink.events()[0].payload["error"], "connection refused");
    }

    #[test]
    fn unknown_step_is_ignored() {
        let (tracer, sink) = tracer();
        assert!(tracer.end_step("nope", Value::Null).is_none());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn scoped_step_follows_outcome() {
        let (tracer, _sink) = tracer();
        let ok: Result<u32, String> = tracer.scoped("persist", async { Ok(1) }).await;
        let err: Result<u32, String> = tracer.scoped("persist", async { Err("boom".into()) }).await;
        assert_eq!(ok.unwrap(), 1);
        assert!(err.is_err());

        let steps = tracer.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[1].status, StepStatus::Failed);
        assert_eq!(steps[1].error.as_deref(), Some("boom"));
    }
}
