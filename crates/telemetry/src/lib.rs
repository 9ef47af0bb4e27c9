//! Structured telemetry for sidekick.
//!
//! Every orchestration phase emits a [`TelemetryEvent`] through the
//! [`Telemetry`] facade. Emission is fire-and-forget: a sink that fails is
//! logged and ignored, never surfaced to the caller. Payloads are scrubbed
//! by the [`Redactor`] before they leave the process.

pub mod event;
pub mod facade;
pub mod redact;
pub mod sink;
pub mod tracer;

pub use event::{ConversationMeta, EventContext, PromptMeta, TelemetryEvent, names};
pub use facade::Telemetry;
pub use redact::Redactor;
pub use sink::{JsonlSink, MemorySink, NoopSink, TelemetrySink, TracingSink};
pub use tracer::{StepRecord, StepStatus, WorkflowTracer};

/// Errors from the telemetry subsystem. Never escape [`Telemetry`].
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("telemetry sink unavailable: {0}")]
    Unavailable(String),
}
