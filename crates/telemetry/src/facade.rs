//! The non-throwing telemetry entry point used by every component.

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::event::{EventContext, TelemetryEvent};
use crate::redact::Redactor;
use crate::sink::{NoopSink, TelemetrySink};

/// Cheap-to-clone handle over a sink.
///
/// [`Telemetry::event`] never fails and never panics on sink errors: the
/// error is logged at `warn` and dropped.
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    redactor: Option<Redactor>,
    enabled: bool,
}

impl Telemetry {
    /// Emit to `sink` with redaction on.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            redactor: Some(Redactor::new()),
            enabled: true,
        }
    }

    /// A handle that drops everything.
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NoopSink),
            redactor: None,
            enabled: false,
        }
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redactor = enabled.then(Redactor::new);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event. Fire-and-forget.
    pub fn event(&self, name: &str, payload: Value, context: &EventContext) {
        if !self.enabled {
            return;
        }

        let mut event = TelemetryEvent::new(name, payload, context);
        if let Some(redactor) = &self.redactor {
            let (payload, changed) = redactor.redact(&event.payload);
            event.payload = payload;
            event.redaction_applied = changed;
        }

        if let Err(e) = self.sink.record(&event) {
            warn!(event = %name, error = %e, "Telemetry sink failed; event dropped");
        }
    }

    /// Flush the sink, logging any failure.
    pub fn flush(&self) {
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "Telemetry flush failed");
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.enabled)
            .field("redaction", &self.redactor.is_some())
            .finish()
    }
}
