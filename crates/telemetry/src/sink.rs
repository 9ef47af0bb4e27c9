//! Telemetry sinks: where events end up.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::TelemetryError;
use crate::event::TelemetryEvent;

/// Destination for telemetry events.
///
/// Sinks may fail; the [`crate::Telemetry`] facade absorbs the error.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;

    /// Flush buffered output, if any.
    fn flush(&self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── MemorySink ────────────────────────────────────────────────────────────

/// Keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, in emission order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        lock(&self.events).clone()
    }

    /// Events with the given name, in emission order.
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<String> {
        lock(&self.events).iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

// ── JsonlSink ─────────────────────────────────────────────────────────────

/// Appends one JSON object per line to a file.
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Open (or create) the file in append mode, creating parent dirs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let line = serde_json::to_string(event)?;
        let mut writer = lock(&self.writer);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), TelemetryError> {
        lock(&self.writer).flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink").field("path", &self.path).finish()
    }
}

// ── TracingSink ───────────────────────────────────────────────────────────

/// Forwards events to `tracing` as structured records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        tracing::info!(
            target: "sidekick::telemetry",
            event = %event.name,
            correlation_id = event.correlation_id.as_deref().unwrap_or("-"),
            payload = %event.payload,
            redacted = event.redaction_applied,
        );
        Ok(())
    }
}

// ── NoopSink ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}
