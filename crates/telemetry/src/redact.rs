//! Payload redaction.
//!
//! Walks a JSON payload and scrubs PII and credentials from string values.
//! Values under sensitive keys are replaced wholesale. Long strings are
//! truncated so one oversized observation cannot bloat the event log.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Longest string value kept verbatim.
pub const MAX_VALUE_CHARS: usize = 2000;

const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

// ── Patterns ────────────────────────────────────────────────────────────

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("email pattern")
});

static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4}\b").expect("phone pattern")
});

static RE_BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("bearer pattern")
});

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}|\bgh[pousr]_[A-Za-z0-9]{20,}|\bxox[abprs]-[A-Za-z0-9-]{10,}")
        .expect("token pattern")
});

static RE_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:api[_-]?key|secret|password|passwd)\s*[:=]\s*\S+").expect("secret pattern")
});

static RE_SENSITIVE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:api[_-]?key|access[_-]?token|auth[_-]?token|refresh[_-]?token|token|secret|client[_-]?secret|password|passwd|authorization)$",
    )
    .expect("sensitive key pattern")
});

/// Scrubs telemetry payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Redact a payload. Returns the scrubbed value and whether anything
    /// changed.
    pub fn redact(&self, payload: &Value) -> (Value, bool) {
        let redacted = self.redact_value(payload);
        let changed = redacted != *payload;
        (redacted, changed)
    }

    fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.redact_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, entry) in map {
                    let scrubbed = if RE_SENSITIVE_KEY.is_match(key) && !entry.is_null() {
                        Value::String("[REDACTED]".into())
                    } else {
                        self.redact_value(entry)
                    };
                    out.insert(key.clone(), scrubbed);
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    /// Redact a single string.
    pub fn redact_str(&self, value: &str) -> String {
        let result = RE_EMAIL.replace_all(value, "[REDACTED_EMAIL]");
        let result = redact_phones(&result);
        let result = RE_BEARER.replace_all(&result, "Bearer [REDACTED]");
        let result = RE_TOKEN.replace_all(&result, "[REDACTED_TOKEN]");
        let result = RE_SECRET.replace_all(&result, "[REDACTED_SECRET]");

        if result.chars().count() > MAX_VALUE_CHARS {
            let head: String = result.chars().take(MAX_VALUE_CHARS).collect();
            format!("{head}{TRUNCATION_MARKER}")
        } else {
            result.into_owned()
        }
    }
}

/// Digits glued to letters, digits, `-` or `_` belong to an id, not a phone number.
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn redact_phones(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in RE_PHONE.find_iter(text) {
        let glued_before = text[..m.start()].chars().next_back().is_some_and(is_token_char);
        let glued_after = text[m.end()..].chars().next().is_some_and(is_token_char);
        if glued_before || glued_after {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str("[REDACTED_PHONE]");
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}
