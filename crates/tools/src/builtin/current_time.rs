//! Current time tool.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Value, json};
use sidekick_core::{Tool, ToolArgs, ToolError};

/// Reports the current date and time.
#[derive(Debug, Default, Clone)]
pub struct CurrentTimeTool {
    fixed: Option<DateTime<Utc>>,
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always report `instant` instead of the system clock.
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        Self {
            fixed: Some(instant),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed.unwrap_or_else(Utc::now)
    }

    fn fail(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time, optionally shifted to a UTC offset."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "enum": ["rfc3339", "unix", "human"],
                    "description": "Output format (default rfc3339)"
                },
                "utc_offset_minutes": {
                    "type": "integer",
                    "description": "Offset from UTC in minutes, e.g. 120 for UTC+2"
                }
            }
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["time".into()]
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let minutes = args
            .get("utc_offset_minutes")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if !(-720..=840).contains(&minutes) {
            return Err(self.fail(format!("utc_offset_minutes {minutes} is outside -720..=840")));
        }
        let offset = FixedOffset::east_opt(minutes as i32 * 60)
            .ok_or_else(|| self.fail(format!("invalid offset {minutes}")))?;
        let local = self.now().with_timezone(&offset);

        let text = match args.get("format").and_then(Value::as_str).unwrap_or("rfc3339") {
            "unix" => local.timestamp().to_string(),
            "human" => local.format("%A, %B %-d, %Y %H:%M (UTC%:z)").to_string(),
            _ => local.to_rfc3339(),
        };
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tool() -> CurrentTimeTool {
        CurrentTimeTool::fixed(Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap())
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn defaults_to_rfc3339_utc() {
        let out = tool().execute(ToolArgs::new()).await.unwrap();
        assert_eq!(out, json!("2026-03-14T09:26:53+00:00"));
    }

    #[tokio::test]
    async fn applies_offset_and_formats() {
        let out = tool()
            .execute(args(json!({"format": "human", "utc_offset_minutes": 120})))
            .await
            .unwrap();
        assert_eq!(out, json!("Saturday, March 14, 2026 11:26 (UTC+02:00)"));

        let out = tool().execute(args(json!({"format": "unix"}))).await.unwrap();
        assert_eq!(out, json!("1773480413"));
    }

    #[tokio::test]
    async fn rejects_out_of_range_offset() {
        let err = tool()
            .execute(args(json!({"utc_offset_minutes": 5000})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution_failed");
    }
}
