//! Current date and time in a named timezone.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use crate::error::Result;
use crate::message::ToolArguments;
use crate::tool::Tool;

pub const TIME_TOOL_NAME: &str = "get_current_time";

/// Prefix of the payload returned for an unrecognised timezone.
pub const TIME_ERROR_MARKER: &str = "Time lookup failed:";

pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone)]
pub struct ClockTool {
    clock: Arc<dyn Clock>,
    default_timezone: String,
}

impl Default for ClockTool {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ClockTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    pub fn with_default_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.default_timezone = timezone.into();
        self
    }

    /// Render the current time in `timezone`, or a [`TIME_ERROR_MARKER`] payload.
    pub fn current_time(&self, timezone: Option<&str>) -> String {
        let name = timezone
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(self.default_timezone.as_str());

        let tz: Tz = match name.parse() {
            Ok(tz) => tz,
            Err(_) => {
                return format!(
                    "{TIME_ERROR_MARKER} unknown timezone `{name}`. Use an IANA name such as Asia/Shanghai, Europe/London or America/New_York."
                )
            }
        };

        let local = self.clock.now().with_timezone(&tz);
        format!(
            "Timezone: {name}\nDate: {}\nTime: {}\nWeekday: {}\nTimestamp: {}",
            local.format("%Y-%m-%d"),
            local.format("%H:%M:%S"),
            local.format("%A"),
            local.to_rfc3339(),
        )
    }
}

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        TIME_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current date, time and weekday in a timezone. Use this for questions about today, now, or anything relative to the current date."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone name, e.g. Asia/Shanghai or America/New_York. Defaults to Asia/Shanghai."
                }
            }
        }))
    }

    async fn call(&self, arguments: &ToolArguments) -> Result<String> {
        Ok(self.current_time(arguments.get("timezone").map(String::as_str)))
    }
}
