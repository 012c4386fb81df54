//! Text and JSON renderings of a [`LogRecord`].

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use super::record::LogRecord;
use super::redact::redact_sensitive;
use crate::config::LogFormat;

/// Formatter selected once per configuration pass
#[derive(Debug, Clone)]
pub enum Formatter {
    Text(TextFormatter),
    Json(JsonFormatter),
}

impl Formatter {
    pub fn new(format: LogFormat, service_name: &str) -> Self {
        match format {
            LogFormat::Text => Formatter::Text(TextFormatter::new(service_name)),
            LogFormat::Json => Formatter::Json(JsonFormatter::new(service_name)),
        }
    }

    /// Render one record as a single line, without the trailing newline
    pub fn format(&self, record: &LogRecord) -> String {
        match self {
            Formatter::Text(formatter) => formatter.format(record),
            Formatter::Json(formatter) => formatter.format(record),
        }
    }

    pub fn format_kind(&self) -> LogFormat {
        match self {
            Formatter::Text(_) => LogFormat::Text,
            Formatter::Json(_) => LogFormat::Json,
        }
    }
}

/// `<ts> <LEVEL> <service> <logger> <message>[ context=<json>][ exception=<error>]`
#[derive(Debug, Clone)]
pub struct TextFormatter {
    service_name: String,
}

impl TextFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn format(&self, record: &LogRecord) -> String {
        let mut line = format!(
            "{} {} {} {} {}",
            timestamp(record),
            record.level_name(),
            self.service_name,
            record.logger,
            record.message
        );

        if let Some(context) = context(record) {
            line.push_str(" context=");
            line.push_str(&context.to_string());
        }

        if let Some(exception) = &record.exception {
            line.push_str(" exception=");
            line.push_str(exception);
        }

        line
    }
}

/// One JSON object per record
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    service_name: String,
}

#[derive(Serialize)]
struct JsonPayload<'a> {
    ts: String,
    level: &'a str,
    service: &'a str,
    logger: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn format(&self, record: &LogRecord) -> String {
        let payload = JsonPayload {
            ts: timestamp(record),
            level: record.level_name(),
            service: &self.service_name,
            logger: &record.logger,
            message: &record.message,
            context: context(record),
            exception: record.exception.as_deref(),
        };

        // Every field is already JSON-native, so this only guards against serde_json itself
        serde_json::to_string(&payload).unwrap_or_else(|err| {
            serde_json::json!({
                "ts": payload.ts,
                "level": payload.level,
                "service": payload.service,
                "logger": payload.logger,
                "message": payload.message,
                "format_error": err.to_string(),
            })
            .to_string()
        })
    }
}

/// ISO 8601 in UTC with microseconds and an explicit `+00:00` offset
fn timestamp(record: &LogRecord) -> String {
    record.ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Context is redacted again at format time so raw fields never reach a sink
fn context(record: &LogRecord) -> Option<Value> {
    record.context.as_ref().map(redact_sensitive)
}
