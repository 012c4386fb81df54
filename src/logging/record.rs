use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::Level;

/// One log event, as handed to a formatter
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// When the event was emitted
    pub ts: DateTime<Utc>,

    pub level: Level,

    /// Name of the emitting logger (the tracing target)
    pub logger: String,

    pub message: String,

    /// Structured context attached at emission time
    pub context: Option<Value>,

    /// Rendered error chain, when the event carried one
    pub exception: Option<String>,
}

impl LogRecord {
    /// Create a record stamped with the current time
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            context: None,
            exception: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Upper-case level name as written to sinks
    pub fn level_name(&self) -> &'static str {
        level_name(&self.level)
    }
}

/// Level names use the long `WARNING` spelling shared with the other Briefcast services
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Render an error and its sources as `outer: inner: root`
pub fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
