use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::record::{render_error_chain, LogRecord};
use super::{lock, Pipeline};

/// Tracing layer that turns events into [`LogRecord`]s and hands them to the
/// service's current pipeline.
///
/// The pipeline is looked up per event, so reconfiguring the service takes
/// effect without reinstalling the subscriber.
#[derive(Clone)]
pub struct RecordLayer {
    pipeline: Arc<Mutex<Pipeline>>,
}

impl RecordLayer {
    pub(crate) fn new(pipeline: Arc<Mutex<Pipeline>>) -> Self {
        Self { pipeline }
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut pipeline = lock(&self.pipeline);
        if !pipeline.enabled(metadata.level()) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        pipeline.emit(&visitor.into_record(metadata));
    }
}

/// Collects an event's fields.
///
/// `message` becomes the record message, `context` is parsed back from the
/// JSON rendered by `LogExtra`, `exception`/`error` become the exception text
/// and every other field is folded into the context object.
#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    context: Option<Value>,
    exception: Option<String>,
    fields: Map<String, Value>,
}

impl RecordVisitor {
    fn record_text(&mut self, field: &Field, text: String) {
        match field.name() {
            "message" => self.message = Some(text),
            "context" => self.context = parse_context(&text),
            "exception" | "error" => self.exception = Some(text),
            name => {
                self.fields.insert(name.to_string(), Value::String(text));
            }
        }
    }

    fn record_value(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" | "context" | "exception" | "error" => {
                self.record_text(field, value.to_string())
            }
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    fn into_record(self, metadata: &Metadata<'_>) -> LogRecord {
        let mut record = LogRecord::new(
            *metadata.level(),
            metadata.target(),
            self.message.unwrap_or_default(),
        );
        record.context = merge_fields(self.context, self.fields);
        record.exception = self.exception;
        record
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.record_value(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.record_text(field, render_error_chain(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}

fn parse_context(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Fold loose event fields into the context object.
///
/// A non-object context is kept under the `context` key of the merged object.
/// Keys already present in the context win over same-named fields.
fn merge_fields(context: Option<Value>, fields: Map<String, Value>) -> Option<Value> {
    if fields.is_empty() {
        return context;
    }

    let mut merged = match context {
        Some(Value::Object(map)) => map,
        Some(other) => Map::from_iter([("context".to_string(), other)]),
        None => Map::new(),
    };
    for (key, value) in fields {
        merged.entry(key).or_insert(value);
    }
    Some(Value::Object(merged))
}
