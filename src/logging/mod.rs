//! Process-wide logging configuration shared by every Briefcast adapter.
//!
//! An adapter creates one [`LoggingService`] at startup and calls
//! [`LoggingService::setup_logging`] once. From then on every `tracing` event
//! in the process is formatted (text or JSON) and written to the sinks named
//! by `LOG_OUTPUT`. Context attached through [`log_extra`] is redacted first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::{EnvSource, LogSettings, OutputSpec, ProcessEnv};

pub mod formatter;
pub mod layer;
pub mod record;
pub mod redact;
pub mod sink;
pub mod timestamp;

pub use formatter::{Formatter, JsonFormatter, TextFormatter};
pub use layer::RecordLayer;
pub use record::LogRecord;
pub use redact::{
    is_sensitive_key, log_extra, redact_serializable, redact_sensitive, LogExtra,
    RedactSensitive, REDACTED,
};
pub use sink::{RotatingFileSink, Sink, SinkKind, StreamSink};
pub use timestamp::RunTimestamp;

/// Errors raised while configuring logging
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    SinkOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install global log subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Level, formatter and sinks currently receiving records
pub(crate) struct Pipeline {
    level: LevelFilter,
    formatter: Formatter,
    sinks: Vec<Sink>,
}

impl Pipeline {
    fn unconfigured() -> Self {
        Self {
            level: LevelFilter::OFF,
            formatter: Formatter::new(Default::default(), ""),
            sinks: Vec::new(),
        }
    }

    pub(crate) fn enabled(&self, level: &Level) -> bool {
        *level <= self.level
    }

    pub(crate) fn emit(&mut self, record: &LogRecord) {
        let line = self.formatter.format(record);
        for sink in &mut self.sinks {
            if let Err(err) = sink.write_line(&line) {
                eprintln!("log sink {:?} write failed: {}", sink.kind(), err);
            }
        }
    }

    /// Swap in a new configuration, flushing the old sinks before they drop
    fn replace(&mut self, level: LevelFilter, formatter: Formatter, sinks: Vec<Sink>) {
        for sink in &mut self.sinks {
            let _ = sink.flush();
        }
        self.level = level;
        self.formatter = formatter;
        self.sinks = sinks;
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            let _ = sink.flush();
        }
    }
}

#[derive(Default)]
struct ServiceState {
    configured: bool,
    installed: bool,
    generation: u64,
    run_timestamp: RunTimestamp,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the process's logging configuration.
///
/// Cloning yields another handle to the same configuration.
#[derive(Clone)]
pub struct LoggingService {
    state: Arc<Mutex<ServiceState>>,
    pipeline: Arc<Mutex<Pipeline>>,
}

impl Default for LoggingService {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceState::default())),
            pipeline: Arc::new(Mutex::new(Pipeline::unconfigured())),
        }
    }

    /// Configure logging from the process environment and install the
    /// global subscriber.
    ///
    /// Repeated calls are no-ops unless `force` is set, in which case the
    /// cached run timestamp is dropped and every sink is rebuilt.
    pub fn setup_logging(&self, service_name: &str, force: bool) -> Result<(), LoggingError> {
        self.configure(service_name, force, &ProcessEnv)?;
        self.install()
    }

    /// Configure the pipeline from `env` without touching the global subscriber
    pub fn configure(
        &self,
        service_name: &str,
        force: bool,
        env: &dyn EnvSource,
    ) -> Result<(), LoggingError> {
        let mut state = lock(&self.state);
        if state.configured && !force {
            return Ok(());
        }
        if force {
            state.run_timestamp.reset();
        }

        let settings = LogSettings::from_source(env);
        let formatter = Formatter::new(settings.format, service_name);

        let mut sinks = Vec::with_capacity(settings.outputs.len());
        for output in &settings.outputs {
            let sink = match output {
                OutputSpec::Stdout => Sink::stdout(),
                OutputSpec::Stderr => Sink::stderr(),
                OutputSpec::File(template) => {
                    let run_ts = state.run_timestamp.resolve(env);
                    let path = timestamp::expand_log_path(template, &run_ts);
                    if path.is_empty() {
                        continue;
                    }
                    let sink = RotatingFileSink::open(&path, settings.rotation)
                        .map_err(|source| LoggingError::SinkOpen { path, source })?;
                    Sink::RotatingFile(sink)
                }
            };
            sinks.push(sink);
        }

        if sinks.is_empty() {
            sinks.push(Sink::stderr());
        }

        lock(&self.pipeline).replace(settings.level, formatter, sinks);
        state.configured = true;
        state.generation += 1;
        Ok(())
    }

    /// Install [`RecordLayer`] as the global subscriber, once per service
    pub fn install(&self) -> Result<(), LoggingError> {
        let mut state = lock(&self.state);
        if state.installed {
            return Ok(());
        }
        tracing_subscriber::registry().with(self.layer()).try_init()?;
        state.installed = true;
        Ok(())
    }

    /// A layer feeding this service's pipeline, for composing custom subscribers
    pub fn layer(&self) -> RecordLayer {
        RecordLayer::new(Arc::clone(&self.pipeline))
    }

    pub fn is_configured(&self) -> bool {
        lock(&self.state).configured
    }

    /// Number of configuration passes applied so far
    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Run timestamp for this process, resolved from the environment on first use
    pub fn run_timestamp(&self) -> String {
        self.run_timestamp_from(&ProcessEnv)
    }

    pub fn run_timestamp_from(&self, env: &dyn EnvSource) -> String {
        lock(&self.state).run_timestamp.resolve(env)
    }

    pub fn sinks(&self) -> Vec<SinkKind> {
        lock(&self.pipeline).sinks.iter().map(Sink::kind).collect()
    }

    pub fn level(&self) -> LevelFilter {
        lock(&self.pipeline).level
    }

    pub fn format(&self) -> crate::config::LogFormat {
        lock(&self.pipeline).formatter.format_kind()
    }

    /// Flush every installed sink
    pub fn flush(&self) {
        lock(&self.pipeline).flush();
    }
}
