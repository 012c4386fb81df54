//! Briefcast Tools - shared plumbing for the Briefcast media adapters
//!
//! The adapters wrap third-party feed, tag and transcription tooling and report
//! results as JSON. This library gives them one logging configuration
//! (environment-driven sinks, text or JSON records, secret redaction, rotating
//! run-stamped files), the shared exit-code conventions and the WhisperX run
//! settings.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod logging;
pub mod whisperx;

pub use adapter::{AdapterError, AdapterExit, ErrorPayload};
pub use cli::{Cli, Commands, EmitLevel};
pub use config::{LogFormat, LogSettings};
pub use logging::{log_extra, redact_sensitive, LogExtra, LoggingError, LoggingService, REDACTED};
pub use whisperx::RunPlan;

/// Result type used by the binary
pub type Result<T> = anyhow::Result<T>;
