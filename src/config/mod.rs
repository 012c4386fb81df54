use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::level_filters::LevelFilter;

pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const LOG_OUTPUT_ENV: &str = "LOG_OUTPUT";
pub const LOG_RUN_TIMESTAMP_ENV: &str = "LOG_RUN_TIMESTAMP";
pub const LOG_FILE_MAX_SIZE_MB_ENV: &str = "LOG_FILE_MAX_SIZE_MB";
pub const LOG_FILE_MAX_BACKUPS_ENV: &str = "LOG_FILE_MAX_BACKUPS";

const DEFAULT_LOG_OUTPUT: &str = "stderr";
const FILE_PREFIX: &str = "file:";
const DEFAULT_MAX_SIZE_MB: i64 = 50;
const DEFAULT_MAX_BACKUPS: i64 = 7;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Source of configuration variables.
///
/// The process environment is the real source; tests pass a `HashMap` so they
/// never touch shared process state.
pub trait EnvSource {
    /// Look up a variable, `None` when unset
    fn var(&self, name: &str) -> Option<String>;

    /// Publish a resolved value so child processes inherit it
    fn export(&self, _name: &str, _value: &str) {}
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn export(&self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable records
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse format from string; anything but `json` is text
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a severity name, falling back to INFO for anything unrecognized
pub fn parse_log_level(raw: &str) -> LevelFilter {
    match raw.trim().to_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => LevelFilter::ERROR,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "INFO" => LevelFilter::INFO,
        "DEBUG" => LevelFilter::DEBUG,
        "TRACE" | "NOTSET" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Canonical upper-case name of a threshold, `WARNING` for warn
pub fn level_filter_name(level: LevelFilter) -> &'static str {
    match level.into_level() {
        None => "OFF",
        Some(level) if level == tracing::Level::ERROR => "ERROR",
        Some(level) if level == tracing::Level::WARN => "WARNING",
        Some(level) if level == tracing::Level::INFO => "INFO",
        Some(level) if level == tracing::Level::DEBUG => "DEBUG",
        Some(_) => "TRACE",
    }
}

fn serialize_level<S: Serializer>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level_filter_name(*level))
}

/// A single parsed `LOG_OUTPUT` token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSpec {
    Stdout,
    Stderr,
    /// Path template, placeholders not yet expanded
    File(String),
}

impl OutputSpec {
    /// Parse one token. Returns `None` for tokens that name no destination.
    pub fn parse(token: &str) -> Option<Self> {
        let value = token.trim();
        if value.is_empty() {
            return None;
        }

        match value.to_lowercase().as_str() {
            "stdout" => return Some(OutputSpec::Stdout),
            "stderr" => return Some(OutputSpec::Stderr),
            _ => {}
        }

        let path = match value.get(..FILE_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(FILE_PREFIX) => &value[FILE_PREFIX.len()..],
            _ => value,
        };
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        Some(OutputSpec::File(path.to_string()))
    }
}

/// Split a comma-separated output list, dropping blank tokens.
///
/// Never returns an empty list: with nothing left the default `stderr`
/// token is used.
pub fn parse_log_outputs(raw: &str) -> Vec<String> {
    let outputs: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    if outputs.is_empty() {
        vec![DEFAULT_LOG_OUTPUT.to_string()]
    } else {
        outputs
    }
}

/// Read an integer variable, returning `fallback` when unset or malformed
pub fn parse_int_env(env: &dyn EnvSource, name: &str, fallback: i64) -> i64 {
    let raw = env.var(name).unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return fallback;
    }
    raw.parse().unwrap_or(fallback)
}

/// Rotation limits for file outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RotationPolicy {
    /// Size at which the active file is rolled over
    pub max_bytes: u64,

    /// Number of rotated files kept beside the active one
    pub max_backups: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SIZE_MB as u64 * BYTES_PER_MB,
            max_backups: DEFAULT_MAX_BACKUPS as usize,
        }
    }
}

impl RotationPolicy {
    /// Read `LOG_FILE_MAX_SIZE_MB` (floor 1) and `LOG_FILE_MAX_BACKUPS` (floor 0)
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let size_mb = parse_int_env(env, LOG_FILE_MAX_SIZE_MB_ENV, DEFAULT_MAX_SIZE_MB).max(1);
        let backups = parse_int_env(env, LOG_FILE_MAX_BACKUPS_ENV, DEFAULT_MAX_BACKUPS).max(0);

        Self {
            max_bytes: (size_mb as u64).saturating_mul(BYTES_PER_MB),
            max_backups: backups as usize,
        }
    }
}

/// Logging settings resolved from the environment.
///
/// Every field has a default and malformed values fall back to it, so
/// building settings never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSettings {
    /// Severity threshold
    #[serde(serialize_with = "serialize_level")]
    pub level: LevelFilter,

    /// Record format shared by all outputs
    pub format: LogFormat,

    /// Output destinations, in `LOG_OUTPUT` order
    pub outputs: Vec<OutputSpec>,

    /// Limits applied to every file output
    pub rotation: RotationPolicy,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Text,
            outputs: vec![OutputSpec::Stderr],
            rotation: RotationPolicy::default(),
        }
    }
}

impl LogSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnv)
    }

    /// Load settings from any variable source
    pub fn from_source(env: &dyn EnvSource) -> Self {
        let level = env
            .var(LOG_LEVEL_ENV)
            .map(|raw| parse_log_level(&raw))
            .unwrap_or(LevelFilter::INFO);
        let format = env
            .var(LOG_FORMAT_ENV)
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        let raw_outputs = env
            .var(LOG_OUTPUT_ENV)
            .unwrap_or_else(|| DEFAULT_LOG_OUTPUT.to_string());
        let outputs = parse_log_outputs(&raw_outputs)
            .iter()
            .filter_map(|token| OutputSpec::parse(token))
            .collect();

        Self {
            level,
            format,
            outputs,
            rotation: RotationPolicy::from_env(env),
        }
    }
}
