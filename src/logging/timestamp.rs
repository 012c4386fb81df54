use chrono::Utc;

use crate::config::{EnvSource, LOG_RUN_TIMESTAMP_ENV};

const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const PLACEHOLDERS: [&str; 3] = ["{startup_ts}", "{timestamp}", "{run_ts}"];

/// Per-process run timestamp used to name log files.
///
/// Resolved once from `LOG_RUN_TIMESTAMP` (or the current UTC time), then
/// cached and exported so child processes log under the same run.
#[derive(Debug, Clone, Default)]
pub struct RunTimestamp {
    cached: Option<String>,
}

impl RunTimestamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, resolving and exporting it on first use
    pub fn resolve(&mut self, env: &dyn EnvSource) -> String {
        if let Some(cached) = &self.cached {
            return cached.clone();
        }

        let raw = env.var(LOG_RUN_TIMESTAMP_ENV).unwrap_or_default();
        let mut sanitized = sanitize_run_timestamp(&raw);
        if sanitized.is_empty() {
            sanitized = utc_run_timestamp();
        }

        env.export(LOG_RUN_TIMESTAMP_ENV, &sanitized);
        self.cached = Some(sanitized.clone());
        sanitized
    }

    /// Forget the cached value so the next `resolve` reads the environment again
    pub fn reset(&mut self) {
        self.cached = None;
    }

    pub fn cached(&self) -> Option<&str> {
        self.cached.as_deref()
    }
}

/// Keep only ASCII alphanumerics, `_` and `-`
pub fn sanitize_run_timestamp(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Substitute every run-timestamp placeholder in a log path template
pub fn expand_log_path(template: &str, timestamp: &str) -> String {
    PLACEHOLDERS
        .iter()
        .fold(template.trim().to_string(), |path, placeholder| {
            path.replace(placeholder, timestamp)
        })
}

fn utc_run_timestamp() -> String {
    Utc::now().format(RUN_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(value: &str) -> HashMap<String, String> {
        HashMap::from([(LOG_RUN_TIMESTAMP_ENV.to_string(), value.to_string())])
    }

    #[test]
    fn test_sanitize_run_timestamp() {
        assert_eq!(sanitize_run_timestamp("2024-05-01_12:30:00"), "2024-05-01_123000");
        assert_eq!(sanitize_run_timestamp(" run/42 "), "run42");
        assert_eq!(sanitize_run_timestamp("été"), "t");
        assert_eq!(sanitize_run_timestamp("::"), "");
    }

    #[test]
    fn test_resolve_uses_override() {
        let mut ts = RunTimestamp::new();
        assert_eq!(ts.resolve(&env_with("20240101-000000")), "20240101-000000");
    }

    #[test]
    fn test_resolve_is_cached_until_reset() {
        let mut ts = RunTimestamp::new();
        assert_eq!(ts.resolve(&env_with("first")), "first");
        assert_eq!(ts.resolve(&env_with("second")), "first");

        ts.reset();
        assert_eq!(ts.cached(), None);
        assert_eq!(ts.resolve(&env_with("second")), "second");
    }

    #[test]
    fn test_resolve_falls_back_to_utc_format() {
        let mut ts = RunTimestamp::new();
        let value = ts.resolve(&env_with("///"));
        assert_eq!(value.len(), "YYYYMMDD-HHMMSS".len());
        assert_eq!(value.as_bytes()[8], b'-');
        assert!(value.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_expand_log_path_replaces_all_placeholders() {
        assert_eq!(
            expand_log_path(" logs/{run_ts}/app-{timestamp}-{startup_ts}.log ", "R1"),
            "logs/R1/app-R1-R1.log"
        );
        assert_eq!(expand_log_path("plain.log", "R1"), "plain.log");
    }
}
