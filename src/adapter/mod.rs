//! Conventions shared by the command-line adapters: one JSON payload on
//! stdout, an `{"error": ...}` body on failure, and exit codes
//! `0` (success), `1` (unexpected failure) and `2` (usage or precondition).

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::ExitCode;

/// Exit status reported by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterExit {
    Success = 0,
    Failure = 1,
    Usage = 2,
}

impl AdapterExit {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<AdapterExit> for ExitCode {
    fn from(exit: AdapterExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Body written to stdout when an adapter fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Adapter failures, split by the exit code they map to
#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    /// Bad arguments or a missing precondition
    #[error("{0}")]
    Usage(String),

    /// Anything that went wrong after the inputs were accepted
    #[error("{0}")]
    Failure(String),
}

impl AdapterError {
    pub fn usage(message: impl Into<String>) -> Self {
        AdapterError::Usage(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        AdapterError::Failure(message.into())
    }

    pub fn exit(&self) -> AdapterExit {
        match self {
            AdapterError::Usage(_) => AdapterExit::Usage,
            AdapterError::Failure(_) => AdapterExit::Failure,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: self.to_string(),
        }
    }
}

/// Write one compact JSON document followed by a newline
pub fn write_json<W, T>(writer: &mut W, payload: &T) -> io::Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer(&mut *writer, payload)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Report an adapter outcome on `writer` and return the matching exit code
pub fn conclude_to<W, T>(writer: &mut W, outcome: Result<T, AdapterError>) -> AdapterExit
where
    W: Write,
    T: Serialize,
{
    let (written, exit) = match outcome {
        Ok(payload) => (write_json(writer, &payload), AdapterExit::Success),
        Err(err) => {
            match err.exit() {
                AdapterExit::Usage => tracing::warn!(error = %err, "adapter precondition failed"),
                _ => tracing::error!(error = %err, "adapter failed"),
            }
            (write_json(writer, &err.payload()), err.exit())
        }
    };

    match written {
        Ok(()) => exit,
        Err(err) => {
            tracing::error!(error = %err, "failed to write adapter output");
            AdapterExit::Failure
        }
    }
}

/// Report an adapter outcome on stdout
pub fn conclude<T: Serialize>(outcome: Result<T, AdapterError>) -> AdapterExit {
    conclude_to(&mut io::stdout().lock(), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AdapterExit::Success.code(), 0);
        assert_eq!(AdapterExit::Failure.code(), 1);
        assert_eq!(AdapterExit::Usage.code(), 2);
        assert_eq!(AdapterError::usage("missing audio path").exit(), AdapterExit::Usage);
        assert_eq!(AdapterError::failure("whisperx_failed").exit(), AdapterExit::Failure);
    }

    #[test]
    fn test_write_json_is_single_line() {
        let mut out = Vec::new();
        write_json(&mut out, &json!({"tags": {}, "chapters": []})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"chapters\":[],\"tags\":{}}\n");
    }

    #[test]
    fn test_conclude_success() {
        let mut out = Vec::new();
        let exit = conclude_to(&mut out, Ok::<_, AdapterError>(json!({"ok": true})));
        assert_eq!(exit, AdapterExit::Success);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"ok\":true}\n");
    }

    #[test]
    fn test_conclude_usage_error_writes_payload() {
        let mut out = Vec::new();
        let exit = conclude_to::<_, serde_json::Value>(
            &mut out,
            Err(AdapterError::usage("audio file not found")),
        );
        assert_eq!(exit, AdapterExit::Usage);

        let payload: ErrorPayload = serde_json::from_slice(&out).unwrap();
        assert_eq!(payload.error, "audio file not found");
    }

    #[test]
    fn test_conclude_failure_exit() {
        let mut out = Vec::new();
        let exit = conclude_to::<_, serde_json::Value>(&mut out, Err(AdapterError::failure("boom")));
        assert_eq!(exit, AdapterExit::Failure);
    }
}
