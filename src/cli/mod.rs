use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "briefcast-tools",
    about = "Briefcast adapter tools - shared logging, redaction and transcription settings",
    version,
    long_about = "Command-line helpers used by the Briefcast media adapters. Every subcommand logs through the shared LOG_LEVEL/LOG_FORMAT/LOG_OUTPUT configuration, prints one JSON document on stdout and exits 0 on success, 1 on unexpected failure and 2 on bad input."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service name written into every log record
    #[arg(long, global = true, value_name = "NAME")]
    pub service: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Redact secret-bearing keys from a JSON document read on stdin
    Redact,

    /// Print the run timestamp used to name log files
    RunTimestamp,

    /// Resolve the WhisperX run configuration (model, device, batch size, diarization)
    WhisperxConfig {
        /// Audio file the run is for; must exist when given
        #[arg(value_name = "AUDIO_FILE")]
        audio: Option<PathBuf>,

        /// Skip the nvidia-smi probe and assume no GPU is available
        #[arg(long)]
        no_gpu_probe: bool,
    },

    /// Emit one log record through the shared logging configuration
    Emit {
        /// Severity of the record
        #[arg(short, long, value_enum, default_value = "info")]
        level: EmitLevel,

        /// Record message
        #[arg(short, long)]
        message: String,

        /// JSON object attached as redacted context
        #[arg(short, long, value_name = "JSON")]
        context: Option<String>,
    },

    /// Show the logging configuration resolved from the environment
    Config,
}

impl Commands {
    /// Service name used when `--service` is not given
    pub fn default_service(&self) -> &'static str {
        match self {
            Commands::Redact => "briefcast-redact",
            Commands::RunTimestamp | Commands::Config => "briefcast-tools",
            Commands::WhisperxConfig { .. } => "briefcast-whisperx",
            Commands::Emit { .. } => "briefcast-shell",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitLevel {
    Error,
    #[value(alias = "warn")]
    Warning,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for EmitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitLevel::Error => write!(f, "error"),
            EmitLevel::Warning => write!(f, "warning"),
            EmitLevel::Info => write!(f, "info"),
            EmitLevel::Debug => write!(f, "debug"),
            EmitLevel::Trace => write!(f, "trace"),
        }
    }
}
