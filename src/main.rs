use clap::Parser;
use serde_json::{json, Value};
use std::path::Path;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;

use briefcast_tools::adapter::{self, AdapterError};
use briefcast_tools::whisperx::{self, RunPlan, WHISPERX_CONFIG_ENV, WHISPERX_HF_TOKEN_ENV};
use briefcast_tools::{log_extra, redact_sensitive, Cli, Commands, EmitLevel, LogSettings, LoggingService, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let logging = LoggingService::new();
    let service_name = cli
        .service
        .clone()
        .unwrap_or_else(|| cli.command.default_service().to_string());
    logging.setup_logging(&service_name, false)?;

    let exit = match cli.command {
        Commands::Redact => adapter::conclude(redact_stdin().await),
        Commands::RunTimestamp => adapter::conclude(Ok::<_, AdapterError>(json!({
            "run_timestamp": logging.run_timestamp(),
        }))),
        Commands::WhisperxConfig {
            audio,
            no_gpu_probe,
        } => adapter::conclude(resolve_whisperx(audio.as_deref(), no_gpu_probe).await),
        Commands::Emit {
            level,
            message,
            context,
        } => adapter::conclude(emit(level, &message, context.as_deref())),
        Commands::Config => adapter::conclude(Ok::<_, AdapterError>(LogSettings::from_env())),
    };

    logging.flush();
    Ok(exit.into())
}

async fn redact_stdin() -> std::result::Result<Value, AdapterError> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .map_err(|err| AdapterError::failure(format!("failed to read stdin: {}", err)))?;

    tracing::debug!(
        context = %log_extra(Some(&json!({"input_bytes": raw.len()}))),
        "redacting json payload"
    );

    let value: Value =
        serde_json::from_str(&raw).map_err(|_| AdapterError::usage("invalid json input"))?;
    Ok(redact_sensitive(&value))
}

async fn resolve_whisperx(
    audio: Option<&Path>,
    no_gpu_probe: bool,
) -> std::result::Result<RunPlan, AdapterError> {
    if let Some(audio) = audio {
        if !audio.exists() {
            tracing::error!(
                context = %log_extra(Some(&json!({"audio_file": audio.display().to_string()}))),
                "audio file not found"
            );
            return Err(AdapterError::usage("audio file not found"));
        }
    }

    let config = whisperx::load_config(&std::env::var(WHISPERX_CONFIG_ENV).unwrap_or_default());
    let cuda = !no_gpu_probe && whisperx::cuda_available().await;
    let has_hf_token = std::env::var(WHISPERX_HF_TOKEN_ENV)
        .map(|token| !token.trim().is_empty())
        .unwrap_or(false);

    let plan = RunPlan::resolve(&config, cuda, has_hf_token);
    tracing::info!(
        context = %log_extra(Some(&json!({
            "audio_file": audio.map(|path| path.display().to_string()),
            "model": plan.model,
            "language": plan.language,
            "device": plan.device.as_str(),
            "compute_type": plan.compute_type,
            "batch_size": plan.batch_size,
            "align": plan.aligned,
            "diarization": plan.diarization.enabled,
        }))),
        "resolved whisperx configuration"
    );
    Ok(plan)
}

fn emit(level: EmitLevel, message: &str, context: Option<&str>) -> std::result::Result<Value, AdapterError> {
    let context = context
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()
        .map_err(|_| AdapterError::usage("invalid context json"))?;
    let extra = log_extra(context.as_ref());

    // tracing needs the level at compile time
    match level {
        EmitLevel::Error => tracing::error!(context = %extra, "{}", message),
        EmitLevel::Warning => tracing::warn!(context = %extra, "{}", message),
        EmitLevel::Info => tracing::info!(context = %extra, "{}", message),
        EmitLevel::Debug => tracing::debug!(context = %extra, "{}", message),
        EmitLevel::Trace => tracing::trace!(context = %extra, "{}", message),
    }

    Ok(json!({"level": level.to_string(), "message": message}))
}
