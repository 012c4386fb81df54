//! Run configuration for the WhisperX transcription adapter.
//!
//! The adapter ships a default configuration tuned for two-speaker podcast
//! interviews. Operators override any part of it with a JSON document in
//! `WHISPERX_CONFIG_JSON`; nested objects are merged key by key.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::process::Command;

use crate::logging::log_extra;

pub const WHISPERX_CONFIG_ENV: &str = "WHISPERX_CONFIG_JSON";
pub const WHISPERX_HF_TOKEN_ENV: &str = "WHISPERX_HF_TOKEN";

const DEFAULT_MODEL: &str = "medium.en";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_VAD_METHOD: &str = "pyannote";
const DEFAULT_DIARIZATION_MODEL: &str = "pyannote/speaker-diarization-3.1";

/// Default transcription settings
pub fn default_config() -> Value {
    json!({
        "model": DEFAULT_MODEL,
        "language": DEFAULT_LANGUAGE,
        "device": "auto",
        "compute_type": "auto",
        "batch_size": 0,
        "asr_options": {
            "beam_size": 5,
            "patience": 1,
            "condition_on_previous_text": true,
            "initial_prompt": "Podcast interview. Speakers are Host and Guest. Use punctuation and capitalization.",
        },
        "vad_options": {
            "chunk_size": 45,
            "vad_onset": 0.50,
            "vad_offset": 0.50,
        },
        "vad_method": DEFAULT_VAD_METHOD,
        "align": true,
        "diarization": true,
        "diarization_model": DEFAULT_DIARIZATION_MODEL,
        "min_speakers": 2,
        "max_speakers": 2,
    })
}

/// Deep-merge `overrides` into `base`: objects merge recursively, anything
/// else replaces the existing value
pub fn merge_config(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        let nested = match value {
            Value::Object(nested) => nested,
            value => {
                base.insert(key, value);
                continue;
            }
        };

        if let Some(Value::Object(existing)) = base.get_mut(&key) {
            merge_config(existing, nested);
            continue;
        }
        base.insert(key, Value::Object(nested));
    }
}

/// Resolve the configuration from a raw override document.
///
/// Blank, malformed or non-object overrides leave the defaults untouched.
pub fn load_config(raw: &str) -> Value {
    let mut base = default_config();
    let raw = raw.trim();
    if raw.is_empty() {
        return base;
    }

    let overrides = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(overrides)) => overrides,
        Ok(_) => return base,
        Err(err) => {
            tracing::warn!(error = %err, "invalid whisperx config json; using defaults");
            return base;
        }
    };

    if let Value::Object(map) = &mut base {
        merge_config(map, overrides);
    }
    base
}

/// Compute device for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

/// Explicit `cuda`/`cpu` wins; anything else picks cuda when available
pub fn choose_device(config: &Value, cuda_available: bool) -> Device {
    match text_setting(config, "device", "auto").trim().to_lowercase().as_str() {
        "cuda" => Device::Cuda,
        "cpu" => Device::Cpu,
        _ if cuda_available => Device::Cuda,
        _ => Device::Cpu,
    }
}

/// Explicit compute type wins; `auto` means float16 on cuda, int8 on cpu
pub fn choose_compute_type(config: &Value, device: Device) -> String {
    let compute_type = text_setting(config, "compute_type", "auto")
        .trim()
        .to_lowercase();
    if !compute_type.is_empty() && compute_type != "auto" {
        return compute_type;
    }
    match device {
        Device::Cuda => "float16".to_string(),
        Device::Cpu => "int8".to_string(),
    }
}

/// A positive configured batch size wins; otherwise 16 on cuda, 4 on cpu
pub fn choose_batch_size(config: &Value, device: Device) -> u64 {
    let configured = match config.get("batch_size") {
        None => 0,
        Some(raw) => parse_batch_size(raw).unwrap_or_else(|| {
            tracing::warn!(
                context = %log_extra(Some(&json!({"batch_size": raw}))),
                "invalid batch size in whisperx config; using default"
            );
            0
        }),
    };

    if configured > 0 {
        return configured as u64;
    }
    match device {
        Device::Cuda => 16,
        Device::Cpu => 4,
    }
}

fn parse_batch_size(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

/// Whether `nvidia-smi` reports at least one GPU
pub async fn cuda_available() -> bool {
    Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .await
        .map(|output| output.status.success() && !output.stdout.is_empty())
        .unwrap_or(false)
}

/// Speaker diarization settings for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizationPlan {
    pub enabled: bool,
    pub model: String,
    pub min_speakers: Value,
    pub max_speakers: Value,
    /// `missing_hf_token` when diarization is enabled without a token
    pub error: String,
}

/// Fully resolved settings handed to the transcription toolkit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub provider: String,
    pub model: String,
    pub language: String,
    pub device: Device,
    pub compute_type: String,
    pub batch_size: u64,
    pub asr_options: Value,
    pub vad_options: Value,
    pub vad_method: String,
    pub aligned: bool,
    pub diarization: DiarizationPlan,
    pub has_hf_token: bool,
}

impl RunPlan {
    /// Resolve a plan from a loaded configuration
    pub fn resolve(config: &Value, cuda_available: bool, has_hf_token: bool) -> Self {
        let device = choose_device(config, cuda_available);
        let diarization = config.get("diarization").map(truthy).unwrap_or(true);
        let error = if diarization && !has_hf_token {
            "missing_hf_token".to_string()
        } else {
            String::new()
        };

        Self {
            provider: "whisperx".to_string(),
            model: text_setting(config, "model", DEFAULT_MODEL),
            language: text_setting(config, "language", DEFAULT_LANGUAGE),
            device,
            compute_type: choose_compute_type(config, device),
            batch_size: choose_batch_size(config, device),
            asr_options: object_setting(config, "asr_options"),
            vad_options: object_setting(config, "vad_options"),
            vad_method: text_setting(config, "vad_method", DEFAULT_VAD_METHOD),
            aligned: config.get("align").map(truthy).unwrap_or(true),
            diarization: DiarizationPlan {
                enabled: diarization,
                model: text_setting(config, "diarization_model", DEFAULT_DIARIZATION_MODEL),
                min_speakers: config.get("min_speakers").cloned().unwrap_or(json!(2)),
                max_speakers: config.get("max_speakers").cloned().unwrap_or(json!(2)),
                error,
            },
            has_hf_token,
        }
    }
}

/// String form of a setting; missing or null falls back to `default`
fn text_setting(config: &Value, key: &str, default: &str) -> String {
    match config.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Object setting; anything falsy becomes an empty object
fn object_setting(config: &Value, key: &str) -> Value {
    match config.get(key) {
        Some(value) if truthy(value) => value.clone(),
        _ => Value::Object(Map::new()),
    }
}

/// Truthiness of a loosely typed setting: empty, zero and null are false
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
