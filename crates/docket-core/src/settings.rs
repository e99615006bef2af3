//! Layered configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`DocketSettings::default()`]
//! 2. If a settings file is given, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! The backend credential is never read from the file; only from
//! `ANTHROPIC_API_KEY`. Without it the service runs in demo mode.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::provider::TaskClass;
use crate::security::{env_vars, ApiKey};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelSettings {
    pub scorer: String,
    pub content: String,
    pub analyzer: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            scorer: "claude-3-haiku-20240307".into(),
            content: "claude-3-5-sonnet-20241022".into(),
            analyzer: "claude-3-haiku-20240307".into(),
        }
    }
}

impl ModelSettings {
    pub fn for_task(&self, task: TaskClass) -> &str {
        match task {
            TaskClass::Scorer => &self.scorer,
            TaskClass::Content => &self.content,
            TaskClass::Analyzer => &self.analyzer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendSettings {
    pub api_url: String,
    pub models: ModelSettings,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            models: ModelSettings::default(),
            max_attempts: 3,
            base_delay_ms: 2000,
            request_timeout_ms: 30_000,
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitSettings {
    pub max_requests_per_minute: u32,
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
    pub expiry_grace_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 60,
            window_secs: 60,
            sweep_interval_secs: 60,
            expiry_grace_secs: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSettings {
    pub demo_delay_ms: u64,
    pub default_firm_id: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            demo_delay_ms: 500,
            default_firm_id: crate::run::DEFAULT_FIRM_ID.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub env: String,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            env: "development".into(),
            log_level: "info".into(),
            log_json: true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocketSettings {
    pub backend: BackendSettings,
    pub rate_limit: RateLimitSettings,
    pub server: ServerSettings,
    pub pipeline: PipelineSettings,
    pub app: AppSettings,
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

impl DocketSettings {
    /// Demo mode is active iff no backend credential is configured.
    pub fn is_demo_mode(&self) -> bool {
        self.api_key.is_none()
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }

    /// Non-fatal configuration problems worth logging at startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.is_demo_mode() {
            warnings.push(format!(
                "{} not set, running in demo mode",
                env_vars::ANTHROPIC_API_KEY
            ));
            if self.is_production() {
                warnings.push("running in production with demo mode enabled".into());
            }
        }
        if self.backend.max_attempts == 0 {
            warnings.push("backend.maxAttempts is 0; every live stage will fail".into());
        }
        warnings
    }
}

/// Load settings from an optional file, then apply process env overrides.
pub fn load_settings(path: Option<&Path>) -> Result<DocketSettings, SettingsError> {
    let mut settings = match path {
        Some(path) => load_settings_file(path)?,
        None => DocketSettings::default(),
    };
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Deep-merge a JSON settings file over the defaults. A missing file yields defaults.
pub fn load_settings_file(path: &Path) -> Result<DocketSettings, SettingsError> {
    let defaults = serde_json::to_value(DocketSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge: objects merge per key, everything else is replaced,
/// nulls in `source` are skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `lookup`. Unparseable values are ignored.
pub fn apply_env_overrides<F>(settings: &mut DocketSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    settings.api_key = ApiKey::from_env_value(lookup(env_vars::ANTHROPIC_API_KEY));

    if let Some(v) = read(env_vars::DOCKET_HOST) {
        settings.server.host = v;
    }
    if let Some(v) = read(env_vars::DOCKET_PORT).and_then(|v| v.parse::<u16>().ok()) {
        settings.server.port = v;
    }
    if let Some(v) = read(env_vars::DOCKET_ENV) {
        settings.app.env = v;
    }
    if let Some(v) = read(env_vars::DOCKET_LOG_LEVEL).or_else(|| read(env_vars::LOG_LEVEL)) {
        settings.app.log_level = v;
    }
    if let Some(v) = read(env_vars::DOCKET_DEMO_DELAY_MS).and_then(|v| v.parse::<u64>().ok()) {
        settings.pipeline.demo_delay_ms = v;
    }
}
