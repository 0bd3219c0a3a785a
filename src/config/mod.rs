//! Configuration system (layered: defaults < TOML file < environment).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::chat::{OrchestratorSettings, SYSTEM_PROMPT};
use crate::error::{ParleyError, Result};
use crate::models::{DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, SEARCH_MODEL};
use crate::provider::gateway::DEFAULT_BASE_URL;
use crate::services::speech::{
    DEFAULT_GROQ_BASE_URL, DEFAULT_MAX_INPUT_CHARS, DEFAULT_TTS_MODEL, DEFAULT_VOICE,
};
use crate::services::weather::{DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Runtime configuration for the chat server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub bind: String,
    pub gateway_api_key: Option<String>,
    pub gateway_base_url: String,
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub geocoding_url: String,
    pub forecast_url: String,
    pub default_model: String,
    pub search_model: String,
    pub image_model: String,
    pub tts_model: String,
    pub voice: String,
    pub tts_max_input_chars: usize,
    pub system_prompt: String,
    pub max_duration_secs: u64,
    pub tool_timeout_secs: u64,
    pub approval_timeout_secs: u64,
    pub max_steps: usize,
}

impl fmt::Debug for ParleyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParleyConfig")
            .field("bind", &self.bind)
            .field("gateway_api_key", &self.gateway_api_key.as_ref().map(|_| ".."))
            .field("gateway_base_url", &self.gateway_base_url)
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| ".."))
            .field("groq_base_url", &self.groq_base_url)
            .field("default_model", &self.default_model)
            .field("search_model", &self.search_model)
            .field("max_duration_secs", &self.max_duration_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("approval_timeout_secs", &self.approval_timeout_secs)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            gateway_api_key: None,
            gateway_base_url: DEFAULT_BASE_URL.to_string(),
            groq_api_key: None,
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            search_model: SEARCH_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            tts_max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_duration_secs: 500,
            tool_timeout_secs: 60,
            approval_timeout_secs: 300,
            max_steps: 5,
        }
    }
}

impl ParleyConfig {
    /// Load the full layering: defaults, then the TOML file, then the
    /// environment (including `.env`).
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults overlaid with the environment only.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ParleyError::Configuration(format!("invalid config: {e}")))
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AI_GATEWAY_API_KEY") {
            self.gateway_api_key = Some(v);
        }
        if let Some(v) = get("AI_GATEWAY_BASE_URL") {
            self.gateway_base_url = v;
        }
        if let Some(v) = get("GROQ_API_KEY") {
            self.groq_api_key = Some(v);
        }
        if let Some(v) = get("GROQ_BASE_URL") {
            self.groq_base_url = v;
        }
        if let Some(v) = get("OPEN_METEO_GEOCODING_URL") {
            self.geocoding_url = v;
        }
        if let Some(v) = get("OPEN_METEO_FORECAST_URL") {
            self.forecast_url = v;
        }
        if let Some(v) = get("PARLEY_BIND") {
            self.bind = v;
        }

        let numeric = [
            ("PARLEY_MAX_DURATION_SECS", &mut self.max_duration_secs),
            ("PARLEY_TOOL_TIMEOUT_SECS", &mut self.tool_timeout_secs),
            ("PARLEY_APPROVAL_TIMEOUT_SECS", &mut self.approval_timeout_secs),
        ];
        for (key, slot) in numeric {
            if let Some(v) = get(key) {
                match v.trim().parse() {
                    Ok(parsed) => *slot = parsed,
                    Err(_) => tracing::warn!(key, value = %v, "ignoring non-numeric setting"),
                }
            }
        }
        if let Some(v) = get("PARLEY_MAX_STEPS") {
            match v.trim().parse() {
                Ok(parsed) => self.max_steps = parsed,
                Err(_) => tracing::warn!(key = "PARLEY_MAX_STEPS", value = %v, "ignoring non-numeric setting"),
            }
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(ParleyError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.max_duration_secs == 0 {
            return Err(ParleyError::Configuration(
                "max_duration_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings::builder()
            .default_model(self.default_model.clone())
            .search_model(self.search_model.clone())
            .system_prompt(self.system_prompt.clone())
            .max_steps(self.max_steps)
            .max_duration(Duration::from_secs(self.max_duration_secs))
            .tool_timeout(Duration::from_secs(self.tool_timeout_secs))
            .approval_timeout(Duration::from_secs(self.approval_timeout_secs))
            .build()
    }
}

/// `<config dir>/parley/config.toml` for the current user.
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("parley").join("config.toml"))
}
