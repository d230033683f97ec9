//! Runtime configuration: `config.toml` in the data dir (or `--config`),
//! `.env`, then `CREWRUN_*` environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::core::llm::{ApiFormat, AuthType};
use crate::platform::{NativePlatform, Platform};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub code: CodeConfig,
    /// Overrides the platform data directory (images, config file).
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            llm: LlmConfig::default(),
            image: ImageConfig::default(),
            code: CodeConfig::default(),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Used when a request does not name its own store location.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider_id: String,
    pub api_format: ApiFormat,
    /// Full endpoint URL; Gemini URLs may contain a `{model}` placeholder.
    pub base_url: String,
    pub model: String,
    pub auth_type: AuthType,
    pub header_name: Option<String>,
    pub param_name: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Reasoning-loop iterations an agent gets per task.
    pub max_iterations: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            api_format: ApiFormat::Openai,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            auth_type: AuthType::Bearer,
            header_name: None,
            param_name: None,
            api_key_env: "CREWRUN_LLM_API_KEY".to_string(),
            temperature: 0.5,
            request_timeout_secs: 120,
            max_iterations: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image generation endpoint; without one the tool reports a failure.
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    /// Defaults to `<data_dir>/images`.
    pub storage_dir: Option<PathBuf>,
    /// Hand the image marker back as the task's answer verbatim.
    pub result_as_answer: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "stability.stable-image-ultra-v1:0".to_string(),
            api_key_env: "CREWRUN_IMAGE_API_KEY".to_string(),
            request_timeout_secs: 120,
            storage_dir: None,
            result_as_answer: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    pub timeout_secs: u64,
    /// Interpreter argv; the code is appended as the last argument.
    pub interpreter: Vec<String>,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            interpreter: NativePlatform::python_command()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `<data_dir>/config.toml` when it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let default_path = NativePlatform::data_dir().join("config.toml");
        let source = match path {
            Some(p) => Some(p.to_path_buf()),
            None if default_path.exists() => Some(default_path),
            None => None,
        };

        let mut config = match source {
            Some(p) => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("reading config {:?}", p))?;
                Self::from_toml(&raw).with_context(|| format!("parsing config {:?}", p))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CREWRUN_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CREWRUN_STORE_ENDPOINT") {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = lookup("CREWRUN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("CREWRUN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("CREWRUN_IMAGE_ENDPOINT") {
            self.image.endpoint = Some(v);
        }
        if let Some(v) = lookup("CREWRUN_CODE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.code.timeout_secs = v;
        }
        if let Some(v) = lookup("CREWRUN_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("CREWRUN_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = lookup("CREWRUN_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(NativePlatform::data_dir)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.image
            .storage_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("images"))
    }

    pub fn llm_api_key(&self) -> String {
        std::env::var(&self.llm.api_key_env).unwrap_or_default()
    }

    pub fn image_api_key(&self) -> String {
        std::env::var(&self.image.api_key_env).unwrap_or_default()
    }

    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}
