// Harness configuration
use crate::dataset::{self, DATASET_CONFIG, DATASET_NAME, DATASET_SPLIT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/harness.json";
pub const CONFIG_PATH_ENV: &str = "MBPP_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where task rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSourceKind {
    /// Hugging Face datasets-server rows endpoint
    Hub,
    /// Local JSON Lines or JSON array file
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    pub source: DatasetSourceKind,
    pub name: String,
    pub config: String,
    pub split: String,
    pub path: Option<PathBuf>,
    pub hub_url: String,
    /// Per-request timeout against the dataset server
    pub request_timeout_secs: u64,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            source: DatasetSourceKind::Hub,
            name: DATASET_NAME.to_string(),
            config: DATASET_CONFIG.to_string(),
            split: DATASET_SPLIT.to_string(),
            path: None,
            hub_url: "https://datasets-server.huggingface.co".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            sample_size: 50,
            seed: 42,
        }
    }
}

/// Interpreter used to run candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub interpreter: String,
    pub step_timeout_ms: u64,
    pub max_source_bytes: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            step_timeout_ms: 10_000,
            max_source_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerKind {
    /// OpenAI-compatible chat completions endpoint
    Chat,
    /// Echo the dataset's reference solution
    Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub kind: ProducerKind,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            kind: ProducerKind::Chat,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output_path: PathBuf,
    pub chart_width: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("mbpp_evaluation_results.csv"),
            chart_width: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub dataset: DatasetSettings,
    pub sampling: SamplingSettings,
    pub runtime: RuntimeSettings,
    pub producer: ProducerSettings,
    pub report: ReportSettings,
}

impl HarnessConfig {
    /// Load configuration from a JSON file; missing sections take defaults
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }

        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;

        let config: HarnessConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `$MBPP_CONFIG` or `config/harness.json`
    ///
    /// An explicitly named file must exist; the default path is optional and
    /// its absence yields built-in defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.sample_size == 0 {
            return Err(ConfigError::Invalid("sampling.sample_size must be positive".into()));
        }
        if self.runtime.step_timeout_ms == 0 {
            return Err(ConfigError::Invalid("runtime.step_timeout_ms must be positive".into()));
        }
        if self.runtime.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("runtime.interpreter must not be empty".into()));
        }
        if self.dataset.source == DatasetSourceKind::File && self.dataset.path.is_none() {
            return Err(ConfigError::Invalid(
                "dataset.path is required when dataset.source is \"file\"".into(),
            ));
        }
        if self.dataset.source == DatasetSourceKind::File
            && dataset::split_task_ids(&self.dataset.split).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "unknown dataset.split \"{}\" (valid options: train, test, validation, prompt)",
                self.dataset.split
            )));
        }
        Ok(())
    }
}
