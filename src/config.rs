use derive_setters::Setters;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::LensError;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Names of the columns the analysis relies on. `category` is optional in the
/// table, the other three must be present.
#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[serde(default)]
#[setters(into)]
pub struct ColumnContract {
    pub name: String,
    pub rating: String,
    pub review_count: String,
    pub category: String,
}

impl Default for ColumnContract {
    fn default() -> Self {
        Self {
            name: "nama".to_string(),
            rating: "rating".to_string(),
            review_count: "jumlah_ulasan".to_string(),
            category: "kategori_usaha".to_string(),
        }
    }
}

impl ColumnContract {
    /// Required columns in the order they are validated.
    pub fn required(&self) -> [&str; 3] {
        [
            self.name.as_str(),
            self.rating.as_str(),
            self.review_count.as_str(),
        ]
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        column == self.rating || column == self.review_count
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[serde(default)]
#[setters(into)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl NarrativeConfig {
    /// Key from the config file, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[serde(default)]
#[setters(into)]
pub struct LensConfig {
    pub page_size: usize,
    pub event_poll_time: u64,
    pub output_dir: String,
    pub log_level: String,
    pub log_file: Option<String>,
    pub columns: ColumnContract,
    pub narrative: NarrativeConfig,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            event_poll_time: 100,
            output_dir: ".".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            columns: ColumnContract::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl LensConfig {
    /// Read the config file if one is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, LensError> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };
        let path = expand_path(&path.to_string_lossy());
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LensError::FileNotFound,
            ErrorKind::PermissionDenied => LensError::PermissionDenied,
            _ => LensError::IoError(e),
        })?;
        let config = Self::parse(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, LensError> {
        let config: LensConfig = toml::from_str(content)?;
        if config.page_size == 0 {
            return Err(LensError::Config("page_size must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_path(&self.output_dir)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
