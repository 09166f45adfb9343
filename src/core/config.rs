use crate::errors::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "integrated.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";

/// Project configuration, read once at harness startup and handed to each emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub base_url: Option<String>,
    #[serde(alias = "pdo")]
    pub database: Option<DatabaseConfig>,
    pub selenium: SeleniumConfig,
    pub logs: LogConfig,
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    #[serde(alias = "database")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeleniumConfig {
    pub browser: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub output: PathBuf,
    pub screenshot: PathBuf,
}

impl Config {
    /// Load `integrated.json` from the working directory.
    pub fn load() -> Result<Self> {
        Self::from_path(CONFIG_FILE)
    }

    /// A missing file is not an error; defaults apply.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| EmulatorError::Configuration(e.to_string()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(DatabaseConfig { path: path.into() });
        self
    }

    pub fn with_logs(mut self, output: impl Into<PathBuf>, screenshot: impl Into<PathBuf>) -> Self {
        self.logs = LogConfig {
            output: output.into(),
            screenshot: screenshot.into(),
        };
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            database: None,
            selenium: SeleniumConfig::default(),
            logs: LogConfig::default(),
            max_redirects: 10,
        }
    }
}

impl Default for SeleniumConfig {
    fn default() -> Self {
        Self {
            browser: "firefox".to_string(),
            host: "http://localhost:4444/wd/hub".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("tests/logs/output.txt"),
            screenshot: PathBuf::from("tests/logs/screenshot.png"),
        }
    }
}
