use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://weatherimageprediction.azurewebsites.net/predict";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// endpoint = "https://weatherimageprediction.azurewebsites.net/predict"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prediction endpoint receiving the multipart upload.
    pub endpoint: String,

    /// Optional request timeout. Absent means wait for as long as the request takes.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Parsed endpoint. Only http(s) URLs are accepted.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid prediction endpoint: '{}'", self.endpoint))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!(
                "Invalid prediction endpoint: '{}' (unsupported scheme '{other}')",
                self.endpoint
            )),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> Result<()> {
        let previous = std::mem::replace(&mut self.endpoint, endpoint.into());
        if let Err(err) = self.endpoint_url() {
            self.endpoint = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-predict", "weather-predict-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
