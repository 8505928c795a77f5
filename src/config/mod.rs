use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::pipeline::BatchOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File listing one channel reference per line
    pub channels_file: PathBuf,

    /// Videos taken from each channel feed
    pub max_results_per_channel: usize,

    /// Preferred transcript languages, in order
    pub languages: Vec<String>,

    /// Maximum concurrent resolutions / transcript lookups
    pub concurrency: usize,

    /// Optional whole-batch deadline in seconds
    pub deadline_secs: Option<u64>,

    /// HTTP settings
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels_file: PathBuf::from("config/channels.txt"),
            max_results_per_channel: 3,
            languages: vec!["en".to_string()],
            concurrency: 4,
            deadline_secs: None,
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("tubedigest.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("tubedigest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_results_per_channel == 0 {
            anyhow::bail!("max_results_per_channel must be greater than zero");
        }

        if self.languages.iter().all(|l| l.trim().is_empty()) {
            anyhow::bail!("At least one transcript language must be configured");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Configured language codes, trimmed, with blank entries dropped
    pub fn preferred_languages(&self) -> Vec<String> {
        self.languages
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Batch options derived from this configuration
    pub fn batch_options(&self) -> BatchOptions {
        let options = BatchOptions {
            cap_per_channel: self.max_results_per_channel,
            languages: self.preferred_languages(),
            concurrency: self.concurrency,
            deadline: None,
        };

        match self.deadline_secs {
            Some(secs) => options.with_deadline_after(Duration::from_secs(secs)),
            None => options,
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Channels File: {}", self.channels_file.display());
        println!("  Max Results Per Channel: {}", self.max_results_per_channel);
        println!("  Languages: {}", self.languages.join(", "));
        println!("  Concurrency: {}", self.concurrency);
        match self.deadline_secs {
            Some(secs) => println!("  Batch Deadline: {}s", secs),
            None => println!("  Batch Deadline: none"),
        }
        println!("  Request Timeout: {}s", self.http.timeout_secs);
    }
}

/// Read channel references from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_channels(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let content = fs_err::read_to_string(path).context("Failed to read channels file")?;

    Ok(parse_channels(&content))
}

/// Parse channel references from the channel list format
pub fn parse_channels(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
