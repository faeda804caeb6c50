use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Caption selection settings
    pub captions: CaptionsConfig,

    /// YouTube transcript service settings
    pub youtube: YoutubeConfig,

    /// Video metadata lookup settings
    pub metadata: MetadataConfig,

    /// MCP server settings
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Language-code prefixes tried in order when the caller preference does not match
    pub language_priority: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// Scheme and host the watch page and InnerTube API are requested from
    pub base_url: String,

    /// Accept-Language header sent to YouTube
    pub accept_language: String,

    /// InnerTube client identity
    pub innertube_client_name: String,
    pub innertube_client_version: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Path or name of the yt-dlp executable
    pub yt_dlp_path: String,

    /// Upper bound for one yt-dlp run
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name announced to MCP clients
    pub name: String,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            language_priority: vec!["en".to_string(), "ja".to_string()],
        }
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            accept_language: "en-US".to_string(),
            innertube_client_name: "ANDROID".to_string(),
            innertube_client_version: "20.10.38".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "YouTube Caption Extractor".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given file, the usual locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => Self::config_path()?,
        };

        if config_path.exists() {
            tracing::debug!("Loading configuration from {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Read and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("caption-extractor").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.captions.language_priority.iter().any(|prefix| prefix.trim().is_empty()) {
            anyhow::bail!("captions.language_priority must not contain empty entries");
        }

        url::Url::parse(&self.youtube.base_url)
            .with_context(|| format!("youtube.base_url is not a valid URL: {}", self.youtube.base_url))?;

        if self.youtube.request_timeout_secs == 0 {
            anyhow::bail!("youtube.request_timeout_secs must be greater than zero");
        }

        if self.metadata.timeout_secs == 0 {
            anyhow::bail!("metadata.timeout_secs must be greater than zero");
        }

        if self.metadata.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("metadata.yt_dlp_path must be set");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Language Priority: {}", self.captions.language_priority.join(", "));
        println!("  YouTube: {}", self.youtube.base_url);
        println!("  Accept-Language: {}", self.youtube.accept_language);
        println!(
            "  InnerTube Client: {} {}",
            self.youtube.innertube_client_name, self.youtube.innertube_client_version
        );
        println!("  Request Timeout: {}s", self.youtube.request_timeout_secs);
        println!("  yt-dlp: {} (timeout {}s)", self.metadata.yt_dlp_path, self.metadata.timeout_secs);
        println!("  Server Name: {}", self.server.name);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.youtube.request_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.timeout_secs)
    }
}
