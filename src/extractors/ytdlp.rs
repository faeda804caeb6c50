use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{watch_url, MetadataProvider, VideoMetadata};
use crate::config::Config;
use crate::Result;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// Video metadata lookup using yt-dlp
pub struct YtDlpMetadata {
    yt_dlp_path: String,
    timeout: Duration,
}

impl YtDlpMetadata {
    pub fn new(config: &Config) -> Self {
        Self {
            yt_dlp_path: config.metadata.yt_dlp_path.clone(),
            timeout: config.metadata_timeout(),
        }
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", url);

        let run = Command::new(&self.yt_dlp_path)
            .args([
                "--dump-json",
                "--no-playlist",
                "--skip-download",
                "--no-warnings",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))??;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info: Value = serde_json::from_str(&json_str)?;

        Ok(info)
    }
}

#[async_trait]
impl MetadataProvider for YtDlpMetadata {
    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let info = self.get_video_info(&watch_url(video_id)).await?;
        Ok(metadata_from_info(&info))
    }
}

/// Project yt-dlp's info JSON onto title and channel
pub fn metadata_from_info(info: &Value) -> VideoMetadata {
    let title = info["title"].as_str().unwrap_or(UNKNOWN_TITLE).to_string();
    let channel = info["uploader"].as_str().unwrap_or(UNKNOWN_CHANNEL).to_string();

    VideoMetadata { title, channel }
}
