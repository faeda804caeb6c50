use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub mod youtube;
pub mod ytdlp;

use crate::{CaptionError, Result};

/// Recognized URL shapes, tried in order. Matching is a substring search, not anchored.
static VIDEO_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"v=([0-9A-Za-z_-]{11})",
        r"youtu\.be/([0-9A-Za-z_-]{11})",
        r"embed/([0-9A-Za-z_-]{11})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid video id regex"))
    .collect()
});

/// A caption track offered for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    /// Language code as reported upstream (e.g. "en", "en-US", "ja")
    pub language_code: String,

    /// Human readable language name
    pub language_name: String,

    /// Whether the track comes from automatic speech recognition
    pub is_generated: bool,

    /// Provider-specific location of the track body
    pub base_url: String,
}

/// A single timed caption line
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionEntry {
    /// Caption text, absent for empty cues
    pub text: Option<String>,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Title and channel of a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
}

/// Errors reported by a transcript service
#[derive(thiserror::Error, Debug)]
pub enum TranscriptError {
    #[error("Transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("No transcript found for video {0}")]
    NoTranscriptFound(String),

    #[error("Video {0} is unavailable")]
    VideoUnavailable(String),

    #[error("Video {0} is unplayable: {1}")]
    VideoUnplayable(String, String),

    #[error("Video {0} is age restricted")]
    AgeRestricted(String),

    #[error("YouTube is blocking requests for video {0}")]
    RequestBlocked(String),

    #[error("Too many requests to YouTube while fetching video {0}")]
    TooManyRequests(String),

    #[error("Caption track for video {0} requires a PO token")]
    PoTokenRequired(String),

    #[error("Could not parse YouTube data for video {0}")]
    YouTubeDataUnparsable(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to parse caption data: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TranscriptError {
    fn from(err: reqwest::Error) -> Self {
        TranscriptError::Http(err.to_string())
    }
}

/// Lists and fetches caption tracks for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// List every caption track of a video, in a stable order
    async fn list_transcripts(&self, video_id: &str) -> std::result::Result<Vec<CaptionTrack>, TranscriptError>;

    /// Fetch the ordered entries of a track
    async fn fetch_transcript(&self, track: &CaptionTrack) -> std::result::Result<Vec<CaptionEntry>, TranscriptError>;

    /// Get the name of this service
    fn provider_name(&self) -> &'static str;
}

/// Looks up video title and channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch metadata for a video id
    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata>;
}

/// Extract the 11-character video id from anything that contains a recognized YouTube URL shape
pub fn extract_video_id(url: &str) -> std::result::Result<String, CaptionError> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or(CaptionError::InvalidUrl)
}

/// Canonical watch page URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
