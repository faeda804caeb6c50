//! Caption Extractor - YouTube caption tracks as plain text for tool-calling hosts
//!
//! This library resolves a YouTube URL to a video id, lists the caption tracks the video
//! offers, picks one by language preference and returns its text together with the
//! video's title and channel. The binary exposes the operation as an MCP tool over stdio.

pub mod captions;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod server;
pub mod utils;

pub use captions::{CaptionExtractor, CaptionResult};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{CaptionEntry, CaptionTrack, MetadataProvider, TranscriptProvider, VideoMetadata};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Failure kinds reported to the caller of the caption operation
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    #[error("Invalid YouTube URL.")]
    InvalidUrl,

    #[error("Captions are not available or have been disabled for this video.")]
    TranscriptsUnavailable,

    #[error("No available captions found.")]
    NoCaptionsFound,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<extractors::TranscriptError> for CaptionError {
    fn from(err: extractors::TranscriptError) -> Self {
        use extractors::TranscriptError;

        match err {
            TranscriptError::TranscriptsDisabled(_)
            | TranscriptError::NoTranscriptFound(_)
            | TranscriptError::VideoUnavailable(_) => CaptionError::TranscriptsUnavailable,
            other => CaptionError::Unexpected(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for CaptionError {
    fn from(err: anyhow::Error) -> Self {
        CaptionError::Unexpected(format!("{:#}", err))
    }
}
