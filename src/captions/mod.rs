use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::extractors::youtube::YoutubeTranscriptClient;
use crate::extractors::ytdlp::YtDlpMetadata;
use crate::extractors::{
    extract_video_id, CaptionEntry, CaptionTrack, MetadataProvider, TranscriptProvider,
};
use crate::{CaptionError, Result};

/// Outcome of one caption extraction, serialized with a `status` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptionResult {
    Success(CaptionSuccess),
    Error { message: String },
}

/// Payload of a successful extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSuccess {
    pub title: String,
    pub channel: String,
    pub language_code: String,
    pub language_name: String,
    pub is_generated: bool,
    pub available_languages: Vec<LanguageSummary>,
    pub captions: String,
}

/// One entry of `available_languages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSummary {
    pub code: String,
    pub name: String,
    pub is_generated: bool,
}

impl CaptionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, CaptionResult::Error { .. })
    }
}

impl From<CaptionError> for CaptionResult {
    fn from(err: CaptionError) -> Self {
        CaptionResult::Error {
            message: err.to_string(),
        }
    }
}

/// The caption extraction operation
pub struct CaptionExtractor {
    transcripts: Box<dyn TranscriptProvider>,
    metadata: Box<dyn MetadataProvider>,
    language_priority: Vec<String>,
}

impl CaptionExtractor {
    pub fn new(
        transcripts: Box<dyn TranscriptProvider>,
        metadata: Box<dyn MetadataProvider>,
        language_priority: Vec<String>,
    ) -> Self {
        Self {
            transcripts,
            metadata,
            language_priority,
        }
    }

    /// Build an extractor backed by YouTube and yt-dlp
    pub fn from_config(config: &Config) -> Result<Self> {
        let transcripts = YoutubeTranscriptClient::new(config)?;
        tracing::debug!("Using {} for caption tracks", transcripts.provider_name());

        Ok(Self::new(
            Box::new(transcripts),
            Box::new(YtDlpMetadata::new(config)),
            config.captions.language_priority.clone(),
        ))
    }

    /// Extract captions for a URL. Every failure is folded into an error result.
    pub async fn extract(&self, youtube_url: &str, language_preference: Option<&str>) -> CaptionResult {
        match self.try_extract(youtube_url, language_preference).await {
            Ok(success) => CaptionResult::Success(success),
            Err(err) => {
                tracing::warn!("Caption extraction failed for {}: {:?}", youtube_url, err);
                err.into()
            }
        }
    }

    async fn try_extract(
        &self,
        youtube_url: &str,
        language_preference: Option<&str>,
    ) -> std::result::Result<CaptionSuccess, CaptionError> {
        let video_id = extract_video_id(youtube_url)?;
        tracing::info!("Extracting captions for video: {}", video_id);

        let tracks = self.transcripts.list_transcripts(&video_id).await?;
        tracing::debug!("Found {} caption tracks", tracks.len());

        let selected = select_transcript(&tracks, language_preference, &self.language_priority)
            .ok_or(CaptionError::NoCaptionsFound)?;
        tracing::info!(
            "Selected {} caption track ({})",
            selected.language_code,
            if selected.is_generated { "auto-generated" } else { "manual" }
        );

        let metadata = self.metadata.video_metadata(&video_id).await?;

        let entries = self.transcripts.fetch_transcript(selected).await?;
        let captions = combine_captions(&entries);

        Ok(CaptionSuccess {
            title: metadata.title,
            channel: metadata.channel,
            language_code: selected.language_code.clone(),
            language_name: selected.language_name.clone(),
            is_generated: selected.is_generated,
            available_languages: list_available_languages(&tracks),
            captions,
        })
    }
}

/// Pick a track: caller preference, then the priority prefixes, then any generated track, then the first one
pub fn select_transcript<'a>(
    tracks: &'a [CaptionTrack],
    language_preference: Option<&str>,
    language_priority: &[String],
) -> Option<&'a CaptionTrack> {
    let by_prefix = |prefix: &str| {
        tracks
            .iter()
            .find(|track| track.language_code.starts_with(prefix))
    };

    language_preference
        .filter(|preference| !preference.is_empty())
        .and_then(by_prefix)
        .or_else(|| {
            language_priority
                .iter()
                .find_map(|prefix| by_prefix(prefix.as_str()))
        })
        .or_else(|| tracks.iter().find(|track| track.is_generated))
        .or_else(|| tracks.first())
}

/// Join entry texts with newlines; entries without text become empty lines
pub fn combine_captions(entries: &[CaptionEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.text.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn list_available_languages(tracks: &[CaptionTrack]) -> Vec<LanguageSummary> {
    tracks
        .iter()
        .map(|track| LanguageSummary {
            code: track.language_code.clone(),
            name: track.language_name.clone(),
            is_generated: track.is_generated,
        })
        .collect()
}
