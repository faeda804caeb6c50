//! MCP tool definitions.

use serde::Deserialize;
use serde_json::json;

use super::protocol::Tool;

pub const EXTRACT_CAPTIONS_TOOL: &str = "extract_youtube_captions";

/// Arguments accepted by `extract_youtube_captions`
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractCaptionsArgs {
    pub youtube_url: String,

    #[serde(default)]
    pub language_preference: Option<String>,
}

/// Get all available tools.
pub fn get_tools() -> Vec<Tool> {
    vec![Tool {
        name: EXTRACT_CAPTIONS_TOOL.to_string(),
        description: "Extract captions from a YouTube video. Provide the video URL.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "youtube_url": {
                    "type": "string",
                    "description": "The YouTube video URL"
                },
                "language_preference": {
                    "type": ["string", "null"],
                    "description": "Preferred language code prefix (e.g. 'en', 'ja')",
                    "default": null
                }
            },
            "required": ["youtube_url"]
        }),
    }]
}
