use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "caption-extractor",
    about = "Caption Extractor - Extract YouTube captions as plain text, as a CLI or an MCP tool server",
    version,
    long_about = "Resolves a YouTube URL, picks a caption track by language preference (English, then Japanese, then auto-generated by default) and returns its text with the video's title and channel. Run `serve` to expose the operation to MCP clients over stdio."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "CAPTION_EXTRACTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve,

    /// Extract captions for a single URL
    Extract {
        /// YouTube URL (watch, youtu.be or embed form)
        #[arg(value_name = "URL")]
        url: String,

        /// Preferred language code prefix (e.g. en, ja, pt-BR)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a configuration file with default values
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },

    /// Check that external tools are available
    Check,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Full result record as JSON
    Json,
    /// Caption text only
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}
