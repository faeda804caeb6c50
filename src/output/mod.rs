use anyhow::Result;
use std::path::Path;

use crate::captions::CaptionResult;
use crate::cli::OutputFormat;

/// Render a caption result in the requested format
pub fn render(result: &CaptionResult, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => match result {
            CaptionResult::Success(success) => success.captions.clone(),
            CaptionResult::Error { message } => message.clone(),
        },
    };

    Ok(content)
}

/// Save caption result to file
pub fn save_to_file(result: &CaptionResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print caption result to console
pub fn print_to_console(result: &CaptionResult, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    println!("{}", content);
    Ok(())
}
