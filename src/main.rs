use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caption_extractor::cli::{Cli, Commands};
use caption_extractor::config::Config;
use caption_extractor::server::McpServer;
use caption_extractor::{output, utils, CaptionExtractor};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr: stdout carries MCP messages and extract output
    let default_filter = if cli.verbose {
        "caption_extractor=debug"
    } else {
        "caption_extractor=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match cli.command {
        Commands::Config { init: true, .. } => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Serve => {
            for dep in utils::check_dependencies(&config.metadata.yt_dlp_path).await {
                tracing::warn!("Dependency check: {} (continuing anyway)", dep);
            }

            let extractor = CaptionExtractor::from_config(&config)?;
            McpServer::new(extractor, config.server.name.clone())
                .run_stdio()
                .await?;
        }
        Commands::Extract {
            url,
            language,
            format,
            output,
        } => {
            let extractor = CaptionExtractor::from_config(&config)?;
            let result = extractor.extract(&url, language.as_deref()).await;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format)?;
                    eprintln!("Captions saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format)?;
                }
            }

            if result.is_error() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                if path.exists() {
                    anyhow::bail!(
                        "Config file already exists: {} (remove it to write fresh defaults)",
                        path.display()
                    );
                }
                config.save(&path)?;
                println!("Configuration written to: {}", path.display());
            } else if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Use --show to print it or --init to write the defaults.");
            }
        }
        Commands::Check => {
            let missing = utils::check_dependencies(&config.metadata.yt_dlp_path).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                println!("Missing tools:");
                for dep in missing {
                    println!("  • {}", dep);
                }
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
