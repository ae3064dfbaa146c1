mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use embedviz::config::EmbedVizConfig;

#[derive(Parser)]
#[command(name = "embedviz", version, about = "t-SNE visualizations of text embeddings")]
struct Cli {
    /// Config file (default: ~/.embedviz/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run the pipeline once and print the JSON response
    Process(cli::process::ProcessArgs),
    /// List available datasets and their fields
    DataInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EmbedVizConfig::load_from(path)?,
        None => EmbedVizConfig::load()?,
    };

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            embedviz::server::serve(config).await?;
        }
        Command::Process(args) => {
            let succeeded = tokio::task::spawn_blocking(move || cli::process::process(&config, args))
                .await
                .context("process task failed")??;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Command::DataInfo => {
            tokio::task::spawn_blocking(move || cli::data_info::data_info(&config))
                .await
                .context("data-info task failed")??;
        }
    }

    Ok(())
}
