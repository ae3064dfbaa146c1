//! CLI `process` command: run the pipeline once and print the JSON response.

use anyhow::{Context, Result};
use clap::Args;

use embedviz::config::EmbedVizConfig;
use embedviz::pipeline::{PipelineOutcome, ProcessResponse};
use embedviz::server::{setup_pipeline, ProcessParams};

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Dataset type (e.g. articles, movies)
    #[arg(long = "type", default_value = "articles")]
    pub data_type: String,
    /// Dataset origin: builtin or external
    #[arg(long, alias = "source", default_value = "builtin")]
    pub origin: String,
    /// Field to embed (default depends on type)
    #[arg(long)]
    pub text_field: Option<String>,
    /// Field used to label points
    #[arg(long)]
    pub title_field: Option<String>,
    /// Base for the printed chart URL (default: the chart directory as a file:// URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Returns `false` when the pipeline failed, so the caller can set the exit code.
pub fn process(config: &EmbedVizConfig, args: ProcessArgs) -> Result<bool> {
    let params = ProcessParams {
        data_type: Some(args.data_type),
        origin: Some(args.origin),
        source: None,
        text_field: args.text_field,
        title_field: args.title_field,
    };
    let request = match params.into_request() {
        Ok(request) => request,
        Err(e) => {
            print_json(&ProcessResponse::invalid_request(e))?;
            return Ok(false);
        }
    };

    let pipeline = setup_pipeline(config)?;

    // Chart URLs are `{base}/static/{file}`, so the default base is the chart dir's parent.
    let base = match args.base_url.or_else(|| config.server.public_url.clone()) {
        Some(base) => base,
        None => {
            let output_dir = std::path::absolute(pipeline.renderer().output_dir())
                .context("failed to resolve chart directory")?;
            let parent = output_dir.parent().unwrap_or(&output_dir);
            format!("file://{}", parent.display())
        }
    };

    let outcome = pipeline.run(&request, &base);
    print_json(&ProcessResponse::from(&outcome))?;
    Ok(!matches!(outcome, PipelineOutcome::Failed(_)))
}

fn print_json(response: &ProcessResponse) -> Result<()> {
    let out = serde_json::to_string_pretty(response).context("failed to serialize response")?;
    println!("{out}");
    Ok(())
}
