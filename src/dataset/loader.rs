//! Startup loading of the datasets behind a [`DataCatalog`].
//!
//! Builtin datasets are every `<type>.json` file in the data directory. The
//! external origin is a movies catalog fetched over HTTP. A source that fails
//! to load is logged and left out of the catalog; it then resolves as empty.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use super::{DataCatalog, Origin, Record};
use crate::config::EmbedVizConfig;

/// Dataset type the external catalog is registered under.
pub const EXTERNAL_DATA_TYPE: &str = "movies";

/// Build the catalog from the configured data directory and external URL.
///
/// Performs blocking I/O; call from `spawn_blocking` inside async contexts.
pub fn load_catalog(config: &EmbedVizConfig) -> DataCatalog {
    let mut catalog = DataCatalog::new();

    let data_dir = config.resolved_data_dir();
    match load_builtin_dir(&data_dir) {
        Ok(datasets) => {
            for (data_type, records) in datasets {
                catalog.insert(data_type, Origin::Builtin, records);
            }
        }
        Err(e) => tracing::warn!(dir = %data_dir.display(), error = %e, "builtin datasets unavailable"),
    }

    if config.data.load_external {
        let timeout = Duration::from_secs(config.embedding.timeout_secs);
        match fetch_external(&config.data.external_url, timeout) {
            Ok(records) => {
                tracing::info!(
                    count = records.len(),
                    url = %config.data.external_url,
                    "loaded external dataset"
                );
                catalog.insert(EXTERNAL_DATA_TYPE, Origin::External, records);
            }
            Err(e) => tracing::warn!(
                url = %config.data.external_url,
                error = %e,
                "failed to load external dataset"
            ),
        }
    }

    catalog
}

/// Load every `*.json` file in `dir`, keyed by file stem.
///
/// Unreadable or malformed files are skipped with a warning.
pub fn load_builtin_dir(dir: &Path) -> Result<Vec<(String, Vec<Record>)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read data directory {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut datasets = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(data_type) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_json_file(&path) {
            Ok(records) => {
                tracing::info!(count = records.len(), file = %path.display(), "loaded builtin dataset");
                datasets.push((data_type.to_string(), records));
            }
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping dataset file"),
        }
    }
    Ok(datasets)
}

/// Read a JSON file holding an array of objects (or JSON lines).
pub fn load_json_file(path: &Path) -> Result<Vec<Record>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Fetch a JSON dataset over HTTP.
pub fn fetch_external(url: &str, timeout: Duration) -> Result<Vec<Record>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let body = response.text().context("error reading response")?;
    parse_records(&body)
}

/// Parse either a JSON array of objects or newline-delimited JSON objects.
pub fn parse_records(contents: &str) -> Result<Vec<Record>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> =
            serde_json::from_str(trimmed).context("invalid JSON array")?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, v)| into_record(v, i))
            .collect();
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("invalid JSON on line {}", i + 1))?;
            into_record(value, i)
        })
        .collect()
}

fn into_record(value: Value, index: usize) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("item {index} is not an object: {other}"),
    }
}
