use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default small-movies catalog used for the `external` origin.
pub const DEFAULT_EXTERNAL_URL: &str =
    "https://huggingface.co/datasets/leemthompo/small-movies/resolve/main/small-movies.json";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EmbedVizConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub embedding: EmbeddingConfig,
    pub reduction: ReductionConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Base used for `chart_url` instead of the inbound request's own address.
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub dir: String,
    pub external_url: String,
    pub load_external: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReductionConfig {
    /// Upper bound for the t-SNE perplexity; clamped to `N - 1` per batch.
    pub perplexity: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// `None` selects `max(N / early_exaggeration / 4, 50)`.
    pub learning_rate: Option<f64>,
    pub early_exaggeration: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartConfig {
    pub output_dir: String,
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    pub point_radius: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
            public_url: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "data".into(),
            external_url: DEFAULT_EXTERNAL_URL.into(),
            load_external: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            timeout_secs: 60,
            max_batch_size: 2048,
        }
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            perplexity: crate::reduce::DEFAULT_NEIGHBORHOOD,
            seed: 42,
            max_iter: 1000,
            learning_rate: None,
            early_exaggeration: 12.0,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: "static".into(),
            width: 2000,
            height: 1600,
            font_size: 22,
            point_radius: 9,
        }
    }
}

/// Returns `~/.embedviz/`
pub fn default_embedviz_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".embedviz")
}

/// Returns the default config file path: `~/.embedviz/config.toml`
pub fn default_config_path() -> PathBuf {
    default_embedviz_dir().join("config.toml")
}

impl EmbedVizConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EmbedVizConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (EMBEDVIZ_*, OPENAI_API_KEY, OPENAI_BASE_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EMBEDVIZ_HOST") {
            self.server.host = val;
        }
        if let Some(port) = std::env::var("EMBEDVIZ_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("EMBEDVIZ_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("EMBEDVIZ_PUBLIC_URL") {
            self.server.public_url = Some(val);
        }
        if let Ok(val) = std::env::var("EMBEDVIZ_DATA_DIR") {
            self.data.dir = val;
        }
        if let Ok(val) = std::env::var("EMBEDVIZ_STATIC_DIR") {
            self.chart.output_dir = val;
        }
        if let Ok(val) = std::env::var("OPENAI_BASE_URL") {
            self.embedding.base_url = val;
        }
        // OPEN_API_KEY is the variable name older deployments used.
        if let Ok(val) = std::env::var("OPENAI_API_KEY").or_else(|_| std::env::var("OPEN_API_KEY"))
        {
            self.embedding.api_key = Some(val);
        }
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.data.dir)
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_tilde(&self.chart.output_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
