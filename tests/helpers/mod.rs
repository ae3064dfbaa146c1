#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use embedviz::config::{ChartConfig, ReductionConfig};
use embedviz::dataset::{DataCatalog, Origin, Record};
use embedviz::embedding::{EmbeddingProvider, EmbeddingProviderError};
use embedviz::pipeline::Pipeline;
use embedviz::render::ChartRenderer;
use serde_json::json;

/// Dimensions of `text-embedding-3-small` vectors.
pub const DIM: usize = 1536;

/// Deterministic offline provider: each text maps to a fixed pseudo-random vector.
/// Records every batch it receives.
pub struct FakeEmbeddingProvider {
    dim: usize,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl FakeEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl EmbeddingProvider for FakeEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        self.batches
            .lock()
            .unwrap()
            .push(texts.iter().map(|t| t.to_string()).collect());
        Ok(texts.iter().map(|t| text_vector(t, self.dim)).collect())
    }

    fn model(&self) -> &str {
        "fake-embedding"
    }
}

/// Provider whose upstream always answers 503.
pub struct UnavailableProvider;

impl EmbeddingProvider for UnavailableProvider {
    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        Err(EmbeddingProviderError::Status {
            status: 503,
            body: "service unavailable".into(),
        })
    }

    fn model(&self) -> &str {
        "unavailable"
    }
}

/// Provider that answers with one zero-length vector per text.
pub struct DimensionlessProvider;

impl EmbeddingProvider for DimensionlessProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        Ok(vec![Vec::new(); texts.len()])
    }

    fn model(&self) -> &str {
        "dimensionless"
    }
}

pub fn text_vector(text: &str, dim: usize) -> Vec<f32> {
    let seed = text
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..dim).map(|_| rng.f32() - 0.5).collect()
}

pub fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().expect("fixture must be an object")
}

/// `n` movie records with `id`, `title`, `plot`, `year` fields.
pub fn movie_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            record(json!({
                "id": i + 1,
                "title": format!("Movie {}", i + 1),
                "plot": format!("Plot number {} about heists, dreams, and robots.", i + 1),
                "year": 1990 + i,
            }))
        })
        .collect()
}

pub fn fixture_catalog(movies: usize) -> DataCatalog {
    DataCatalog::new().with_dataset("movies", Origin::Builtin, movie_records(movies))
}

pub fn test_pipeline(
    catalog: DataCatalog,
    provider: Arc<dyn EmbeddingProvider>,
    output_dir: &Path,
) -> Pipeline {
    Pipeline::new(
        Arc::new(catalog),
        provider,
        ReductionConfig::default(),
        ChartRenderer::new(output_dir, &small_chart()),
    )
}

pub fn small_chart() -> ChartConfig {
    ChartConfig {
        width: 640,
        height: 480,
        font_size: 12,
        point_radius: 4,
        ..ChartConfig::default()
    }
}

/// Files in `dir`, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
