//! Pipeline Orchestrator: `Resolve → Embed → Reduce → Render`.
//!
//! [`Pipeline::run`] executes the stages strictly in sequence for one request
//! and always returns a [`PipelineOutcome`]: a completed result, the distinct
//! empty-dataset outcome, or a failure naming the stage that failed. Stage
//! errors never escape to the host.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ReductionConfig;
use crate::dataset::{DataCatalog, FieldNotFoundError, FieldSelection, Origin, Resolved};
use crate::embedding::{check_batch, EmbeddingProvider, EmbeddingProviderError};
use crate::reduce::{self, ReduceError};
use crate::render::{chart_caption, ChartRenderer, RenderError};

/// Parameters of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub data_type: String,
    pub origin: Origin,
    pub text_field: Option<String>,
    pub title_field: Option<String>,
}

impl Default for ProcessRequest {
    fn default() -> Self {
        Self {
            data_type: "articles".into(),
            origin: Origin::Builtin,
            text_field: None,
            title_field: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Embed,
    Reduce,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Embed => "embed",
            Self::Reduce => "reduce",
            Self::Render => "render",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The underlying error of a failed stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    FieldNotFound(#[from] FieldNotFoundError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingProviderError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::FieldNotFound(_) => Stage::Resolve,
            Self::Embedding(_) => Stage::Embed,
            Self::Reduce(_) => Stage::Reduce,
            Self::Render(_) => Stage::Render,
        }
    }
}

/// A failed run: which stage failed and why.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    /// Stable tag for clients; independent of the error text.
    pub fn error_type(&self) -> &'static str {
        match &self.source {
            StageError::FieldNotFound(_) => "field_not_found",
            StageError::Embedding(_) => "embedding_provider_error",
            StageError::Reduce(ReduceError::InsufficientData { .. }) => "insufficient_data",
            StageError::Reduce(_) => "reduction_error",
            StageError::Render(_) => "render_error",
        }
    }

    /// HTTP-equivalent status class.
    pub fn http_status(&self) -> u16 {
        match &self.source {
            StageError::FieldNotFound(_) => 400,
            StageError::Reduce(ReduceError::InsufficientData { .. }) => 400,
            StageError::Embedding(EmbeddingProviderError::MissingApiKey)
            | StageError::Embedding(EmbeddingProviderError::UnknownProvider(_)) => 503,
            StageError::Embedding(_) => 502,
            StageError::Reduce(_) | StageError::Render(_) => 500,
        }
    }
}

fn stage_failed(e: impl Into<StageError>) -> PipelineError {
    let source = e.into();
    PipelineError {
        stage: source.stage(),
        source,
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub data_type: String,
    pub origin: Origin,
    pub count: usize,
    pub fields_used: FieldSelection,
    pub chart_url: String,
    pub artifact_path: PathBuf,
    pub texts: Vec<String>,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(PipelineResult),
    /// Nothing to process; no provider call was made and no artifact written.
    EmptyDataset {
        data_type: String,
        origin: Origin,
        fields: FieldSelection,
    },
    Failed(PipelineError),
}

impl PipelineOutcome {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Completed(_) | Self::EmptyDataset { .. } => 200,
            Self::Failed(e) => e.http_status(),
        }
    }
}

/// Artifact key for a run: `{type}_{origin}`, plus the fields when they differ from the defaults.
pub fn artifact_key(data_type: &str, origin: Origin, fields: &FieldSelection) -> String {
    if fields.is_default_for(data_type) {
        format!("{data_type}_{origin}")
    } else {
        format!("{data_type}_{origin}_{}_{}", fields.text, fields.title)
    }
}

/// Composes the four stages. Shared read-only across requests.
pub struct Pipeline {
    catalog: Arc<DataCatalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    reduction: ReductionConfig,
    renderer: ChartRenderer,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<DataCatalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        reduction: ReductionConfig,
        renderer: ChartRenderer,
    ) -> Self {
        Self {
            catalog,
            embedder,
            reduction,
            renderer,
        }
    }

    pub fn catalog(&self) -> &DataCatalog {
        &self.catalog
    }

    pub fn renderer(&self) -> &ChartRenderer {
        &self.renderer
    }

    /// Run one request. `base_reference` prefixes the chart URL (e.g. `http://host:8000`).
    ///
    /// Blocking; call from `spawn_blocking` inside async contexts.
    pub fn run(&self, request: &ProcessRequest, base_reference: &str) -> PipelineOutcome {
        match self.execute(request, base_reference) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    stage = %e.stage,
                    error_type = e.error_type(),
                    error = %e.source,
                    data_type = %request.data_type,
                    origin = %request.origin,
                    "pipeline failed"
                );
                PipelineOutcome::Failed(e)
            }
        }
    }

    fn execute(
        &self,
        request: &ProcessRequest,
        base_reference: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        let resolved = self
            .catalog
            .resolve(
                &request.data_type,
                request.origin,
                request.text_field.as_deref(),
                request.title_field.as_deref(),
            )
            .map_err(stage_failed)?;

        let dataset = match resolved {
            Resolved::Records(dataset) => dataset,
            Resolved::Empty {
                data_type,
                origin,
                fields,
            } => {
                tracing::info!(data_type = %data_type, origin = %origin, "dataset empty, nothing to render");
                return Ok(PipelineOutcome::EmptyDataset {
                    data_type,
                    origin,
                    fields,
                });
            }
        };

        let count = dataset.len();
        let texts = dataset.texts();
        let titles = dataset.titles();
        tracing::info!(
            data_type = %dataset.data_type,
            origin = %dataset.origin,
            count,
            text_field = %dataset.fields.text,
            title_field = %dataset.fields.title,
            sample = ?titles.iter().take(3).collect::<Vec<_>>(),
            "resolved dataset"
        );

        // One record cannot be reduced; skip the provider call entirely.
        if count < reduce::MIN_POINTS {
            return Err(stage_failed(ReduceError::InsufficientData {
                min: reduce::MIN_POINTS,
                got: count,
            }));
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&inputs).map_err(stage_failed)?;
        check_batch(&vectors, count).map_err(stage_failed)?;
        tracing::info!(
            count = vectors.len(),
            dimensions = vectors.first().map_or(0, Vec::len),
            model = self.embedder.model(),
            "embeddings generated"
        );

        let points = reduce::reduce(&vectors, &self.reduction).map_err(stage_failed)?;
        tracing::info!(points = points.len(), "reduced to 2D");

        let key = artifact_key(&dataset.data_type, dataset.origin, &dataset.fields);
        let caption = chart_caption(&dataset.data_type, dataset.origin.as_str());
        let artifact = self
            .renderer
            .render(&points, &titles, &key, &caption)
            .map_err(stage_failed)?;

        let chart_url = format!(
            "{}/static/{}",
            base_reference.trim_end_matches('/'),
            artifact.file_name
        );
        tracing::info!(path = %artifact.path.display(), url = %chart_url, "saved t-SNE visualization");

        Ok(PipelineOutcome::Completed(PipelineResult {
            data_type: dataset.data_type,
            origin: dataset.origin,
            count,
            fields_used: dataset.fields,
            chart_url,
            artifact_path: artifact.path,
            texts,
        }))
    }
}

/// Payload data of a response.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessData {
    #[serde(rename = "type")]
    pub data_type: String,
    pub origin: Origin,
    pub count: usize,
    pub fields_used: FieldSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_url: Option<String>,
    pub texts: Vec<String>,
}

/// Wire shape returned to HTTP and CLI callers.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    /// `completed`, `empty_dataset`, or `failed`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProcessData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessResponse {
    /// Rejected before the pipeline ran (e.g. unknown origin).
    pub fn invalid_request(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: "failed",
            data: None,
            error: Some(error.into()),
            error_type: Some("invalid_request".into()),
            stage: None,
            message: Some("Invalid request parameters".into()),
        }
    }
}

impl From<&PipelineOutcome> for ProcessResponse {
    fn from(outcome: &PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Completed(result) => Self {
                success: true,
                outcome: "completed",
                data: Some(ProcessData {
                    data_type: result.data_type.clone(),
                    origin: result.origin,
                    count: result.count,
                    fields_used: result.fields_used.clone(),
                    chart_url: Some(result.chart_url.clone()),
                    texts: result.texts.clone(),
                }),
                error: None,
                error_type: None,
                stage: None,
                message: None,
            },
            PipelineOutcome::EmptyDataset {
                data_type,
                origin,
                fields,
            } => Self {
                success: true,
                outcome: "empty_dataset",
                data: Some(ProcessData {
                    data_type: data_type.clone(),
                    origin: *origin,
                    count: 0,
                    fields_used: fields.clone(),
                    chart_url: None,
                    texts: vec![],
                }),
                error: None,
                error_type: None,
                stage: None,
                message: Some(format!("No {data_type} records available from the {origin} origin")),
            },
            PipelineOutcome::Failed(e) => Self {
                success: false,
                outcome: "failed",
                data: None,
                error: Some(e.source.to_string()),
                error_type: Some(e.error_type().into()),
                stage: Some(e.stage),
                message: Some("Failed to process data and generate visualization".into()),
            },
        }
    }
}
