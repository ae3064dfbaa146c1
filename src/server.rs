//! HTTP host for the pipeline.
//!
//! Provides [`serve`] plus the [`router`] it runs: `/` (service description),
//! `/process` (one pipeline run per request), `/data-info` (loaded datasets),
//! and `/static` (rendered charts).

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::services::ServeDir;

use crate::config::EmbedVizConfig;
use crate::dataset::{self, Origin};
use crate::embedding;
use crate::pipeline::{Pipeline, ProcessRequest, ProcessResponse};
use crate::render::ChartRenderer;

/// Shared setup: load datasets, create the embedding provider, prepare the chart directory.
///
/// Blocking (dataset download, blocking HTTP client); run via `spawn_blocking` from async code.
pub fn setup_pipeline(config: &EmbedVizConfig) -> Result<Pipeline> {
    let catalog = dataset::loader::load_catalog(config);
    for info in catalog.describe() {
        tracing::info!(data_type = %info.data_type, origin = %info.origin, count = info.count, "dataset available");
    }

    let provider = embedding::create_provider(&config.embedding)
        .context("failed to create embedding provider")?;
    let embedder: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!(model = embedder.model(), "embedding provider ready");

    let output_dir = config.resolved_output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create chart directory {}", output_dir.display()))?;

    Ok(Pipeline::new(
        Arc::new(catalog),
        embedder,
        config.reduction.clone(),
        ChartRenderer::new(output_dir, &config.chart),
    ))
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Fixed base for chart URLs; when unset the request's Host header is used.
    public_url: Option<String>,
    /// Used when a request carries no Host header.
    fallback_base: String,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, public_url: Option<String>, fallback_base: String) -> Self {
        Self {
            pipeline,
            public_url,
            fallback_base,
        }
    }

    fn base_reference(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        match host {
            Some(host) => format!("{scheme}://{host}"),
            None => self.fallback_base.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.pipeline.renderer().output_dir().to_path_buf();
    Router::new()
        .route("/", get(root))
        .route("/process", get(process))
        .route("/data-info", get(data_info))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Query parameters of `/process`. `source` is accepted as an alias of `origin`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessParams {
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub origin: Option<String>,
    pub source: Option<String>,
    pub text_field: Option<String>,
    pub title_field: Option<String>,
}

impl ProcessParams {
    pub fn into_request(self) -> Result<ProcessRequest, String> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let origin = match non_empty(self.origin).or(non_empty(self.source)) {
            Some(raw) => raw.parse::<Origin>()?,
            None => Origin::Builtin,
        };
        Ok(ProcessRequest {
            data_type: non_empty(self.data_type).unwrap_or_else(|| "articles".into()),
            origin,
            text_field: non_empty(self.text_field),
            title_field: non_empty(self.title_field),
        })
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Embeddings Visualization API!",
        "description": "Generate t-SNE visualizations of text embeddings for articles and movies",
        "endpoints": {
            "/process": "Generate embeddings and visualizations",
            "/process?type=articles": "Process articles (builtin data)",
            "/process?type=movies": "Process movies (builtin data)",
            "/process?type=movies&origin=external": "Process movies from the external catalog",
            "/data-info": "List available datasets and their fields",
            "/static/{file}": "Rendered charts"
        },
        "parameters": {
            "type": "Data type, e.g. 'articles' or 'movies' (default: 'articles')",
            "origin": "Data origin: 'builtin' or 'external' (default: 'builtin'; alias: source)",
            "text_field": "Field to embed (default depends on type)",
            "title_field": "Field used to label points (default: 'title')"
        }
    }))
}

async fn process(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ProcessParams>,
) -> (StatusCode, Json<ProcessResponse>) {
    let request = match params.into_request() {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ProcessResponse::invalid_request(e)),
            )
        }
    };

    let base = state.base_reference(&headers);
    tracing::info!(data_type = %request.data_type, origin = %request.origin, "process requested");

    let pipeline = Arc::clone(&state.pipeline);
    match tokio::task::spawn_blocking(move || pipeline.run(&request, &base)).await {
        Ok(outcome) => {
            let status = StatusCode::from_u16(outcome.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(ProcessResponse::from(&outcome)))
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline task failed");
            let mut response = ProcessResponse::invalid_request(format!("pipeline task failed: {e}"));
            response.error_type = Some("internal_error".into());
            response.message = Some("Failed to process data and generate visualization".into());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
    }
}

async fn data_info(State(state): State<AppState>) -> Json<Value> {
    let sources: serde_json::Map<String, Value> = state
        .pipeline
        .catalog()
        .describe()
        .into_iter()
        .map(|info| {
            let key = format!("{}_{}", info.data_type, info.origin);
            (key, json!(info))
        })
        .collect();
    Json(json!({ "available_data_sources": sources }))
}

/// Start the HTTP server and block until ctrl-c.
pub async fn serve(config: EmbedVizConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting embedviz server");

    let setup_config = config.clone();
    let pipeline = tokio::task::spawn_blocking(move || setup_pipeline(&setup_config))
        .await
        .context("setup task failed")??;

    let state = AppState::new(
        Arc::new(pipeline),
        config.server.public_url.clone(),
        format!("http://{bind_addr}"),
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("shutting down server");
        })
        .await?;

    Ok(())
}
