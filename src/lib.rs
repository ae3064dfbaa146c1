//! Embedding visualization: labeled text records in, annotated t-SNE scatter plots out.
//!
//! embedviz takes a small dataset of labeled records (articles, movies, or any
//! `<type>.json` in the data directory), embeds one text field per record via an
//! OpenAI-compatible embedding service, reduces the vectors to 2D with a seeded
//! t-SNE, and renders a PNG scatter plot with one annotation per point.
//!
//! # Pipeline
//!
//! | Stage | Module | Fails with |
//! |-------|--------|------------|
//! | **Resolve** | [`dataset`] | `FieldNotFoundError`, or the empty-dataset outcome |
//! | **Embed** | [`embedding`] | `EmbeddingProviderError` |
//! | **Reduce** | [`reduce`] | `ReduceError` (`InsufficientData` below two records) |
//! | **Render** | [`render`] | `RenderError` |
//!
//! [`pipeline::Pipeline`] runs the stages in order and turns every failure into a
//! [`pipeline::PipelineOutcome`] value instead of an error escaping to the host.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`dataset`]: Record catalog, field selection, and validation
//! - [`embedding`]: Text-to-vector embedding via a remote provider
//! - [`reduce`]: Seeded t-SNE projection to 2D
//! - [`render`]: PNG scatter plot artifacts
//! - [`pipeline`]: Orchestration and response payloads
//! - [`server`]: HTTP routes and static chart serving

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod pipeline;
pub mod reduce;
pub mod render;
pub mod server;
