//! Chart Renderer: annotated 2D scatter plots written as PNG artifacts.
//!
//! Artifacts are named `tsne_{key}.png` inside the output directory. Each
//! render draws into a private temporary file and renames it over the target,
//! so repeated renders with the same key overwrite (last writer wins) and a
//! failed render never leaves a partial image behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::config::ChartConfig;
use crate::reduce::Point2D;

const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write chart at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to draw chart: {0}")]
    Draw(String),

    #[error("failed to load chart font: {0}")]
    Font(String),
}

/// A rendered chart on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
}

pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    font_size: u32,
    point_radius: u32,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, config: &ChartConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            width: config.width.max(200),
            height: config.height.max(200),
            font_size: config.font_size.max(6),
            point_radius: config.point_radius.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Draw `points` annotated with `labels` and store it under `artifact_key`.
    ///
    /// # Panics
    ///
    /// Panics if `points` and `labels` differ in length.
    pub fn render(
        &self,
        points: &[Point2D],
        labels: &[String],
        artifact_key: &str,
        caption: &str,
    ) -> Result<Artifact, RenderError> {
        assert_eq!(
            points.len(),
            labels.len(),
            "every point needs exactly one label"
        );

        ensure_font()?;
        std::fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let file_name = artifact_file_name(artifact_key);
        let path = self.output_dir.join(&file_name);
        let tmp_path = self.output_dir.join(format!(
            ".{}.{}.{}.png",
            file_name.trim_end_matches(".png"),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = self.draw(&tmp_path, points, labels, caption) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }
        std::fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp_path);
            RenderError::Io {
                path: path.clone(),
                source,
            }
        })?;

        tracing::debug!(path = %path.display(), points = points.len(), "chart written");
        Ok(Artifact { file_name, path })
    }

    /// The drawing surface lives only inside this call and is released on every return path.
    fn draw(
        &self,
        path: &Path,
        points: &[Point2D],
        labels: &[String],
        caption: &str,
    ) -> Result<(), RenderError> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let (x_range, y_range) = axis_ranges(points);
        let mut chart = ChartBuilder::on(&root)
            .caption(caption, (FONT_FAMILY, f64::from(self.font_size * 2)).into_font())
            .margin(self.font_size)
            .x_label_area_size(self.font_size * 3)
            .y_label_area_size(self.font_size * 4)
            .build_cartesian_2d(x_range, y_range)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc("t-SNE Component 1")
            .y_desc("t-SNE Component 2")
            .label_style((FONT_FAMILY, f64::from(self.font_size)).into_font())
            .axis_desc_style((FONT_FAMILY, f64::from(self.font_size + 4)).into_font())
            .bold_line_style(BLACK.mix(0.15))
            .light_line_style(BLACK.mix(0.05))
            .draw()
            .map_err(draw_err)?;

        let radius = self.point_radius;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|p| Circle::new((p.x, p.y), radius, BLUE.mix(0.7).filled())),
            )
            .map_err(draw_err)?;

        let label_style = (FONT_FAMILY, f64::from(self.font_size))
            .into_font()
            .color(&BLACK.mix(0.8));
        chart
            .draw_series(
                points
                    .iter()
                    .zip(labels)
                    .map(|(p, label)| Text::new(label.clone(), (p.x, p.y), label_style.clone())),
            )
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        Ok(())
    }
}

/// File name for an artifact key: `tsne_{key}.png`, restricted to `[A-Za-z0-9_-]`.
pub fn artifact_file_name(artifact_key: &str) -> String {
    let key: String = artifact_key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("tsne_{key}.png")
}

/// Caption such as `t-SNE Visualization of Movies (builtin)`.
pub fn chart_caption(data_type: &str, origin: &str) -> String {
    let mut chars = data_type.chars();
    let title: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("t-SNE Visualization of {title} ({origin})")
}

/// Data bounds padded by 10% per axis (by 1.0 when an axis has zero span).
fn axis_ranges(points: &[Point2D]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    fn padded(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !min.is_finite() || !max.is_finite() {
            return -1.0..1.0;
        }
        let span = max - min;
        let pad = if span > 0.0 { span * 0.1 } else { 1.0 };
        (min - pad)..(max + pad)
    }
    (
        padded(points.iter().map(|p| p.x)),
        padded(points.iter().map(|p| p.y)),
    )
}

/// Register the bundled font with plotters once per process.
fn ensure_font() -> Result<(), RenderError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "invalid font data".to_string())
        })
        .clone()
        .map_err(RenderError::Font)
}

fn draw_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Draw(e.to_string())
}
