mod helpers;

use embedviz::config::ChartConfig;
use embedviz::reduce::Point2D;
use embedviz::render::{ChartRenderer, RenderError};
use helpers::{list_files, small_chart};
use tempfile::TempDir;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn points() -> Vec<Point2D> {
    vec![
        Point2D { x: -3.0, y: 1.5 },
        Point2D { x: 0.0, y: 0.0 },
        Point2D { x: 2.5, y: -4.0 },
    ]
}

fn labels() -> Vec<String> {
    vec!["Alien".into(), "Amélie".into(), "A very long title that may overlap its neighbours".into()]
}

#[test]
fn render_writes_png_under_derived_name() {
    let tmp = TempDir::new().unwrap();
    let renderer = ChartRenderer::new(tmp.path(), &small_chart());

    let artifact = renderer
        .render(&points(), &labels(), "movies_builtin", "t-SNE Visualization of Movies (builtin)")
        .unwrap();

    assert_eq!(artifact.file_name, "tsne_movies_builtin.png");
    assert_eq!(artifact.path, tmp.path().join("tsne_movies_builtin.png"));
    let bytes = std::fs::read(&artifact.path).unwrap();
    assert_eq!(bytes[..8], PNG_MAGIC);
}

#[test]
fn render_twice_overwrites_same_path() {
    let tmp = TempDir::new().unwrap();
    let renderer = ChartRenderer::new(tmp.path(), &small_chart());

    let first = renderer.render(&points(), &labels(), "articles_builtin", "first").unwrap();
    let second = renderer.render(&points(), &labels(), "articles_builtin", "first").unwrap();

    assert_eq!(first, second);
    assert_eq!(list_files(tmp.path()), vec!["tsne_articles_builtin.png"]);
}

#[test]
fn render_creates_missing_output_dir() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("static").join("charts");
    let renderer = ChartRenderer::new(&nested, &ChartConfig::default());

    let artifact = renderer
        .render(&points()[..2], &labels()[..2], "movies_external", "caption")
        .unwrap();
    assert!(artifact.path.starts_with(&nested));
    assert!(artifact.path.exists());
}

#[test]
fn coincident_points_still_render() {
    let tmp = TempDir::new().unwrap();
    let renderer = ChartRenderer::new(tmp.path(), &small_chart());
    let same = vec![Point2D { x: 1.0, y: 1.0 }; 2];
    let labels = vec!["one".to_string(), "two".to_string()];
    assert!(renderer.render(&same, &labels, "flat", "flat").is_ok());
}

#[test]
fn failed_write_leaves_no_temporary_file() {
    let tmp = TempDir::new().unwrap();
    // A directory squatting on the target path makes the final rename fail.
    std::fs::create_dir(tmp.path().join("tsne_k.png")).unwrap();
    let renderer = ChartRenderer::new(tmp.path(), &small_chart());

    let err = renderer.render(&points(), &labels(), "k", "caption").unwrap_err();

    match err {
        RenderError::Io { path, .. } => assert_eq!(path, tmp.path().join("tsne_k.png")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(list_files(tmp.path()), vec!["tsne_k.png"]);
    assert!(tmp.path().join("tsne_k.png").is_dir());

    // The renderer stays usable for other keys afterwards.
    let artifact = renderer.render(&points(), &labels(), "k2", "caption").unwrap();
    assert!(artifact.path.is_file());
}
