use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pageturn_core::{
    ContainerSize, DocumentSource, SessionStatus, StaticEnvironment, Viewer, ViewerConfig,
};
use tokio::task::LocalSet;
use tracing::{info, warn};

mod renderer;
mod script;

use renderer::PdfiumEngine;

const DEFAULT_LOG_FILTER: &str = "pageturn_viewer=debug,pageturn_core=info";

#[derive(Parser, Debug)]
#[command(name = "pageturn-viewer", version, about = "Open documents headlessly and render the active page")]
struct Args {
    /// Local paths (read as bytes) or remote locators, optionally with `#page=N`
    #[arg(required = true)]
    sources: Vec<String>,

    #[arg(long, default_value_t = 800.0)]
    container_width: f64,

    #[arg(long, default_value_t = 1000.0)]
    container_height: f64,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,

    /// Window width used to classify long swipes; defaults to the container width
    #[arg(long)]
    window_width: Option<f64>,

    /// Switch to this document (0-based) once everything has loaded
    #[arg(long)]
    activate: Option<usize>,

    /// Go to this page after activation
    #[arg(long)]
    page: Option<u32>,

    /// JSON array of pointer events to replay
    #[arg(long)]
    gestures: Option<PathBuf>,

    /// JSON viewer configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the rendered page
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    LocalSet::new().block_on(&runtime, run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let gestures = match &args.gestures {
        Some(path) => script::load_gestures(path)?,
        None => Vec::new(),
    };

    let engine = PdfiumEngine::new()?;
    let env = StaticEnvironment::new(
        args.dpr,
        args.window_width.unwrap_or(args.container_width),
    );
    let viewer = Viewer::new(engine, env, config);

    viewer
        .attach_container(ContainerSize::new(args.container_width, args.container_height))
        .await?;

    let sources = args
        .sources
        .iter()
        .map(|raw| to_source(raw))
        .collect::<Result<Vec<_>>>()?;
    let mut report = viewer.open_sources(sources).await?;
    for rejected in &report.rejected {
        warn!(error = %rejected, "source skipped");
    }
    if let Some(err) = &report.active_load {
        warn!(error = %err, "first document failed to load");
    }
    if let Some(background) = report.background.take() {
        background.await.context("Background loads panicked")?;
    }

    if let Some(index) = args.activate {
        viewer.switch_to(index).await?;
    }
    if let Some(page) = args.page {
        viewer.go_to_page(page).await?;
    }

    for event in gestures {
        let response = viewer.handle_pointer(event);
        if let Some(task) = response.task {
            task.await.context("Gesture follow-up panicked")?;
        }
    }

    log_summary(&viewer);

    if viewer.status() == SessionStatus::Error {
        let message = viewer
            .state()
            .with(|s| s.error_message.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("Session ended in error: {message}");
    }

    if let Some(dir) = &args.out {
        let written = viewer.state().with(|s| {
            let name = s
                .active_document()
                .map(|doc| doc.display_name.clone())
                .unwrap_or_default();
            s.surface
                .as_ref()
                .map(|surface| script::write_surface(dir, &name, s.current_page, surface))
        });
        match written {
            Some(path) => println!("Saved to: {}", path?.display()),
            None => warn!("no page was rendered; nothing written"),
        }
    }
    Ok(())
}

/// Existing local files are read as bytes; anything else is a locator.
fn to_source(raw: &str) -> Result<DocumentSource> {
    let path = Path::new(raw);
    if !path.is_file() {
        return Ok(DocumentSource::Locator(raw.to_string()));
    }
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw.to_string());
    Ok(DocumentSource::Bytes { file_name, data })
}

fn log_summary(viewer: &Rc<Viewer<PdfiumEngine, StaticEnvironment>>) {
    viewer.state().with(|s| {
        for (index, doc) in s.documents.iter().enumerate() {
            info!(
                index,
                name = %doc.display_name,
                state = ?doc.load_state,
                pages = doc.page_count,
                error = doc.error_detail.as_deref().unwrap_or(""),
                active = s.active_index == Some(index),
                "document"
            );
        }
        info!(
            status = ?s.status(),
            page = s.current_page,
            total_pages = s.total_pages,
            scale = s.scale,
            auto_fit_scale = ?s.auto_fit_scale,
            renders = s.render_count,
            "session"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_are_treated_as_locators() {
        let source = to_source("https://example.com/a.pdf#page=2").unwrap();
        assert!(matches!(source, DocumentSource::Locator(ref l) if l.ends_with("#page=2")));
    }

    #[test]
    fn local_files_are_read_as_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();

        match to_source(path.to_str().unwrap()).unwrap() {
            DocumentSource::Bytes { file_name, data } => {
                assert_eq!(file_name, "notes.pdf");
                assert_eq!(data, b"%PDF-1.7\n");
            }
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["pageturn-viewer", "a.pdf", "--dpr", "2"]).unwrap();
        assert_eq!(args.sources, vec!["a.pdf"]);
        assert_eq!(args.dpr, 2.0);
        assert_eq!(args.window_width, None);
        assert_eq!(args.container_width, 800.0);
    }
}
