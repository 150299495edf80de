//! Gesture scripts in, rendered pages out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pageturn_core::{PointerEvent, Surface};
use tracing::debug;

/// Read a JSON array of pointer events.
pub fn load_gestures(path: &Path) -> Result<Vec<PointerEvent>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gestures from {}", path.display()))?;
    let events: Vec<PointerEvent> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid gesture script {}", path.display()))?;
    debug!(events = events.len(), "gesture script loaded");
    Ok(events)
}

/// Write `surface` as `<name>-p<page>.png` under `dir`.
pub fn write_surface(dir: &Path, name: &str, page: u32, surface: &Surface) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}-p{page}.png", file_stem(name)));

    let pixels = if surface.pixels.is_empty() {
        vec![255; surface.byte_len()]
    } else {
        surface.pixels.clone()
    };
    let img = image::RgbaImage::from_raw(surface.width, surface.height, pixels)
        .context("Surface pixels do not match its size")?;
    img.save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "page".to_string()
    } else {
        stem
    }
}
