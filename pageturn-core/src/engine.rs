//! Contract of the rasterization engine
//!
//! The coordinator never parses or draws documents itself. It opens them,
//! asks for pages, and hands each page a [`Surface`] to paint. Everything
//! runs on one thread, so handles need not be `Send`.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::error::EngineError;

/// Width and height in CSS-like logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Preferences for progressive fetching of remote documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHints {
    pub chunk_size: u32,
    /// When false the engine should fetch pages lazily instead of pulling
    /// the whole file up front.
    pub prefetch_all_pages: bool,
}

/// Progress sink handed to the engine while a remote document downloads.
pub struct LoadProgress {
    label: String,
    last_percent: Cell<Option<u32>>,
}

impl LoadProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_percent: Cell::new(None),
        }
    }

    /// Record `loaded` of `total` bytes. Only whole-percent changes are logged.
    pub fn report(&self, loaded: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            debug!(document = %self.label, loaded, "load progress");
            return;
        };
        let percent = ((loaded.min(total) as f64 / total as f64) * 100.0).floor() as u32;
        if self.last_percent.get() != Some(percent) {
            self.last_percent.set(Some(percent));
            debug!(document = %self.label, percent, loaded, total, "load progress");
        }
    }

    pub fn last_percent(&self) -> Option<u32> {
        self.last_percent.get()
    }
}

/// Render target: `width`×`height` physical pixels shown at
/// `display_width`×`display_height` logical pixels.
#[derive(Clone, PartialEq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub display_width: f64,
    pub display_height: f64,
    /// RGBA8, row-major. Empty until the engine paints.
    pub pixels: Vec<u8>,
}

impl Surface {
    /// Size a surface for a page displayed at `display` on a screen with
    /// `device_pixel_ratio` physical pixels per logical pixel.
    pub fn for_display(display: PageSize, device_pixel_ratio: f64) -> Self {
        let physical = |logical: f64| {
            let px = (logical * device_pixel_ratio).floor();
            if px.is_finite() && px >= 1.0 {
                px.min(u32::MAX as f64) as u32
            } else {
                1
            }
        };
        Self {
            width: physical(display.width),
            height: physical(display.height),
            display_width: display.width,
            display_height: display.height,
            pixels: Vec::new(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Install painted pixels, which must cover the surface exactly.
    pub fn set_rgba(&mut self, pixels: Vec<u8>) -> Result<(), EngineError> {
        if pixels.len() != self.byte_len() {
            return Err(EngineError::Render(format!(
                "expected {} bytes for a {}x{} surface, got {}",
                self.byte_len(),
                self.width,
                self.height,
                pixels.len()
            )));
        }
        self.pixels = pixels;
        Ok(())
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("display_width", &self.display_width)
            .field("display_height", &self.display_height)
            .field("painted", &!self.pixels.is_empty())
            .finish()
    }
}

#[allow(async_fn_in_trait)]
pub trait RasterEngine {
    type Document: DocumentHandle + 'static;

    async fn open_from_locator(
        &self,
        locator: &str,
        hints: RangeHints,
        progress: &LoadProgress,
    ) -> Result<Self::Document, EngineError>;

    async fn open_from_bytes(&self, data: Rc<[u8]>) -> Result<Self::Document, EngineError>;
}

#[allow(async_fn_in_trait)]
pub trait DocumentHandle {
    type Page: PageHandle;

    fn page_count(&self) -> u32;

    /// Fetch page `page_number`, counted from 1.
    async fn get_page(&self, page_number: u32) -> Result<Self::Page, EngineError>;
}

#[allow(async_fn_in_trait)]
pub trait PageHandle {
    /// Size of the page at `scale`; `scale = 1` gives the intrinsic size.
    fn intrinsic_size(&self, scale: f64) -> PageSize;

    /// Paint the page into `surface`. `viewport_scale` already includes the
    /// device pixel ratio.
    async fn render_to(&self, surface: &mut Surface, viewport_scale: f64)
        -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_is_sized_in_physical_pixels() {
        let surface = Surface::for_display(
            PageSize {
                width: 636.5,
                height: 823.0,
            },
            2.0,
        );
        assert_eq!((surface.width, surface.height), (1273, 1646));
        assert_eq!(surface.display_width, 636.5);
    }

    #[test]
    fn degenerate_surface_keeps_one_pixel() {
        let surface = Surface::for_display(PageSize::default(), 3.0);
        assert_eq!((surface.width, surface.height), (1, 1));
    }

    #[test]
    fn set_rgba_checks_length() {
        let mut surface = Surface::for_display(
            PageSize {
                width: 2.0,
                height: 2.0,
            },
            1.0,
        );
        assert!(surface.set_rgba(vec![0; 3]).is_err());
        assert!(surface.set_rgba(vec![255; 16]).is_ok());
    }

    #[test]
    fn progress_tracks_whole_percent() {
        let progress = LoadProgress::new("a.pdf");
        progress.report(512, Some(1024));
        assert_eq!(progress.last_percent(), Some(50));
        progress.report(2048, Some(1024));
        assert_eq!(progress.last_percent(), Some(100));
        progress.report(10, None);
        assert_eq!(progress.last_percent(), Some(100));
    }
}
