use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use pageturn_core::{
    DocumentHandle, EngineError, LoadProgress, PageHandle, PageSize, RangeHints, RasterEngine,
    Surface,
};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Raster engine backed by pdfium.
pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
    http: reqwest::Client,
}

impl PdfiumEngine {
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .context("Failed to bind to PDFium library. Please install PDFium or download the library from https://github.com/bblanchon/pdfium-binaries")?;
        // Documents borrow the library for as long as the process runs.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));
        Ok(Self {
            pdfium,
            http: reqwest::Client::new(),
        })
    }

    fn load(&self, data: Vec<u8>) -> Result<PdfiumDocument, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(data, None)
            .map_err(|err| EngineError::Parse(err.to_string()))?;
        let page_count = document.pages().len() as u32;
        debug!(page_count, "pdf parsed");
        Ok(PdfiumDocument {
            inner: Rc::new(document),
            page_count,
        })
    }

    async fn fetch(
        &self,
        locator: &str,
        hints: RangeHints,
        progress: &LoadProgress,
    ) -> Result<Vec<u8>, EngineError> {
        if let Some(path) = locator.strip_prefix("file://") {
            let decoded = urlencoding::decode(path)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| path.to_string());
            return read_local(Path::new(&decoded)).await;
        }
        if !(locator.starts_with("http://") || locator.starts_with("https://")) {
            return Err(EngineError::Fetch(format!(
                "unsupported locator for this engine: {locator}"
            )));
        }

        // The whole file is pulled in one response; pdfium parses from memory.
        debug!(
            locator,
            chunk_size = hints.chunk_size,
            prefetch_all_pages = hints.prefetch_all_pages,
            "fetching document"
        );
        let mut response = self
            .http
            .get(locator)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| EngineError::Fetch(err.to_string()))?;

        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| EngineError::Fetch(err.to_string()))?
        {
            data.extend_from_slice(&chunk);
            progress.report(data.len() as u64, total);
        }
        info!(locator, bytes = data.len(), "document fetched");
        Ok(data)
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, EngineError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| EngineError::Fetch(format!("{}: {err}", path.display())))
}

impl RasterEngine for PdfiumEngine {
    type Document = PdfiumDocument;

    async fn open_from_locator(
        &self,
        locator: &str,
        hints: RangeHints,
        progress: &LoadProgress,
    ) -> Result<PdfiumDocument, EngineError> {
        let data = self.fetch(locator, hints, progress).await?;
        self.load(data)
    }

    async fn open_from_bytes(&self, data: Rc<[u8]>) -> Result<PdfiumDocument, EngineError> {
        self.load(data.to_vec())
    }
}

pub struct PdfiumDocument {
    inner: Rc<PdfDocument<'static>>,
    page_count: u32,
}

impl DocumentHandle for PdfiumDocument {
    type Page = PdfiumPage;

    fn page_count(&self) -> u32 {
        self.page_count
    }

    async fn get_page(&self, page_number: u32) -> Result<PdfiumPage, EngineError> {
        let index = page_index(page_number, self.page_count)?;
        let page = self
            .inner
            .pages()
            .get(index)
            .map_err(|err| EngineError::Render(err.to_string()))?;
        Ok(PdfiumPage {
            document: Rc::clone(&self.inner),
            index,
            width: f64::from(page.width().value),
            height: f64::from(page.height().value),
        })
    }
}

fn page_index(page_number: u32, page_count: u32) -> Result<u16, EngineError> {
    if page_number == 0 || page_number > page_count {
        return Err(EngineError::PageOutOfRange {
            page: page_number,
            page_count,
        });
    }
    u16::try_from(page_number - 1).map_err(|_| EngineError::PageOutOfRange {
        page: page_number,
        page_count,
    })
}

/// A page of a loaded document. Sizes are in PDF points, which the viewer
/// treats as logical pixels at scale 1.
pub struct PdfiumPage {
    document: Rc<PdfDocument<'static>>,
    index: u16,
    width: f64,
    height: f64,
}

impl PageHandle for PdfiumPage {
    fn intrinsic_size(&self, scale: f64) -> PageSize {
        PageSize {
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    async fn render_to(&self, surface: &mut Surface, viewport_scale: f64) -> Result<(), EngineError> {
        let page = self
            .document
            .pages()
            .get(self.index)
            .map_err(|err| EngineError::Render(err.to_string()))?;

        let target_width = (self.width * viewport_scale).round().max(1.0) as i32;
        let target_height = (self.height * viewport_scale).round().max(1.0) as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_maximum_height(target_height)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| EngineError::Render(err.to_string()))?;

        // pdfium hands back BGRA rows.
        let mut buffer = bitmap.as_raw_bytes().to_vec();
        for px in buffer.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        let mut img = image::RgbaImage::from_raw(
            bitmap.width() as u32,
            bitmap.height() as u32,
            buffer,
        )
        .ok_or_else(|| EngineError::Render("bitmap size does not match its buffer".into()))?;

        // Rounding can leave pdfium a pixel off the floored surface size.
        if img.dimensions() != (surface.width, surface.height) {
            img = image::imageops::resize(
                &img,
                surface.width,
                surface.height,
                image::imageops::FilterType::Triangle,
            );
        }
        surface.set_rgba(img.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_map_to_zero_based_indices() {
        assert_eq!(page_index(1, 3), Ok(0));
        assert_eq!(page_index(3, 3), Ok(2));
    }

    #[test]
    fn out_of_range_pages_are_rejected() {
        assert_eq!(
            page_index(0, 3),
            Err(EngineError::PageOutOfRange {
                page: 0,
                page_count: 3
            })
        );
        assert!(page_index(4, 3).is_err());
    }

    #[tokio::test]
    async fn missing_local_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_local(&dir.path().join("absent.pdf")).await.unwrap_err();
        assert!(matches!(err, EngineError::Fetch(_)));
    }
}
