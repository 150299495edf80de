use crate::document::{Document, LoadState};
use crate::engine::Surface;
use crate::layout::{ScrollMetrics, ScrollMode};

/// Inclusive scale range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `scale` into the range. NaN maps to `min`.
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            self.min
        } else {
            scale.clamp(self.min, self.max)
        }
    }

    pub fn contains(&self, scale: f64) -> bool {
        (self.min..=self.max).contains(&scale)
    }
}

/// Coarse status derived from the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Direction of the last page change, for transition animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageTransition {
    Forward,
    Backward,
    #[default]
    None,
}

/// Visual-only scale transform shown while a pinch is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchPreview {
    /// Live scale divided by the committed scale.
    pub ratio: f64,
    /// Transform origin in content coordinates of the committed surface.
    pub origin_x: f64,
    pub origin_y: f64,
}

/// What the last successful render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub page: u32,
    pub applied_scale: f64,
    pub auto_fit_applied: bool,
}

/// The aggregate every component reads and writes.
pub struct ViewerSession<H> {
    pub documents: Vec<Document<H>>,
    /// Valid index into `documents`, or `None` while the list is empty.
    pub active_index: Option<usize>,
    pub current_page: u32,
    pub total_pages: u32,
    pub scale: f64,
    pub auto_fit_scale: Option<f64>,
    pub is_overflowing: bool,
    /// Session-level message: load failure of the active document or a
    /// transient render failure.
    pub error_message: Option<String>,
    pub swipe_offset: f64,
    pub is_swiping_active: bool,
    pub pinch_preview: Option<PinchPreview>,
    pub page_transition: PageTransition,
    pub scroll: ScrollMetrics,
    pub scroll_mode: ScrollMode,
    /// Replaced wholesale on each successful render.
    pub surface: Option<Surface>,
    pub render_count: u64,
    pub last_render: Option<RenderSummary>,
}

impl<H> ViewerSession<H> {
    pub fn new(default_scale: f64) -> Self {
        Self {
            documents: Vec::new(),
            active_index: None,
            current_page: 1,
            total_pages: 0,
            scale: default_scale,
            auto_fit_scale: None,
            is_overflowing: false,
            error_message: None,
            swipe_offset: 0.0,
            is_swiping_active: false,
            pinch_preview: None,
            page_transition: PageTransition::None,
            scroll: ScrollMetrics::default(),
            scroll_mode: ScrollMode::Paging,
            surface: None,
            render_count: 0,
            last_render: None,
        }
    }

    pub fn active_document(&self) -> Option<&Document<H>> {
        self.documents.get(self.active_index?)
    }

    pub fn active_document_mut(&mut self) -> Option<&mut Document<H>> {
        let index = self.active_index?;
        self.documents.get_mut(index)
    }

    pub fn index_of(&self, id: &crate::document::DocumentId) -> Option<usize> {
        self.documents.iter().position(|doc| &doc.id == id)
    }

    pub fn status(&self) -> SessionStatus {
        match self.active_document() {
            None => SessionStatus::Idle,
            Some(doc) => match doc.load_state {
                LoadState::Idle | LoadState::Loading => SessionStatus::Loading,
                LoadState::Loaded => SessionStatus::Ready,
                LoadState::Error => SessionStatus::Error,
            },
        }
    }

    /// Clamp a page target into `[1, total_pages]`; 1 when nothing is loaded.
    pub fn clamp_page(&self, page: u32) -> u32 {
        page.clamp(1, self.total_pages.max(1))
    }

    /// Drop everything tied to the surface shown on screen.
    pub(crate) fn clear_view(&mut self) {
        self.surface = None;
        self.last_render = None;
        self.is_overflowing = false;
        self.scroll = ScrollMetrics::default();
        self.scroll_mode = ScrollMode::Paging;
        self.swipe_offset = 0.0;
        self.is_swiping_active = false;
        self.pinch_preview = None;
        self.page_transition = PageTransition::None;
    }
}

impl<H> std::fmt::Debug for ViewerSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("documents", &self.documents)
            .field("active_index", &self.active_index)
            .field("current_page", &self.current_page)
            .field("total_pages", &self.total_pages)
            .field("scale", &self.scale)
            .field("auto_fit_scale", &self.auto_fit_scale)
            .field("is_overflowing", &self.is_overflowing)
            .field("error_message", &self.error_message)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
