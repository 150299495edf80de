//! Viewer coordinator
//!
//! [`Viewer`] ties the session store to the engine and the environment. It
//! is single-threaded: share it as `Rc<Viewer<..>>` and drive it from a
//! `tokio::task::LocalSet`. Session borrows never span an `.await`; every
//! suspension point is an engine call or a timer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::engine::{RangeHints, RasterEngine};
use crate::environment::Environment;
use crate::error::ViewerError;
use crate::gesture::GestureRecognizer;
use crate::layout::{retarget_scroll, ContainerSize, FocusAnchor};
use crate::render::{self, sanitize_dpr, RenderOutput, RenderParams, RenderRequest};
use crate::session::{PageTransition, RenderSummary, SessionStatus, ViewerSession};
use crate::source::with_page_fragment;
use crate::store::Store;

/// Auto-fit and the current scale count as equal within this distance.
const AUTO_FIT_EPSILON: f64 = 0.01;

/// Keyboard commands understood by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    PreviousPage,
    NextPage,
    ZoomIn,
    ZoomOut,
    ResetZoom,
}

impl ViewerKey {
    /// Map a DOM-style key name.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::PreviousPage),
            "ArrowRight" => Some(Self::NextPage),
            "+" | "=" => Some(Self::ZoomIn),
            "-" => Some(Self::ZoomOut),
            "0" => Some(Self::ResetZoom),
            _ => None,
        }
    }
}

pub type Session<E> = ViewerSession<<E as RasterEngine>::Document>;

pub struct Viewer<E: RasterEngine, V: Environment> {
    pub(crate) engine: E,
    pub(crate) env: V,
    pub(crate) config: ViewerConfig,
    pub(crate) state: Store<Session<E>>,
    pub(crate) gestures: RefCell<GestureRecognizer>,
    pub(crate) container: Cell<Option<ContainerSize>>,
    /// Single deferred render, waiting for a container.
    pub(crate) pending: Cell<Option<RenderRequest>>,
    /// Newest render ticket handed out; older results are stale.
    pub(crate) render_ticket: Cell<u64>,
    /// Bumped whenever the document list is replaced wholesale.
    pub(crate) session_generation: Cell<u64>,
    pub(crate) resize_generation: Cell<u64>,
    pub(crate) gesture_epoch: Cell<u64>,
    pub(crate) device_pixel_ratio: Cell<f64>,
}

impl<E, V> Viewer<E, V>
where
    E: RasterEngine + 'static,
    V: Environment + 'static,
{
    pub fn new(engine: E, env: V, config: ViewerConfig) -> Rc<Self> {
        let device_pixel_ratio = sanitize_dpr(env.device_pixel_ratio());
        let default_scale = config.scale_bounds().clamp(config.default_scale);
        Rc::new(Self {
            engine,
            env,
            state: Store::new(ViewerSession::new(default_scale)),
            config,
            gestures: RefCell::new(GestureRecognizer::new()),
            container: Cell::new(None),
            pending: Cell::new(None),
            render_ticket: Cell::new(0),
            session_generation: Cell::new(0),
            resize_generation: Cell::new(0),
            gesture_epoch: Cell::new(0),
            device_pixel_ratio: Cell::new(device_pixel_ratio),
        })
    }

    pub fn state(&self) -> &Store<Session<E>> {
        &self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn environment(&self) -> &V {
        &self.env
    }

    pub fn status(&self) -> SessionStatus {
        self.state.with(ViewerSession::status)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.state.with(|s| s.active_index)
    }

    pub fn current_page(&self) -> u32 {
        self.state.with(|s| s.current_page)
    }

    pub fn total_pages(&self) -> u32 {
        self.state.with(|s| s.total_pages)
    }

    pub fn scale(&self) -> f64 {
        self.state.with(|s| s.scale)
    }

    pub fn auto_fit_scale(&self) -> Option<f64> {
        self.state.with(|s| s.auto_fit_scale)
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio.get()
    }

    pub fn container(&self) -> Option<ContainerSize> {
        self.container.get()
    }

    pub fn pending_render(&self) -> Option<RenderRequest> {
        self.pending.get()
    }

    /// Whether the scale has drifted away from the last auto-fit result.
    pub fn is_auto_fit_different(&self) -> bool {
        self.state.with(|s| {
            s.auto_fit_scale
                .is_some_and(|fit| (s.scale - fit).abs() > AUTO_FIT_EPSILON)
        })
    }

    /// Whether tap zones for previous/next page should be shown.
    pub fn page_navigation_enabled(&self) -> bool {
        let overflowing = self.state.with(|s| s.is_overflowing);
        self.config.show_page_navigation_buttons
            && !(self.config.auto_disable_navigation_on_zoom && overflowing)
    }

    pub(crate) fn range_hints(&self) -> RangeHints {
        RangeHints {
            chunk_size: self.config.range_chunk_size,
            prefetch_all_pages: self.config.prefetch_all_pages,
        }
    }

    /// Make every render started so far stale and drop the deferred one.
    pub(crate) fn invalidate_renders(&self) {
        self.render_ticket.set(self.render_ticket.get() + 1);
        self.pending.set(None);
    }

    /// Render `page_number` of the active document, fitting it to the
    /// container width when `apply_auto_fit` is set.
    pub async fn render_page(
        &self,
        page_number: u32,
        apply_auto_fit: bool,
    ) -> Result<(), ViewerError> {
        self.execute_render(RenderRequest::new(page_number, apply_auto_fit), None)
            .await
    }

    pub async fn go_to_page(&self, page: u32) -> Result<(), ViewerError> {
        let target = self.state.with(|s| {
            let doc = s.active_document().filter(|doc| doc.is_loaded())?;
            let target = page.clamp(1, doc.page_count.max(1));
            let unchanged = target == s.current_page && s.surface.is_some();
            (!unchanged).then_some((s.current_page, target))
        });
        let Some((current, target)) = target else {
            return Ok(());
        };

        let transition = match target.cmp(&current) {
            std::cmp::Ordering::Greater => PageTransition::Forward,
            std::cmp::Ordering::Less => PageTransition::Backward,
            std::cmp::Ordering::Equal => PageTransition::None,
        };
        debug!(from = current, to = target, ?transition, "navigating");
        self.state.update(|s| s.page_transition = transition);
        self.execute_render(RenderRequest::new(target, false), None)
            .await
    }

    pub async fn next_page(&self) -> Result<(), ViewerError> {
        let page = self.current_page().saturating_add(1);
        self.go_to_page(page).await
    }

    pub async fn previous_page(&self) -> Result<(), ViewerError> {
        let page = self.current_page().saturating_sub(1);
        self.go_to_page(page).await
    }

    pub async fn zoom_in(&self) -> Result<(), ViewerError> {
        self.zoom_to(self.scale() + self.config.zoom_step).await
    }

    pub async fn zoom_out(&self) -> Result<(), ViewerError> {
        self.zoom_to(self.scale() - self.config.zoom_step).await
    }

    pub async fn reset_zoom(&self) -> Result<(), ViewerError> {
        self.zoom_to(self.config.default_scale).await
    }

    /// Re-render the current page fitted to the container width.
    pub async fn fit_to_width(&self) -> Result<(), ViewerError> {
        let page = self.current_page();
        self.execute_render(RenderRequest::new(page, true), None)
            .await
    }

    async fn zoom_to(&self, scale: f64) -> Result<(), ViewerError> {
        let target = self.config.scale_bounds().clamp(scale);
        let (current_scale, page) = self.state.with(|s| (s.scale, s.current_page));
        if (target - current_scale).abs() < f64::EPSILON {
            return Ok(());
        }
        debug!(from = current_scale, to = target, "zooming");
        self.execute_render(RenderRequest::at_scale(page, target), None)
            .await
    }

    pub async fn handle_key(&self, key: ViewerKey) -> Result<(), ViewerError> {
        match key {
            ViewerKey::PreviousPage => self.previous_page().await,
            ViewerKey::NextPage => self.next_page().await,
            ViewerKey::ZoomIn => self.zoom_in().await,
            ViewerKey::ZoomOut => self.zoom_out().await,
            ViewerKey::ResetZoom => self.reset_zoom().await,
        }
    }

    /// Attach (or re-measure) the container and run any deferred render.
    pub async fn attach_container(&self, size: ContainerSize) -> Result<(), ViewerError> {
        self.container.set(Some(size));
        self.state.update(|s| {
            s.scroll.client_width = size.width;
            s.scroll.client_height = size.height;
        });
        match self.pending.take() {
            Some(request) => {
                info!(page = request.page_number, "container attached; running deferred render");
                self.execute_render(request, None).await
            }
            None => Ok(()),
        }
    }

    pub fn detach_container(&self) {
        self.container.set(None);
    }

    /// Record a native scroll of the container.
    pub fn on_scroll(&self, scroll_left: f64, scroll_top: f64) {
        self.state
            .update(|s| s.scroll = s.scroll.scrolled_to(scroll_left, scroll_top));
    }

    pub(crate) async fn execute_render(
        &self,
        request: RenderRequest,
        focus: Option<FocusAnchor>,
    ) -> Result<(), ViewerError> {
        let Some(container) = self.container.get() else {
            if let Some(previous) = self.pending.replace(Some(request)) {
                debug!(
                    superseded = previous.page_number,
                    page = request.page_number,
                    "deferred render replaced"
                );
            } else {
                debug!(page = request.page_number, "no container attached; render deferred");
            }
            return Ok(());
        };

        let snapshot = self.state.with(|s| {
            let doc = s.active_document()?;
            Some((doc.id.clone(), doc.handle()?, doc.page_count, s.scale))
        });
        let Some((id, handle, page_count, scale)) = snapshot else {
            debug!(page = request.page_number, "no loaded document to render");
            return Ok(());
        };

        let page_number = request.page_number.clamp(1, page_count.max(1));
        let ticket = self.render_ticket.get() + 1;
        self.render_ticket.set(ticket);

        let params = RenderParams {
            page_number,
            scale: request.target_scale.unwrap_or(scale),
            device_pixel_ratio: self.device_pixel_ratio.get(),
            apply_auto_fit: request.apply_auto_fit,
            container_width: container.width,
            fit_padding: self.config.fit_padding,
            bounds: self.config.scale_bounds(),
        };
        let result = render::render_page(&*handle, &params).await;

        if self.render_ticket.get() != ticket {
            debug!(ticket, page = page_number, "discarding stale render");
            return Ok(());
        }
        let still_active = self
            .state
            .with(|s| s.active_document().is_some_and(|doc| doc.id == id));
        if !still_active {
            debug!(document = %id, page = page_number, "document no longer active; render dropped");
            return Ok(());
        }

        match result {
            Ok(output) => {
                let container = self.container.get().unwrap_or(container);
                self.commit_render(output, page_number, page_count, container, focus);
                self.sync_location();
                Ok(())
            }
            Err(source) => {
                warn!(page = page_number, error = %source, "render failed");
                self.state.update(|s| {
                    s.error_message = Some(format!("Failed to render page {page_number}: {source}"));
                    s.pinch_preview = None;
                });
                Err(ViewerError::RenderFailed {
                    page: page_number,
                    source,
                })
            }
        }
    }

    fn commit_render(
        &self,
        output: RenderOutput,
        page_number: u32,
        page_count: u32,
        container: ContainerSize,
        focus: Option<FocusAnchor>,
    ) {
        let blend_threshold = self.config.focus_blend_threshold_px;
        self.state.update(|s| {
            let scroll = retarget_scroll(
                &s.scroll,
                container,
                output.surface.display_width,
                output.surface.display_height,
                output.applied_scale,
                focus,
                blend_threshold,
            );
            s.scroll = scroll;
            s.scroll_mode = scroll.mode();
            s.is_overflowing = scroll.is_overflowing();
            if let Some(fit) = output.fit {
                s.auto_fit_scale = Some(fit.scale);
            }
            s.scale = output.applied_scale;
            s.current_page = page_number;
            s.total_pages = page_count;
            s.surface = Some(output.surface);
            s.render_count += 1;
            s.last_render = Some(RenderSummary {
                page: page_number,
                applied_scale: output.applied_scale,
                auto_fit_applied: output.fit.is_some(),
            });
            s.error_message = None;
            s.pinch_preview = None;
            if let Some(doc) = s.active_document_mut() {
                doc.last_viewed_page = Some(page_number);
            }
        });
    }

    /// Rewrite the navigation value so the active locator carries the
    /// current page. Other remote documents keep their own page.
    fn sync_location(&self) {
        let location = self.state.with(|s| {
            let active = s.active_document()?;
            active.locator.remote()?;
            let locators: Vec<String> = s
                .documents
                .iter()
                .filter_map(|doc| {
                    let url = doc.locator.remote()?;
                    let page = if doc.id == active.id {
                        Some(s.current_page)
                    } else {
                        doc.last_viewed_page.or(doc.initial_page)
                    };
                    Some(match page {
                        Some(page) => with_page_fragment(url, page),
                        None => url.to_string(),
                    })
                })
                .collect();
            Some(locators.join(","))
        });

        if let Some(location) = location {
            if self.env.current_location().as_deref() != Some(location.as_str()) {
                debug!(%location, "navigation fragment updated");
                self.env.replace_location(&location);
            }
        }
    }
}
