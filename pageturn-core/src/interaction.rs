use std::rc::Rc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RasterEngine;
use crate::environment::Environment;
use crate::error::ViewerError;
use crate::gesture::{GestureContext, GestureOutcome, PointerEvent, SwipeDecision};
use crate::layout::ContainerSize;
use crate::render::{sanitize_dpr, RenderRequest};
use crate::viewer::Viewer;

/// What the host should do with a pointer event.
#[derive(Debug)]
pub struct PointerResponse {
    pub outcome: GestureOutcome,
    pub prevent_default: bool,
    /// Follow-up work (page turn, pinch re-render, swipe settle) running on
    /// the current `LocalSet`.
    pub task: Option<JoinHandle<()>>,
}

impl<E, V> Viewer<E, V>
where
    E: RasterEngine + 'static,
    V: Environment + 'static,
{
    fn gesture_context(&self) -> GestureContext {
        let bounds = self.config.scale_bounds();
        let viewport_width = self.env.viewport_width();
        self.state.with(|s| GestureContext {
            current_page: s.current_page,
            total_pages: s.total_pages,
            scale: s.scale,
            auto_fit_scale: s.auto_fit_scale,
            bounds,
            viewport_width,
            is_overflowing: s.is_overflowing,
            scroll: s.scroll,
        })
    }

    /// Feed one pointer event through the gesture recognizer and apply the
    /// result to the session.
    pub fn handle_pointer(self: &Rc<Self>, event: PointerEvent) -> PointerResponse {
        let ctx = self.gesture_context();
        let outcome = self.gestures.borrow_mut().handle(&event, &ctx);

        let task = match outcome {
            GestureOutcome::Ignored => None,
            GestureOutcome::SwipeStarted => {
                self.bump_gesture_epoch();
                self.state.update(|s| {
                    s.is_swiping_active = true;
                    s.swipe_offset = 0.0;
                });
                None
            }
            GestureOutcome::SwipeMoved { offset, .. } => {
                self.state.update(|s| s.swipe_offset = offset);
                None
            }
            GestureOutcome::SwipeEnded { decision, .. } => {
                self.state.update(|s| s.swipe_offset = 0.0);
                Some(self.finish_swipe(decision))
            }
            GestureOutcome::PinchStarted { .. } => {
                self.bump_gesture_epoch();
                self.state.update(|s| {
                    s.swipe_offset = 0.0;
                    s.is_swiping_active = false;
                    s.pinch_preview = None;
                });
                None
            }
            GestureOutcome::PinchMoved { preview, .. } => {
                self.state.update(|s| s.pinch_preview = Some(preview));
                None
            }
            GestureOutcome::PinchCommitted {
                scale,
                focus,
                snapped,
            } => {
                let viewer = Rc::clone(self);
                let page = ctx.current_page;
                Some(tokio::task::spawn_local(async move {
                    debug!(scale, snapped, "re-rendering after pinch");
                    let request = RenderRequest::at_scale(page, scale);
                    if let Err(err) = viewer.execute_render(request, focus).await {
                        warn!(error = %err, "render after pinch failed");
                    }
                    viewer.state.update(|s| s.pinch_preview = None);
                }))
            }
            GestureOutcome::PinchCancelled { restore_scale } => {
                self.state.update(|s| {
                    s.pinch_preview = None;
                    s.scale = restore_scale;
                });
                None
            }
        };

        PointerResponse {
            prevent_default: outcome.prevent_default(),
            outcome,
            task,
        }
    }

    fn bump_gesture_epoch(&self) -> u64 {
        let epoch = self.gesture_epoch.get() + 1;
        self.gesture_epoch.set(epoch);
        epoch
    }

    /// Turn the page if the swipe committed, and clear the swiping flag once
    /// the snap-back settles unless another gesture started meanwhile.
    fn finish_swipe(self: &Rc<Self>, decision: SwipeDecision) -> JoinHandle<()> {
        let viewer = Rc::clone(self);
        let epoch = self.gesture_epoch.get();
        let settle = self.config.swipe_settle();

        tokio::task::spawn_local(async move {
            let turn = async {
                if let SwipeDecision::Commit { target_page, .. } = decision {
                    if let Err(err) = viewer.go_to_page(target_page).await {
                        warn!(error = %err, target_page, "page turn failed");
                    }
                }
            };
            let settled = async {
                tokio::time::sleep(settle).await;
                if viewer.gesture_epoch.get() == epoch {
                    viewer.state.update(|s| s.is_swiping_active = false);
                }
            };
            tokio::join!(turn, settled);
        })
    }

    /// Note a new container size and re-fit the current page once the size
    /// has been stable for the debounce period.
    pub fn on_resize(self: &Rc<Self>, size: ContainerSize) -> JoinHandle<()> {
        self.container.set(Some(size));
        self.state.update(|s| {
            s.scroll.client_width = size.width;
            s.scroll.client_height = size.height;
        });
        let generation = self.resize_generation.get() + 1;
        self.resize_generation.set(generation);

        let viewer = Rc::clone(self);
        let delay = self.config.resize_debounce();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if viewer.resize_generation.get() != generation {
                debug!(generation, "resize superseded");
                return;
            }
            let request = viewer
                .pending
                .take()
                .map(|pending| RenderRequest::new(pending.page_number, true))
                .unwrap_or_else(|| RenderRequest::new(viewer.current_page(), true));
            info!(
                width = size.width,
                height = size.height,
                page = request.page_number,
                "container resized; refitting"
            );
            if let Err(err) = viewer.execute_render(request, None).await {
                warn!(error = %err, "render after resize failed");
            }
        })
    }

    /// Re-read the device pixel ratio and re-render when it changed.
    /// Returns whether it changed.
    pub async fn on_dpi_change(&self) -> Result<bool, ViewerError> {
        let ratio = sanitize_dpr(self.env.device_pixel_ratio());
        let previous = self.device_pixel_ratio.get();
        if (ratio - previous).abs() < f64::EPSILON {
            return Ok(false);
        }
        info!(from = previous, to = ratio, "device pixel ratio changed");
        self.device_pixel_ratio.set(ratio);
        let page = self.current_page();
        self.execute_render(RenderRequest::new(page, true), None)
            .await?;
        Ok(true)
    }
}
