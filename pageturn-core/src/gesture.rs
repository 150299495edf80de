//! Pointer gesture recognition
//!
//! [`GestureRecognizer`] is a pure state machine: it consumes pointer events
//! together with a snapshot of the viewer ([`GestureContext`]) and reports
//! one [`GestureOutcome`] per event. It never renders and never fails;
//! inconsistent input (an up without a down, mouse pointers) is ignored.
//!
//! One touch or pen pointer drives a page swipe, two drive a pinch. A pinch
//! can interrupt a swipe but not the other way around: after a pinch, any
//! finger left on the screen is ignored until every pointer is lifted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::layout::{FocusAnchor, ScrollMetrics};
use crate::session::{PageTransition, PinchPreview, ScaleBounds};

/// Swipe velocity above which a drag counts as fast, in px/ms.
pub const SWIPE_VELOCITY_THRESHOLD: f64 = 0.5;
/// Fraction of the viewport width above which a drag counts as long.
pub const SWIPE_DISTANCE_RATIO: f64 = 0.5;
/// Rubber-band factor for drags past the first or last page.
pub const EDGE_DAMPING: f64 = 0.3;
/// A drag is vertical when `|dy| > VERTICAL_DOMINANCE_RATIO * |dx|`.
pub const VERTICAL_DOMINANCE_RATIO: f64 = 0.5;
/// Horizontal travel after which native scrolling is suppressed.
pub const SCROLL_SUPPRESS_THRESHOLD_PX: f64 = 10.0;
pub const PINCH_SNAP_MAX_DURATION_MS: f64 = 350.0;
pub const PINCH_SNAP_MAX_RATIO: f64 = 0.85;
pub const PINCH_SNAP_AUTO_FIT_TOLERANCE: f64 = 1.05;

/// Two pointers closer than this are treated as this far apart.
const MIN_PINCH_DISTANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer event. Coordinates are relative to the visible top-left of
/// the container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub id: i64,
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: f64,
}

impl PointerEvent {
    pub fn touch(id: i64, phase: PointerPhase, x: f64, y: f64, timestamp_ms: f64) -> Self {
        Self {
            id,
            kind: PointerKind::Touch,
            phase,
            x,
            y,
            timestamp_ms,
        }
    }
}

/// Viewer state the recognizer needs to classify an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureContext {
    pub current_page: u32,
    pub total_pages: u32,
    /// Committed scale of the surface on screen.
    pub scale: f64,
    pub auto_fit_scale: Option<f64>,
    pub bounds: ScaleBounds,
    pub viewport_width: f64,
    pub is_overflowing: bool,
    pub scroll: ScrollMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeMetrics {
    pub distance: f64,
    pub duration_ms: f64,
    pub velocity: f64,
    pub is_fast: bool,
    pub is_long: bool,
    pub vertical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwipeDecision {
    Commit {
        target_page: u32,
        direction: PageTransition,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Ignored,
    SwipeStarted,
    SwipeMoved {
        offset: f64,
        prevent_default: bool,
    },
    SwipeEnded {
        decision: SwipeDecision,
        metrics: SwipeMetrics,
    },
    PinchStarted {
        swipe_aborted: bool,
    },
    PinchMoved {
        preview: PinchPreview,
        scale: f64,
        focus: FocusAnchor,
    },
    /// Re-render at `scale`. `focus` is `None` after a snap to auto-fit.
    PinchCommitted {
        scale: f64,
        focus: Option<FocusAnchor>,
        snapped: bool,
    },
    /// Drop the preview and keep `restore_scale`.
    PinchCancelled {
        restore_scale: f64,
    },
}

impl GestureOutcome {
    /// Whether the host should suppress its default handling of the event.
    pub fn prevent_default(&self) -> bool {
        match self {
            Self::SwipeMoved {
                prevent_default, ..
            } => *prevent_default,
            Self::PinchStarted { .. } | Self::PinchMoved { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy)]
struct SwipeState {
    start: Point,
    start_time: f64,
    offset: f64,
}

#[derive(Debug, Clone, Copy)]
struct PinchState {
    pointers: (i64, i64),
    initial_distance: f64,
    initial_scale: f64,
    start_time: f64,
    /// Transform origin in content coordinates of the committed surface.
    origin: Point,
    live_scale: f64,
    focus: FocusAnchor,
}

#[derive(Debug, Clone, Copy, Default)]
enum Mode {
    #[default]
    Idle,
    Swiping(SwipeState),
    Pinching(PinchState),
}

#[derive(Debug, Default)]
pub struct GestureRecognizer {
    pointers: BTreeMap<i64, Point>,
    mode: Mode,
    /// Set when a pinch ends with a finger still down.
    suppress_until_clear: bool,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.mode, Mode::Idle)
    }

    pub fn is_swiping(&self) -> bool {
        matches!(self.mode, Mode::Swiping(_))
    }

    pub fn is_pinching(&self) -> bool {
        matches!(self.mode, Mode::Pinching(_))
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    /// Forget every pointer and gesture in progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn handle(&mut self, event: &PointerEvent, ctx: &GestureContext) -> GestureOutcome {
        if event.kind == PointerKind::Mouse {
            return GestureOutcome::Ignored;
        }
        match event.phase {
            PointerPhase::Down => self.pointer_down(event, ctx),
            PointerPhase::Move => self.pointer_move(event, ctx),
            PointerPhase::Up => self.pointer_up(event, ctx, false),
            PointerPhase::Cancel => self.pointer_up(event, ctx, true),
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent, ctx: &GestureContext) -> GestureOutcome {
        let point = Point {
            x: event.x,
            y: event.y,
        };
        if self.pointers.len() >= 2 && !self.pointers.contains_key(&event.id) {
            return GestureOutcome::Ignored;
        }
        self.pointers.insert(event.id, point);

        match self.pointers.len() {
            1 if self.suppress_until_clear => GestureOutcome::Ignored,
            1 if ctx.is_overflowing => {
                debug!("single pointer on overflowing page; leaving it to native scroll");
                GestureOutcome::Ignored
            }
            1 => {
                self.mode = Mode::Swiping(SwipeState {
                    start: point,
                    start_time: event.timestamp_ms,
                    offset: 0.0,
                });
                GestureOutcome::SwipeStarted
            }
            2 if !self.is_pinching() => {
                let swipe_aborted = self.is_swiping();
                self.start_pinch(event.timestamp_ms, ctx);
                GestureOutcome::PinchStarted { swipe_aborted }
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn start_pinch(&mut self, timestamp_ms: f64, ctx: &GestureContext) {
        let mut ids = self.pointers.keys().copied();
        let (Some(a), Some(b)) = (ids.next(), ids.next()) else {
            return;
        };
        let (pa, pb) = (self.pointers[&a], self.pointers[&b]);
        let mid = midpoint(pa, pb);
        let (origin_x, origin_y) = ctx.scroll.content_origin();
        let origin = Point {
            x: mid.x - origin_x,
            y: mid.y - origin_y,
        };
        let scale = ctx.bounds.clamp(ctx.scale);

        self.mode = Mode::Pinching(PinchState {
            pointers: (a, b),
            initial_distance: distance(pa, pb).max(MIN_PINCH_DISTANCE),
            initial_scale: scale,
            start_time: timestamp_ms,
            origin,
            live_scale: scale,
            focus: FocusAnchor {
                doc_x: origin.x / scale,
                doc_y: origin.y / scale,
                screen_x: mid.x,
                screen_y: mid.y,
            },
        });
        debug!(scale, x = mid.x, y = mid.y, "pinch started");
    }

    fn pointer_move(&mut self, event: &PointerEvent, ctx: &GestureContext) -> GestureOutcome {
        let Some(point) = self.pointers.get_mut(&event.id) else {
            return GestureOutcome::Ignored;
        };
        point.x = event.x;
        point.y = event.y;

        match &mut self.mode {
            Mode::Idle => GestureOutcome::Ignored,
            Mode::Swiping(swipe) => {
                let dx = event.x - swipe.start.x;
                let dy = event.y - swipe.start.y;
                if dy.abs() > VERTICAL_DOMINANCE_RATIO * dx.abs() {
                    return GestureOutcome::Ignored;
                }
                let past_first = dx > 0.0 && ctx.current_page <= 1;
                let past_last = dx < 0.0 && ctx.current_page >= ctx.total_pages;
                swipe.offset = if past_first || past_last {
                    dx * EDGE_DAMPING
                } else {
                    dx
                };
                GestureOutcome::SwipeMoved {
                    offset: swipe.offset,
                    prevent_default: dx.abs() > SCROLL_SUPPRESS_THRESHOLD_PX,
                }
            }
            Mode::Pinching(pinch) => {
                let (a, b) = pinch.pointers;
                let (Some(pa), Some(pb)) = (self.pointers.get(&a), self.pointers.get(&b)) else {
                    return GestureOutcome::Ignored;
                };
                let ratio = distance(*pa, *pb) / pinch.initial_distance;
                pinch.live_scale = ctx.bounds.clamp(pinch.initial_scale * ratio);
                let preview_ratio = pinch.live_scale / pinch.initial_scale;

                // Undo the preview transform to find which document point
                // sits under the fingers now.
                let mid = midpoint(*pa, *pb);
                let (origin_x, origin_y) = ctx.scroll.content_origin();
                let content_x = pinch.origin.x + (mid.x - origin_x - pinch.origin.x) / preview_ratio;
                let content_y = pinch.origin.y + (mid.y - origin_y - pinch.origin.y) / preview_ratio;
                pinch.focus = FocusAnchor {
                    doc_x: content_x / pinch.initial_scale,
                    doc_y: content_y / pinch.initial_scale,
                    screen_x: mid.x,
                    screen_y: mid.y,
                };

                GestureOutcome::PinchMoved {
                    preview: PinchPreview {
                        ratio: preview_ratio,
                        origin_x: pinch.origin.x,
                        origin_y: pinch.origin.y,
                    },
                    scale: pinch.live_scale,
                    focus: pinch.focus,
                }
            }
        }
    }

    fn pointer_up(
        &mut self,
        event: &PointerEvent,
        ctx: &GestureContext,
        cancelled: bool,
    ) -> GestureOutcome {
        if self.pointers.remove(&event.id).is_none() {
            return GestureOutcome::Ignored;
        }
        let remaining = self.pointers.len();
        if remaining == 0 {
            self.suppress_until_clear = false;
        }

        match self.mode {
            Mode::Idle => GestureOutcome::Ignored,
            Mode::Swiping(swipe) => {
                self.mode = Mode::Idle;
                let (decision, metrics) = classify_swipe(&swipe, event, ctx, cancelled);
                GestureOutcome::SwipeEnded { decision, metrics }
            }
            Mode::Pinching(pinch) if remaining < 2 => {
                self.mode = Mode::Idle;
                self.suppress_until_clear = remaining > 0;
                if cancelled {
                    debug!(scale = pinch.initial_scale, "pinch cancelled");
                    GestureOutcome::PinchCancelled {
                        restore_scale: pinch.initial_scale,
                    }
                } else {
                    commit_pinch(&pinch, event.timestamp_ms, ctx)
                }
            }
            Mode::Pinching(_) => GestureOutcome::Ignored,
        }
    }
}

/// A cancelled pointer never turns the page, however the drag measured.
fn classify_swipe(
    swipe: &SwipeState,
    event: &PointerEvent,
    ctx: &GestureContext,
    cancelled: bool,
) -> (SwipeDecision, SwipeMetrics) {
    let travel = swipe.start.x - event.x;
    let dy = event.y - swipe.start.y;
    let distance = travel.abs();
    let duration_ms = (event.timestamp_ms - swipe.start_time).max(0.0);
    let velocity = if duration_ms > 0.0 {
        distance / duration_ms
    } else if distance > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let metrics = SwipeMetrics {
        distance,
        duration_ms,
        velocity,
        is_fast: velocity > SWIPE_VELOCITY_THRESHOLD,
        is_long: distance > SWIPE_DISTANCE_RATIO * ctx.viewport_width,
        vertical: dy.abs() > VERTICAL_DOMINANCE_RATIO * distance,
    };

    let wants_turn = !cancelled
        && (metrics.is_fast || metrics.is_long)
        && !metrics.vertical
        && distance > 0.0;
    let (target, direction) = if travel > 0.0 {
        (ctx.current_page.saturating_add(1), PageTransition::Forward)
    } else {
        (ctx.current_page.saturating_sub(1), PageTransition::Backward)
    };
    let target_page = target.clamp(1, ctx.total_pages.max(1));

    let decision = if wants_turn && target_page != ctx.current_page {
        SwipeDecision::Commit {
            target_page,
            direction,
        }
    } else {
        SwipeDecision::Cancel
    };

    info!(
        distance,
        duration_ms,
        velocity,
        fast = metrics.is_fast,
        long = metrics.is_long,
        vertical = metrics.vertical,
        cancelled,
        commit = matches!(decision, SwipeDecision::Commit { .. }),
        "swipe classified"
    );
    (decision, metrics)
}

fn commit_pinch(pinch: &PinchState, timestamp_ms: f64, ctx: &GestureContext) -> GestureOutcome {
    let duration_ms = timestamp_ms - pinch.start_time;
    let ratio = pinch.live_scale / pinch.initial_scale;
    let snap_to = ctx.auto_fit_scale.filter(|auto_fit| {
        duration_ms <= PINCH_SNAP_MAX_DURATION_MS
            && ratio <= PINCH_SNAP_MAX_RATIO
            && pinch.live_scale <= auto_fit * PINCH_SNAP_AUTO_FIT_TOLERANCE
    });

    match snap_to {
        Some(auto_fit) => {
            let scale = ctx.bounds.clamp(auto_fit);
            info!(duration_ms, ratio, scale, "pinch snapped to auto-fit");
            GestureOutcome::PinchCommitted {
                scale,
                focus: None,
                snapped: true,
            }
        }
        None => {
            info!(duration_ms, ratio, scale = pinch.live_scale, "pinch committed");
            GestureOutcome::PinchCommitted {
                scale: pinch.live_scale,
                focus: Some(pinch.focus),
                snapped: false,
            }
        }
    }
}

fn midpoint(a: Point, b: Point) -> Point {
    Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
