//! Scroll geometry and overflow handling
//!
//! Content smaller than the container is centered; content larger than the
//! container on either axis switches the container to native scrolling.
//! Across re-renders the scroll position is carried as a fraction of the
//! scroll range, or recomputed from a focus anchor after a pinch.

use tracing::debug;

/// Sub-pixel differences are layout noise, not overflow.
const OVERFLOW_EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Content fits; horizontal drags turn pages.
    #[default]
    Paging,
    /// Content overflows; drags pan natively.
    Native,
}

/// Container scroll state in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub client_width: f64,
    pub client_height: f64,
    pub content_width: f64,
    pub content_height: f64,
    pub scroll_left: f64,
    pub scroll_top: f64,
}

impl ScrollMetrics {
    pub fn max_scroll_left(&self) -> f64 {
        (self.content_width - self.client_width).max(0.0)
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.content_height - self.client_height).max(0.0)
    }

    pub fn overflows_x(&self) -> bool {
        self.content_width > self.client_width + OVERFLOW_EPSILON
    }

    pub fn overflows_y(&self) -> bool {
        self.content_height > self.client_height + OVERFLOW_EPSILON
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflows_x() || self.overflows_y()
    }

    pub fn mode(&self) -> ScrollMode {
        if self.is_overflowing() {
            ScrollMode::Native
        } else {
            ScrollMode::Paging
        }
    }

    /// Horizontal position as a fraction of the scroll range.
    pub fn percent_x(&self) -> f64 {
        fraction(self.scroll_left, self.max_scroll_left())
    }

    pub fn percent_y(&self) -> f64 {
        fraction(self.scroll_top, self.max_scroll_top())
    }

    /// Same geometry scrolled to (`left`, `top`), clamped to the range.
    pub fn scrolled_to(&self, left: f64, top: f64) -> Self {
        Self {
            scroll_left: clamp_scroll(left, self.max_scroll_left()),
            scroll_top: clamp_scroll(top, self.max_scroll_top()),
            ..*self
        }
    }

    /// Position of the content's top-left corner relative to the visible
    /// top-left of the container.
    pub fn content_origin(&self) -> (f64, f64) {
        let axis = |client: f64, content: f64, scroll: f64| {
            if content < client {
                (client - content) / 2.0
            } else {
                -scroll
            }
        };
        (
            axis(self.client_width, self.content_width, self.scroll_left),
            axis(self.client_height, self.content_height, self.scroll_top),
        )
    }
}

/// A document point that should stay under a screen point after re-render.
///
/// `doc_*` is in unscaled page units, `screen_*` relative to the visible
/// top-left of the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusAnchor {
    pub doc_x: f64,
    pub doc_y: f64,
    pub screen_x: f64,
    pub screen_y: f64,
}

/// Scroll state after content of `content_width`×`content_height` replaces
/// the content described by `previous` inside `container`.
pub fn retarget_scroll(
    previous: &ScrollMetrics,
    container: ContainerSize,
    content_width: f64,
    content_height: f64,
    scale: f64,
    focus: Option<FocusAnchor>,
    blend_threshold: f64,
) -> ScrollMetrics {
    let mut next = ScrollMetrics {
        client_width: container.width,
        client_height: container.height,
        content_width,
        content_height,
        scroll_left: 0.0,
        scroll_top: 0.0,
    };

    let x = AxisRetarget {
        new_max: next.max_scroll_left(),
        overflows: next.overflows_x(),
        was_overflowing: previous.overflows_x(),
        previous_percent: previous.percent_x(),
        first_overflow: FirstOverflow::Center,
        focal: focus.map(|f| f.doc_x * scale - f.screen_x),
    };
    let y = AxisRetarget {
        new_max: next.max_scroll_top(),
        overflows: next.overflows_y(),
        was_overflowing: previous.overflows_y(),
        previous_percent: previous.percent_y(),
        first_overflow: FirstOverflow::Start,
        focal: focus.map(|f| f.doc_y * scale - f.screen_y),
    };

    next.scroll_left = x.resolve(blend_threshold);
    next.scroll_top = y.resolve(blend_threshold);

    debug!(
        content_width,
        content_height,
        scroll_left = next.scroll_left,
        scroll_top = next.scroll_top,
        focused = focus.is_some(),
        overflowing = next.is_overflowing(),
        "scroll retargeted"
    );
    next
}

/// Mix a focal target with a percentage-based estimate. Close targets are
/// weighted toward the estimate in proportion to how close they are; beyond
/// `threshold` the focal target wins outright.
pub fn blend_scroll_target(focal: f64, percent_based: f64, threshold: f64) -> f64 {
    let diff = (focal - percent_based).abs();
    if threshold > 0.0 && diff < threshold {
        percent_based + (focal - percent_based) * (diff / threshold)
    } else {
        focal
    }
}

enum FirstOverflow {
    Center,
    Start,
}

struct AxisRetarget {
    new_max: f64,
    overflows: bool,
    was_overflowing: bool,
    previous_percent: f64,
    first_overflow: FirstOverflow,
    focal: Option<f64>,
}

impl AxisRetarget {
    fn resolve(&self, blend_threshold: f64) -> f64 {
        if !self.overflows {
            return 0.0;
        }
        let percent_based = self.previous_percent * self.new_max;
        let target = match (self.focal, self.was_overflowing) {
            (Some(focal), true) => blend_scroll_target(focal, percent_based, blend_threshold),
            (Some(focal), false) => focal,
            (None, true) => percent_based,
            (None, false) => match self.first_overflow {
                FirstOverflow::Center => self.new_max / 2.0,
                FirstOverflow::Start => 0.0,
            },
        };
        clamp_scroll(target, self.new_max)
    }
}

fn fraction(scroll: f64, max: f64) -> f64 {
    if max > 0.0 {
        (scroll / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn clamp_scroll(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const CONTAINER: ContainerSize = ContainerSize {
        width: 400.0,
        height: 600.0,
    };

    fn metrics(content_width: f64, content_height: f64, left: f64, top: f64) -> ScrollMetrics {
        ScrollMetrics {
            client_width: CONTAINER.width,
            client_height: CONTAINER.height,
            content_width,
            content_height,
            scroll_left: left,
            scroll_top: top,
        }
    }

    #[test]
    fn fitting_content_is_centered_and_paged() {
        let m = metrics(300.0, 500.0, 0.0, 0.0);
        assert!(!m.is_overflowing());
        assert_eq!(m.mode(), ScrollMode::Paging);
        assert_eq!(m.content_origin(), (50.0, 50.0));
    }

    #[test]
    fn first_overflow_centers_horizontally_and_starts_at_top() {
        let previous = metrics(300.0, 500.0, 0.0, 0.0);
        let next = retarget_scroll(&previous, CONTAINER, 800.0, 1000.0, 2.0, None, 48.0);
        assert_eq!(next.scroll_left, 200.0);
        assert_eq!(next.scroll_top, 0.0);
        assert_eq!(next.mode(), ScrollMode::Native);
    }

    #[test]
    fn percentage_survives_rescale() {
        // 25% across, 50% down.
        let previous = metrics(800.0, 1000.0, 100.0, 200.0);
        let next = retarget_scroll(&previous, CONTAINER, 1200.0, 1400.0, 3.0, None, 48.0);
        assert_eq!(next.scroll_left, 200.0);
        assert_eq!(next.scroll_top, 400.0);
    }

    #[test]
    fn focal_anchor_wins_when_far_from_estimate() {
        let previous = metrics(800.0, 1000.0, 0.0, 0.0);
        let focus = FocusAnchor {
            doc_x: 300.0,
            doc_y: 400.0,
            screen_x: 200.0,
            screen_y: 300.0,
        };
        let next = retarget_scroll(&previous, CONTAINER, 1600.0, 2000.0, 2.0, Some(focus), 48.0);
        assert_eq!(next.scroll_left, 400.0);
        assert_eq!(next.scroll_top, 500.0);
    }

    #[test]
    fn focal_anchor_is_clamped() {
        let previous = metrics(300.0, 500.0, 0.0, 0.0);
        let focus = FocusAnchor {
            doc_x: 0.0,
            doc_y: 0.0,
            screen_x: 200.0,
            screen_y: 300.0,
        };
        let next = retarget_scroll(&previous, CONTAINER, 800.0, 1000.0, 2.0, Some(focus), 48.0);
        assert_eq!((next.scroll_left, next.scroll_top), (0.0, 0.0));
    }

    #[test]
    fn blend_is_continuous_at_threshold() {
        assert_eq!(blend_scroll_target(100.0, 100.0, 48.0), 100.0);
        assert_eq!(blend_scroll_target(124.0, 100.0, 48.0), 112.0);
        assert_eq!(blend_scroll_target(148.0, 100.0, 48.0), 148.0);
        assert_eq!(blend_scroll_target(300.0, 100.0, 48.0), 300.0);
        assert_eq!(blend_scroll_target(300.0, 100.0, 0.0), 300.0);
    }

    #[test]
    fn content_that_fits_resets_scroll() {
        let previous = metrics(800.0, 1000.0, 300.0, 300.0);
        let next = retarget_scroll(&previous, CONTAINER, 390.0, 590.0, 1.0, None, 48.0);
        assert_eq!((next.scroll_left, next.scroll_top), (0.0, 0.0));
        assert!(!next.is_overflowing());
    }

    #[test]
    fn scrolled_to_clamps() {
        let m = metrics(800.0, 1000.0, 0.0, 0.0).scrolled_to(9999.0, -5.0);
        assert_eq!((m.scroll_left, m.scroll_top), (400.0, 0.0));
        assert_eq!(m.percent_x(), 1.0);
    }
}
