use tracing::debug;

use crate::session::ScaleBounds;

/// Inputs and result of one fit-to-width computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub scale: f64,
    pub container_width: f64,
    pub available_width: f64,
    pub page_width: f64,
}

/// Scale at which a page of `page_width` fills the container width minus
/// `horizontal_padding`, clamped to `bounds`.
///
/// A hidden or collapsed container (zero or negative available width) and a
/// degenerate page width both yield `bounds.min` instead of a non-finite value.
pub fn fit_to_width(
    page_width: f64,
    container_width: f64,
    horizontal_padding: f64,
    bounds: ScaleBounds,
) -> FitResult {
    let available_width = (container_width - horizontal_padding).max(0.0);
    let raw = if page_width > 0.0 && page_width.is_finite() {
        available_width / page_width
    } else {
        0.0
    };
    let scale = bounds.clamp(raw);

    debug!(
        container_width,
        available_width,
        page_width,
        raw_scale = raw,
        scale,
        "auto-fit scale computed"
    );

    FitResult {
        scale,
        container_width,
        available_width,
        page_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: ScaleBounds = ScaleBounds {
        min: 0.5,
        max: 9.0,
    };

    #[test]
    fn fits_page_to_available_width() {
        let fit = fit_to_width(600.0, 700.0, 64.0, BOUNDS);
        assert!((fit.scale - 1.06).abs() < 1e-9);
        assert_eq!(fit.available_width, 636.0);
    }

    #[test]
    fn hidden_container_clamps_to_min() {
        assert_eq!(fit_to_width(600.0, 0.0, 64.0, BOUNDS).scale, 0.5);
        assert_eq!(fit_to_width(600.0, 30.0, 64.0, BOUNDS).scale, 0.5);
    }

    #[test]
    fn degenerate_page_width_is_finite() {
        let fit = fit_to_width(0.0, 700.0, 64.0, BOUNDS);
        assert!(fit.scale.is_finite());
        assert_eq!(fit.scale, 0.5);
    }

    #[test]
    fn huge_container_clamps_to_max() {
        assert_eq!(fit_to_width(10.0, 100_000.0, 64.0, BOUNDS).scale, 9.0);
    }
}
