use tracing::{debug, info};

use crate::engine::{DocumentHandle, PageHandle, PageSize, Surface};
use crate::error::EngineError;
use crate::fit::{fit_to_width, FitResult};
use crate::session::ScaleBounds;

/// A page to show. Held in the pending slot while no container is attached;
/// a newer request replaces an older one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_number: u32,
    pub apply_auto_fit: bool,
    /// Scale to render at instead of the session scale. Ignored when
    /// `apply_auto_fit` is set.
    pub target_scale: Option<f64>,
}

impl RenderRequest {
    pub fn new(page_number: u32, apply_auto_fit: bool) -> Self {
        Self {
            page_number,
            apply_auto_fit,
            target_scale: None,
        }
    }

    pub fn at_scale(page_number: u32, scale: f64) -> Self {
        Self {
            page_number,
            apply_auto_fit: false,
            target_scale: Some(scale),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub page_number: u32,
    pub scale: f64,
    pub device_pixel_ratio: f64,
    pub apply_auto_fit: bool,
    pub container_width: f64,
    pub fit_padding: f64,
    pub bounds: ScaleBounds,
}

#[derive(Debug)]
pub struct RenderOutput {
    pub surface: Surface,
    /// Differs from the requested scale when auto-fit overrode it.
    pub applied_scale: f64,
    pub fit: Option<FitResult>,
    pub intrinsic_size: PageSize,
}

/// Fetch a page, optionally auto-fit it, and paint it into a fresh surface.
pub async fn render_page<D: DocumentHandle>(
    document: &D,
    params: &RenderParams,
) -> Result<RenderOutput, EngineError> {
    let page_count = document.page_count();
    if params.page_number == 0 || params.page_number > page_count {
        return Err(EngineError::PageOutOfRange {
            page: params.page_number,
            page_count,
        });
    }

    let page = document.get_page(params.page_number).await?;
    let intrinsic_size = page.intrinsic_size(1.0);

    let fit = params.apply_auto_fit.then(|| {
        fit_to_width(
            intrinsic_size.width,
            params.container_width,
            params.fit_padding,
            params.bounds,
        )
    });
    let applied_scale = match fit {
        Some(fit) => fit.scale,
        None => params.bounds.clamp(params.scale),
    };

    let dpr = sanitize_dpr(params.device_pixel_ratio);
    let display_size = page.intrinsic_size(applied_scale);
    let mut surface = Surface::for_display(display_size, dpr);

    debug!(
        page = params.page_number,
        requested_scale = params.scale,
        applied_scale,
        dpr,
        physical_width = surface.width,
        physical_height = surface.height,
        display_width = display_size.width,
        display_height = display_size.height,
        "rendering page"
    );

    page.render_to(&mut surface, applied_scale * dpr).await?;

    info!(
        page = params.page_number,
        scale = applied_scale,
        auto_fit = fit.is_some(),
        "page rendered"
    );

    Ok(RenderOutput {
        surface,
        applied_scale,
        fit,
        intrinsic_size,
    })
}

/// Non-finite or non-positive ratios fall back to 1.
pub fn sanitize_dpr(device_pixel_ratio: f64) -> f64 {
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    }
}
