//! Viewer configuration
//!
//! Every field has a default so a partial JSON file only overrides what it
//! names. Gesture thresholds are deliberately absent: they live as constants
//! in [`crate::gesture`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::ScaleBounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    pub default_scale: f64,
    pub zoom_step: f64,
    /// Horizontal padding subtracted from the container width before fitting.
    pub fit_padding: f64,
    /// Preferred chunk size for progressive fetches, in bytes.
    pub range_chunk_size: u32,
    pub prefetch_all_pages: bool,
    pub resize_debounce_ms: u64,
    pub swipe_settle_ms: u64,
    pub show_page_navigation_buttons: bool,
    pub auto_disable_navigation_on_zoom: bool,
    /// Distance under which focal and percentage scroll targets are blended.
    pub focus_blend_threshold_px: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 9.0,
            default_scale: 1.0,
            zoom_step: 0.25,
            fit_padding: 64.0,
            range_chunk_size: 524_288,
            prefetch_all_pages: false,
            resize_debounce_ms: 300,
            swipe_settle_ms: 300,
            show_page_navigation_buttons: true,
            auto_disable_navigation_on_zoom: true,
            focus_blend_threshold_px: 48.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )))
            }
        };

        positive("min_scale", self.min_scale)?;
        positive("max_scale", self.max_scale)?;
        positive("default_scale", self.default_scale)?;
        positive("zoom_step", self.zoom_step)?;

        if self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid(format!(
                "min_scale ({}) exceeds max_scale ({})",
                self.min_scale, self.max_scale
            )));
        }
        if !self.fit_padding.is_finite() || self.fit_padding < 0.0 {
            return Err(ConfigError::Invalid("fit_padding must be >= 0".into()));
        }
        if self.range_chunk_size == 0 {
            return Err(ConfigError::Invalid("range_chunk_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn scale_bounds(&self) -> ScaleBounds {
        ScaleBounds::new(self.min_scale, self.max_scale)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn swipe_settle(&self) -> Duration {
        Duration::from_millis(self.swipe_settle_ms)
    }
}
