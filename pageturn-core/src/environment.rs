use std::cell::{Cell, RefCell};

/// Host capabilities the viewer reads and writes: screen density, window
/// width, and the navigation location carrying `#page=N` fragments.
///
/// Resize and density-change notifications flow the other way: the host
/// calls [`crate::Viewer::on_resize`] and [`crate::Viewer::on_dpi_change`].
pub trait Environment {
    fn device_pixel_ratio(&self) -> f64;

    /// Width of the visible window, used to classify long swipes.
    fn viewport_width(&self) -> f64;

    /// Current navigation value: one or more locators separated by `,` or `|`.
    fn current_location(&self) -> Option<String>;

    /// Replace the navigation value in place, without a history entry.
    fn replace_location(&self, location: &str);
}

/// In-memory environment for headless runs and tests.
#[derive(Debug)]
pub struct StaticEnvironment {
    device_pixel_ratio: Cell<f64>,
    viewport_width: Cell<f64>,
    location: RefCell<Option<String>>,
    location_writes: Cell<usize>,
}

impl StaticEnvironment {
    pub fn new(device_pixel_ratio: f64, viewport_width: f64) -> Self {
        Self {
            device_pixel_ratio: Cell::new(device_pixel_ratio),
            viewport_width: Cell::new(viewport_width),
            location: RefCell::new(None),
            location_writes: Cell::new(0),
        }
    }

    pub fn with_location(self, location: impl Into<String>) -> Self {
        *self.location.borrow_mut() = Some(location.into());
        self
    }

    pub fn set_device_pixel_ratio(&self, ratio: f64) {
        self.device_pixel_ratio.set(ratio);
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.viewport_width.set(width);
    }

    pub fn location_writes(&self) -> usize {
        self.location_writes.get()
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::new(1.0, 1024.0)
    }
}

impl Environment for StaticEnvironment {
    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio.get()
    }

    fn viewport_width(&self) -> f64 {
        self.viewport_width.get()
    }

    fn current_location(&self) -> Option<String> {
        self.location.borrow().clone()
    }

    fn replace_location(&self, location: &str) {
        *self.location.borrow_mut() = Some(location.to_string());
        self.location_writes.set(self.location_writes.get() + 1);
    }
}
