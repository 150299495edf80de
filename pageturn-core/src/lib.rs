//! Multi-document page viewer core.
//!
//! Loads one or many paginated documents through a pluggable
//! [`RasterEngine`], keeps the session state in a reactive [`Store`],
//! fits pages to the container, and turns touch input into page swipes and
//! focus-preserving pinch zoom.

pub mod config;
pub mod document;
pub mod engine;
pub mod environment;
pub mod error;
pub mod fit;
pub mod gesture;
mod interaction;
pub mod layout;
pub mod render;
mod scheduler;
pub mod session;
pub mod source;
pub mod store;
mod viewer;

pub use config::ViewerConfig;
pub use document::{Document, DocumentId, LoadState, Locator};
pub use engine::{
    DocumentHandle, LoadProgress, PageHandle, PageSize, RangeHints, RasterEngine, Surface,
};
pub use environment::{Environment, StaticEnvironment};
pub use error::{ConfigError, EngineError, ViewerError};
pub use fit::{fit_to_width, FitResult};
pub use gesture::{
    GestureContext, GestureOutcome, GestureRecognizer, PointerEvent, PointerKind, PointerPhase,
    SwipeDecision,
};
pub use interaction::PointerResponse;
pub use layout::{ContainerSize, FocusAnchor, ScrollMetrics, ScrollMode};
pub use render::{RenderOutput, RenderRequest};
pub use scheduler::{AddOptions, BackgroundSummary, OpenOptions, OpenReport};
pub use session::{
    PageTransition, PinchPreview, RenderSummary, ScaleBounds, SessionStatus, ViewerSession,
};
pub use source::{parse_locator_list, DocumentSource};
pub use store::{Store, SubscriptionId};
pub use viewer::{Session, Viewer, ViewerKey};
