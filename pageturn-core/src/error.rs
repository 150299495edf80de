use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a rasterization engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("failed to fetch document: {0}")]
    Fetch(String),

    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("rasterization failed: {0}")]
    Render(String),
}

/// Errors surfaced by the viewer coordinator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ViewerError {
    /// The input could not be turned into a loadable document.
    #[error("invalid source `{input}`: {reason}")]
    SourceInvalid { input: String, reason: String },

    /// The engine could not open the document.
    #[error("failed to load `{name}`: {source}")]
    LoadFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    /// A loaded document could not produce a page surface.
    #[error("failed to render page {page}: {source}")]
    RenderFailed {
        page: u32,
        #[source]
        source: EngineError,
    },

    #[error("no document at index {0}")]
    NoSuchDocument(usize),
}

impl ViewerError {
    pub fn source_invalid(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceInvalid {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
