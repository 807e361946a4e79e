#![forbid(unsafe_code)]

//! Error type for failed asynchronous program loads.

use thiserror::Error;

/// A pending program load was rejected.
///
/// Load failures are recoverable: the routing host reports them to the
/// configured observer and either mounts the configured error program or
/// stays on the current one. Construct with [`LoadError::new`], or
/// [`LoadError::with_source`] to keep the underlying cause.
#[derive(Debug, Error)]
#[error("route program load failed: {message}")]
pub struct LoadError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl LoadError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
