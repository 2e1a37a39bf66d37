/// Result type used throughout the crate.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Errors produced while loading, converting or compositing parts.
#[derive(thiserror::Error, Debug)]
pub enum CompositorError {
    /// A caller supplied an invalid value (bad resource, malformed affine parameters, ...).
    #[error("argument error: {0}")]
    Argument(String),

    /// Reading or decoding a resource failed, or part resolution timed out.
    #[error("io error: {0}")]
    Io(String),

    /// Something unexpected happened while resolving or drawing a build.
    #[error("runtime failure: {0}")]
    Runtime(String),

    /// Wrapped lower-level error with its context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositorError {
    /// Build an [`CompositorError::Argument`].
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Build an [`CompositorError::Io`].
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build an [`CompositorError::Runtime`].
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// `true` for I/O class failures, including wrapped `std::io::Error`s and image decode errors.
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Other(e) => e
                .chain()
                .any(|c| c.is::<std::io::Error>() || c.is::<image::ImageError>()),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
