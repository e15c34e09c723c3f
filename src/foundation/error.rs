/// Convenience result type used across framix.
pub type FramixResult<T> = Result<T, FramixError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum FramixError {
    /// Invalid caller-provided data or a programming-contract violation
    /// (out-of-range index, inverted range, bad configuration).
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while rasterizing or compositing a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Errors while decoding, resampling, or merging audio.
    #[error("audio error: {0}")]
    Audio(String),

    /// Errors in cache bookkeeping or spill/reload round trips.
    #[error("cache error: {0}")]
    Cache(String),

    /// Errors when serializing or deserializing configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramixError {
    /// Build a [`FramixError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramixError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`FramixError::Audio`] value.
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Build a [`FramixError::Cache`] value.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Build a [`FramixError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
