use std::path::Path;

/// Convenience result type used across panomask.
pub type MaskResult<T> = Result<T, MaskError>;

/// Error taxonomy for mask loading, compositing and state watching.
///
/// Only [`MaskError::Persist`] and wrapped lower-level errors are fatal for a render cycle; every
/// other kind describes a layer or a state update that was skipped.
#[derive(thiserror::Error, Debug)]
pub enum MaskError {
    /// A mask file, frame or directory does not exist.
    #[error("asset missing: {0}")]
    AssetMissing(String),

    /// An asset could not be decoded or failed canonical shape/value validation.
    #[error("asset invalid: {0}")]
    AssetInvalid(String),

    /// The trailing state log line is not an integer list.
    #[error("state parse error: {0}")]
    StateParse(String),

    /// A gray value has no output index mapping.
    #[error("config gap: {0}")]
    ConfigGap(String),

    /// A clamped frame number was never loaded for its sequence.
    #[error("frame gap: {0}")]
    FrameGap(String),

    /// Invalid user-provided configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when deserializing configuration documents.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A result image could not be written.
    #[error("persist error: {0}")]
    Persist(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MaskError {
    /// Build a [`MaskError::AssetMissing`] value.
    pub fn asset_missing(msg: impl Into<String>) -> Self {
        Self::AssetMissing(msg.into())
    }

    /// Build a [`MaskError::AssetInvalid`] value.
    pub fn asset_invalid(msg: impl Into<String>) -> Self {
        Self::AssetInvalid(msg.into())
    }

    /// Build a [`MaskError::StateParse`] value.
    pub fn state_parse(msg: impl Into<String>) -> Self {
        Self::StateParse(msg.into())
    }

    /// Build a [`MaskError::ConfigGap`] value.
    pub fn config_gap(msg: impl Into<String>) -> Self {
        Self::ConfigGap(msg.into())
    }

    /// Build a [`MaskError::FrameGap`] value.
    pub fn frame_gap(msg: impl Into<String>) -> Self {
        Self::FrameGap(msg.into())
    }

    /// Build a [`MaskError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MaskError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`MaskError::Persist`] value for a failed write of `path`.
    pub fn persist(path: &Path, cause: impl std::fmt::Display) -> Self {
        Self::Persist(format!("write '{}': {cause}", path.display()))
    }

    /// Whether this error must abort the current render cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persist(_) | Self::Other(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
