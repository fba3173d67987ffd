use crate::models::resource::LayerRole;
use thiserror::Error;

/// Failures surfaced by the layer engine.
///
/// Every variant carries owned strings so the error can be shared between
/// callers waiting on the same cache entry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    /// The existence probe answered with a non-success status.
    #[error("Resource not found: {resource} ({status} {reason})")]
    ResourceNotFound {
        resource: String,
        status: u16,
        reason: String,
    },

    /// The probe could not reach the resource at all.
    #[error("Resource unreachable: {resource}: {message}")]
    Unreachable { resource: String, message: String },

    /// The source was built but ended up in its `error` state.
    #[error("Source for layer '{layer}' failed to load")]
    SourceError { layer: String },

    #[error("Unknown layer '{0}'")]
    UnknownLayer(String),

    #[error("Layer '{key}' is not a {expected} layer")]
    WrongRole { key: String, expected: LayerRole },

    #[error("Failed to build source for '{resource}': {message}")]
    Build { resource: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for LayerError {
    fn from(err: anyhow::Error) -> Self {
        LayerError::Other(format!("{:#}", err))
    }
}
