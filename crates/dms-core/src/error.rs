//! Error type shared by every public display-manager operation.

use thiserror::Error;

/// Failure of a display-manager operation.
///
/// "Already in the requested state" is never an error; operations report it
/// as success (usually `Ok(false)`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DmError {
    /// The referenced screen, group or display does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    /// The request was malformed or targets an entity that cannot accept it.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The renderer rejected or failed the request.
    #[error("renderer failure: {0}")]
    RendererFailure(String),

    /// A blocking request did not complete in time.
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl DmError {
    pub fn screen_not_found(id: crate::ScreenId) -> Self {
        DmError::NotFound { kind: "screen", id: id.0 }
    }

    pub fn display_not_found(id: crate::DisplayId) -> Self {
        DmError::NotFound { kind: "display", id: id.0 }
    }
}
