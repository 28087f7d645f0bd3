//! Error types for the killcam facade.

use thiserror::Error;

use killcam_recording::RecordingError;

/// Errors returned by [`RecordingSystem`](crate::RecordingSystem) requests
#[derive(Debug, Error)]
pub enum KillCamError {
    /// Killcam switched off in the configuration
    #[error("killcam is disabled")]
    Disabled,

    /// Highlight slot is empty or out of range
    #[error("no highlight in slot {0}")]
    NoSuchHighlight(usize),

    /// Highlight reel requested with an empty pool
    #[error("no highlights saved")]
    NoHighlights,

    /// Failure from the recording layer
    #[error(transparent)]
    Recording(#[from] RecordingError),
}

/// Result type for killcam requests
pub type KillCamResult<T> = Result<T, KillCamError>;
