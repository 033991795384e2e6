//! Track-subsystem error type.

use thiserror::Error;

use ix_core::IxError;

/// Errors produced while building the intersection geometry.
///
/// Querying an unknown `TrackId` is a programming error and panics instead.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid intersection layout: {0}")]
    Layout(String),

    #[error(transparent)]
    Core(#[from] IxError),
}

pub type TrackResult<T> = Result<T, TrackError>;
