//! The `OutputWriter` trait implemented by backend writers.

use crate::{EpisodeRow, OutputResult, ProgressRow};

/// Destination for training rows.
///
/// Errors are stored by [`ProgressObserver`](crate::ProgressObserver) and
/// retrieved with `take_error`, since observer hooks cannot fail.
pub trait OutputWriter {
    fn write_progress(&mut self, row: &ProgressRow) -> OutputResult<()>;

    fn write_episode(&mut self, row: &EpisodeRow) -> OutputResult<()>;

    /// Flush all underlying file handles.
    ///
    /// Idempotent; safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
