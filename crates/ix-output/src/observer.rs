//! `ProgressObserver<W>` — bridges `TrainObserver` to an `OutputWriter`.

use ix_sim::EpisodeSummary;
use ix_train::{IterationStats, TrainObserver, TrainReport};
use tracing::warn;

use crate::writer::OutputWriter;
use crate::{EpisodeRow, OutputError, OutputResult, ProgressRow};

/// A [`TrainObserver`] that writes iteration and episode rows to any
/// [`OutputWriter`].
///
/// Errors from the writer are stored internally because `TrainObserver`
/// methods have no return value.  After training returns, check for errors
/// with [`take_error`][Self::take_error].
pub struct ProgressObserver<W: OutputWriter> {
    writer:     W,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> ProgressObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, last_error: None }
    }

    /// Take the stored write error (if any).
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                warn!(error = %e, "training output write failed");
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> TrainObserver for ProgressObserver<W> {
    fn on_episode(&mut self, iteration: u64, summary: &EpisodeSummary) {
        let result = self.writer.write_episode(&EpisodeRow::new(iteration, summary));
        self.store_err(result);
    }

    fn on_iteration(&mut self, stats: &IterationStats) {
        let result = self.writer.write_progress(&ProgressRow::from(stats));
        self.store_err(result);
    }

    fn on_train_end(&mut self, _report: &TrainReport) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
