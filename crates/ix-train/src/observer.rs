//! Training observer trait for progress reporting and data collection.

use ix_sim::EpisodeSummary;

use crate::TrainReport;

/// Statistics of one completed iteration, aggregated over every rank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IterationStats {
    pub iteration:     u64,
    /// Transitions collected by all ranks.
    pub steps:         usize,
    /// Episodes that finished inside the iteration.
    pub episodes:      usize,
    /// Mean over finished episodes of the per-agent mean return; `None`
    /// when no episode finished.
    pub mean_return:   Option<f32>,
    pub spawned:       usize,
    pub goals:         usize,
    pub collisions:    usize,
    /// Loss terms of the first epoch, before any update.
    pub policy_loss:   f32,
    pub value_loss:    f32,
    pub entropy:       f32,
    /// Approximate KL of the final parameters to the rollout policy.
    pub approx_kl:     f32,
    pub clip_fraction: f32,
    pub epochs_run:    usize,
    pub stopped_early: bool,
    pub elapsed_secs:  f64,
}

impl IterationStats {
    pub fn success_rate(&self) -> f32 {
        if self.spawned == 0 {
            return 0.0;
        }
        self.goals as f32 / self.spawned as f32
    }
}

/// Callbacks invoked on rank 0 by [`Trainer::run`][crate::Trainer::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
pub trait TrainObserver {
    /// Called for each episode rank 0 finished during a rollout phase.
    fn on_episode(&mut self, _iteration: u64, _summary: &EpisodeSummary) {}

    /// Called after the update of each iteration.
    fn on_iteration(&mut self, _stats: &IterationStats) {}

    /// Called once after the final iteration.
    fn on_train_end(&mut self, _report: &TrainReport) {}
}

/// A [`TrainObserver`] that does nothing.
pub struct NoopTrainObserver;

impl TrainObserver for NoopTrainObserver {}
