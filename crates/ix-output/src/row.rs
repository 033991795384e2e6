//! Plain data row types written by output backends.

use ix_sim::EpisodeSummary;
use ix_train::IterationStats;

/// One training iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub iteration:     u64,
    pub steps:         u64,
    pub episodes:      u64,
    /// Empty in the CSV when no episode finished.
    pub mean_return:   Option<f32>,
    pub success_rate:  f32,
    pub collisions:    u64,
    pub policy_loss:   f32,
    pub value_loss:    f32,
    pub entropy:       f32,
    pub approx_kl:     f32,
    pub clip_fraction: f32,
    pub epochs_run:    u64,
    pub stopped_early: bool,
    pub elapsed_secs:  f64,
}

impl From<&IterationStats> for ProgressRow {
    fn from(s: &IterationStats) -> Self {
        Self {
            iteration:     s.iteration,
            steps:         s.steps as u64,
            episodes:      s.episodes as u64,
            mean_return:   s.mean_return,
            success_rate:  s.success_rate(),
            collisions:    s.collisions as u64,
            policy_loss:   s.policy_loss,
            value_loss:    s.value_loss,
            entropy:       s.entropy,
            approx_kl:     s.approx_kl,
            clip_fraction: s.clip_fraction,
            epochs_run:    s.epochs_run as u64,
            stopped_early: s.stopped_early,
            elapsed_secs:  s.elapsed_secs,
        }
    }
}

/// One finished episode on rank 0.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub iteration:   u64,
    pub seed:        u64,
    pub length:      u64,
    pub spawned:     u64,
    pub goals:       u64,
    pub collisions:  u64,
    pub mean_return: f32,
}

impl EpisodeRow {
    pub fn new(iteration: u64, s: &EpisodeSummary) -> Self {
        Self {
            iteration,
            seed:        s.seed,
            length:      s.length,
            spawned:     s.spawned as u64,
            goals:       s.goals as u64,
            collisions:  s.collisions as u64,
            mean_return: s.mean_return(),
        }
    }
}
