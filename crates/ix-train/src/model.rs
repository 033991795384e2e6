//! The `ActorCritic` trait: a [`Policy`] the trainer can optimise.

use ix_rollout::Policy;

use crate::{TrainBatch, TrainResult};

/// Weights of the PPO objective.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LossCoefficients {
    pub clip_ratio:   f32,
    pub entropy_coef: f32,
}

/// Loss terms and gradient, each a mean over the batch it was computed on.
///
/// `gradient` is the gradient of
/// `policy_loss − entropy_coef · entropy + value_loss` with respect to
/// [`ActorCritic::parameters`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LossReport {
    pub gradient:      Vec<f32>,
    pub policy_loss:   f32,
    pub value_loss:    f32,
    pub entropy:       f32,
    pub approx_kl:     f32,
    pub clip_fraction: f32,
}

impl LossReport {
    /// Scalar objective the gradient belongs to.
    pub fn total(&self, coef: &LossCoefficients) -> f32 {
        self.policy_loss - coef.entropy_coef * self.entropy + self.value_loss
    }
}

/// Policy plus value function over one flat parameter vector.
///
/// The first [`policy_param_count`](Self::policy_param_count) parameters
/// belong to the policy, the rest to the value function; the optimiser uses
/// a separate learning rate for each group.  Models never update
/// themselves: the trainer applies the all-reduced gradient and writes the
/// result back with [`set_parameters`](Self::set_parameters).
pub trait ActorCritic: Policy {
    /// Length of one observation vector the model accepts.
    fn obs_len(&self) -> usize;

    fn parameters(&self) -> &[f32];

    fn set_parameters(&mut self, parameters: &[f32]) -> TrainResult<()>;

    fn policy_param_count(&self) -> usize;

    fn loss_and_gradient(&self, batch: &TrainBatch, coef: &LossCoefficients) -> LossReport;

    /// Mean of `old_log_prob − log_prob` over the batch.
    fn approx_kl(&self, batch: &TrainBatch) -> f32;
}
