//! The `Policy` trait — the boundary between rollouts and the learner.

use ix_core::SimRng;
use ix_perception::Observation;

/// One sampled decision.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActionSample {
    pub action:   usize,
    /// Log-probability of `action` under the policy that sampled it.
    pub log_prob: f32,
    /// Value estimate of the observation.
    pub value:    f32,
}

/// A stochastic policy with a value head over a discrete action space.
///
/// `act` takes a set of observations and returns one sample per entry, in
/// the same order.  It assumes no fixed number of agents; a shared-weight
/// policy simply maps each observation independently.
///
/// Implementations must be `Send + Sync`: rollout workers on different
/// threads hold shared references to their own replica.
pub trait Policy: Send + Sync {
    fn action_count(&self) -> usize;

    fn act(&self, observations: &[Observation], rng: &mut SimRng) -> Vec<ActionSample>;

    /// Value estimates without sampling, used to bootstrap cut trajectories.
    fn value(&self, observations: &[Observation]) -> Vec<f32>;
}

// ── Reference policies ────────────────────────────────────────────────────────

/// Uniform over the action table.  Value is always zero.
pub struct RandomPolicy {
    actions: usize,
}

impl RandomPolicy {
    pub fn new(actions: usize) -> Self {
        Self { actions }
    }
}

impl Policy for RandomPolicy {
    fn action_count(&self) -> usize {
        self.actions
    }

    fn act(&self, observations: &[Observation], rng: &mut SimRng) -> Vec<ActionSample> {
        let log_prob = -(self.actions as f32).ln();
        observations
            .iter()
            .map(|_| ActionSample { action: rng.gen_range(0..self.actions), log_prob, value: 0.0 })
            .collect()
    }

    fn value(&self, observations: &[Observation]) -> Vec<f32> {
        vec![0.0; observations.len()]
    }
}

/// Always the same action.
pub struct ConstantPolicy {
    action:  usize,
    actions: usize,
}

impl ConstantPolicy {
    pub fn new(action: usize, actions: usize) -> Self {
        Self { action, actions }
    }
}

impl Policy for ConstantPolicy {
    fn action_count(&self) -> usize {
        self.actions
    }

    fn act(&self, observations: &[Observation], _rng: &mut SimRng) -> Vec<ActionSample> {
        vec![ActionSample { action: self.action, log_prob: 0.0, value: 0.0 }; observations.len()]
    }

    fn value(&self, observations: &[Observation]) -> Vec<f32> {
        vec![0.0; observations.len()]
    }
}
