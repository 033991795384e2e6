//! Generalised advantage estimation and the flat training batch.

use ix_rollout::{RolloutBatch, Trajectory};

/// `out[t] = x[t] + discount · out[t+1]`.
pub fn discounted_cumsum(x: &[f32], discount: f32) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    let mut acc = 0.0;
    for (o, &v) in out.iter_mut().zip(x).rev() {
        acc = v + discount * acc;
        *o = acc;
    }
    out
}

/// GAE(γ, λ) advantages and value targets for one trajectory.
///
/// The value after the last transition is the trajectory's bootstrap: zero
/// for a terminal end, the critic's estimate for a truncated one.  Targets
/// are `advantage + value`.
pub fn advantages(trajectory: &Trajectory, gamma: f32, lam: f32) -> (Vec<f32>, Vec<f32>) {
    let tr = &trajectory.transitions;
    let next_values = tr
        .iter()
        .skip(1)
        .map(|t| t.value)
        .chain(std::iter::once(trajectory.bootstrap_value()));
    let deltas: Vec<f32> = tr
        .iter()
        .zip(next_values)
        .map(|(t, next)| t.reward + gamma * next - t.value)
        .collect();

    let adv = discounted_cumsum(&deltas, gamma * lam);
    let targets = adv.iter().zip(tr).map(|(a, t)| a + t.value).collect();
    (adv, targets)
}

// ── TrainBatch ────────────────────────────────────────────────────────────────

/// Every transition of one rank's rollouts, flattened for optimisation.
///
/// Observations are stored row-major in one buffer of `len · obs_len`
/// floats.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainBatch {
    pub obs_len:       usize,
    pub observations:  Vec<f32>,
    pub actions:       Vec<usize>,
    pub old_log_probs: Vec<f32>,
    pub advantages:    Vec<f32>,
    pub returns:       Vec<f32>,
}

impl TrainBatch {
    pub fn from_rollouts(batch: &RolloutBatch, obs_len: usize, gamma: f32, lam: f32) -> Self {
        let n = batch.steps;
        let mut out = TrainBatch {
            obs_len,
            observations:  Vec::with_capacity(n * obs_len),
            actions:       Vec::with_capacity(n),
            old_log_probs: Vec::with_capacity(n),
            advantages:    Vec::with_capacity(n),
            returns:       Vec::with_capacity(n),
        };
        for trajectory in &batch.trajectories {
            let (adv, ret) = advantages(trajectory, gamma, lam);
            for t in &trajectory.transitions {
                out.observations.extend_from_slice(t.observation.as_slice());
                out.actions.push(t.action);
                out.old_log_probs.push(t.log_prob);
            }
            out.advantages.extend(adv);
            out.returns.extend(ret);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn observation(&self, i: usize) -> &[f32] {
        &self.observations[i * self.obs_len..(i + 1) * self.obs_len]
    }

    /// Local `[Σ a, Σ a², n]`, the input to a global normalisation.
    pub fn advantage_moments(&self) -> [f32; 3] {
        let sum: f32 = self.advantages.iter().sum();
        let sq: f32 = self.advantages.iter().map(|a| a * a).sum();
        [sum, sq, self.len() as f32]
    }

    /// Shift and scale advantages to zero mean and unit variance, given
    /// moments summed over every rank.
    pub fn normalize_advantages(&mut self, moments: [f32; 3]) {
        let [sum, sq, n] = moments;
        if n <= 0.0 {
            return;
        }
        let mean = sum / n;
        let var = (sq / n - mean * mean).max(0.0);
        let std = var.sqrt() + 1e-8;
        for a in &mut self.advantages {
            *a = (*a - mean) / std;
        }
    }
}
