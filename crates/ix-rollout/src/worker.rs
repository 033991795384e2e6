//! `RolloutWorker` — runs episodes and records per-agent trajectories.

use std::collections::BTreeMap;

use tracing::debug;

use ix_core::{AgentId, SimRng};
use ix_perception::Observation;
use ix_sim::IntersectionEnv;

use crate::{
    ActionSample, Policy, RolloutBatch, RolloutError, RolloutResult, Trajectory, TrajectoryEnd,
    Transition,
};

/// Drives one environment with one policy.
///
/// The policy sees the active agents' observations as a variable-length
/// set, ascending id.  All randomness (episode seeds and action sampling) comes from a single
/// `SimRng`, so a worker reseeded with the same value replays the same
/// rollouts.
pub struct RolloutWorker {
    rng: SimRng,
}

impl RolloutWorker {
    pub fn new(seed: u64) -> Self {
        Self { rng: SimRng::new(seed) }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = SimRng::new(seed);
    }

    /// Run episodes until at least `min_steps` transitions are recorded.
    ///
    /// The last episode is cut as soon as the budget is met; its open
    /// trajectories end as truncated.  The batch may overshoot `min_steps`
    /// by less than one step's worth of agents.
    pub fn collect<P: Policy + ?Sized>(
        &mut self,
        env:       &mut IntersectionEnv,
        policy:    &P,
        min_steps: usize,
    ) -> RolloutResult<RolloutBatch> {
        let mut batch = RolloutBatch::default();
        while batch.steps < min_steps {
            let budget = min_steps - batch.steps;
            self.run_episode(env, policy, budget, &mut batch)?;
        }
        Ok(batch)
    }

    /// One episode, or its first `budget` transitions.
    fn run_episode<P: Policy + ?Sized>(
        &mut self,
        env:    &mut IntersectionEnv,
        policy: &P,
        budget: usize,
        batch:  &mut RolloutBatch,
    ) -> RolloutResult<()> {
        let seed = self.rng.random::<u64>();
        let mut obs = env.reset(seed)?;
        let mut open: BTreeMap<AgentId, Vec<Transition>> = BTreeMap::new();
        let mut steps = 0;

        loop {
            let samples = self.act(policy, &obs)?;
            let joint: Vec<(AgentId, usize)> =
                obs.iter().zip(&samples).map(|((a, _), s)| (*a, s.action)).collect();
            let out = env.step(&joint)?;

            // `out.agents` and `obs` both list the acting agents by ascending id.
            for (((agent, observation), sample), result) in obs.into_iter().zip(samples).zip(&out.agents) {
                debug_assert_eq!(agent, result.agent);
                open.entry(agent).or_default().push(Transition {
                    observation,
                    action:   sample.action,
                    reward:   result.reward,
                    done:     result.done,
                    log_prob: sample.log_prob,
                    value:    sample.value,
                });
                if result.status.is_terminal() {
                    let transitions = open.remove(&agent).unwrap_or_default();
                    batch.steps += transitions.len();
                    batch.trajectories.push(Trajectory {
                        agent,
                        episode_seed: seed,
                        transitions,
                        end: TrajectoryEnd::Terminal(result.status),
                    });
                }
            }
            steps += out.agents.len();
            obs = out.observations;

            let finished = out.info.episode_done;
            if finished || steps >= budget {
                self.close_truncated(policy, &obs, seed, open, batch)?;
                if finished {
                    if let Some(summary) = env.summary() {
                        batch.episodes.push(summary.clone());
                    }
                } else {
                    debug!(seed, steps, "episode cut by step budget");
                }
                return Ok(());
            }
        }
    }

    /// End every open trajectory with the value of its agent's latest
    /// observation.
    fn close_truncated<P: Policy + ?Sized>(
        &self,
        policy:   &P,
        obs:      &[(AgentId, Observation)],
        seed:     u64,
        mut open: BTreeMap<AgentId, Vec<Transition>>,
        batch:    &mut RolloutBatch,
    ) -> RolloutResult<()> {
        let values = self.values(policy, obs)?;
        for ((agent, _), bootstrap) in obs.iter().zip(values) {
            let Some(transitions) = open.remove(agent) else {
                continue; // spawned this step, never acted
            };
            batch.steps += transitions.len();
            batch.trajectories.push(Trajectory {
                agent: *agent,
                episode_seed: seed,
                transitions,
                end: TrajectoryEnd::Truncated { bootstrap },
            });
        }
        debug_assert!(open.is_empty());
        Ok(())
    }

    // ── Policy calls ──────────────────────────────────────────────────────

    /// One sample per entry of `obs`, validated.
    fn act<P: Policy + ?Sized>(
        &mut self,
        policy: &P,
        obs:    &[(AgentId, Observation)],
    ) -> RolloutResult<Vec<ActionSample>> {
        if obs.is_empty() {
            return Ok(Vec::new());
        }
        let set: Vec<Observation> = obs.iter().map(|(_, o)| o.clone()).collect();
        let samples = policy.act(&set, &mut self.rng);
        check_len(set.len(), samples.len())?;

        for ((agent, _), s) in obs.iter().zip(&samples) {
            if !s.log_prob.is_finite() {
                return Err(RolloutError::NonFinite { agent: *agent, what: "log-probability" });
            }
            if !s.value.is_finite() {
                return Err(RolloutError::NonFinite { agent: *agent, what: "value" });
            }
        }
        Ok(samples)
    }

    fn values<P: Policy + ?Sized>(
        &self,
        policy: &P,
        obs:    &[(AgentId, Observation)],
    ) -> RolloutResult<Vec<f32>> {
        if obs.is_empty() {
            return Ok(Vec::new());
        }
        let set: Vec<Observation> = obs.iter().map(|(_, o)| o.clone()).collect();
        let values = policy.value(&set);
        check_len(set.len(), values.len())?;
        for ((agent, _), v) in obs.iter().zip(&values) {
            if !v.is_finite() {
                return Err(RolloutError::NonFinite { agent: *agent, what: "value" });
            }
        }
        Ok(values)
    }
}

fn check_len(expected: usize, got: usize) -> RolloutResult<()> {
    if expected != got {
        return Err(RolloutError::PolicyOutput { expected, got });
    }
    Ok(())
}
