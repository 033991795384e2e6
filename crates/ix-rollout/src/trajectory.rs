//! Trajectories and rollout batches.

use ix_core::AgentId;
use ix_perception::Observation;
use ix_sim::EpisodeSummary;
use ix_vehicle::AgentStatus;

/// One (observation, action, reward, done, log-prob, value) tuple.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub action:      usize,
    pub reward:      f32,
    pub done:        bool,
    pub log_prob:    f32,
    pub value:       f32,
}

/// How a trajectory ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TrajectoryEnd {
    /// The agent reached a terminal status; nothing follows.
    Terminal(AgentStatus),
    /// Cut by the horizon or the step budget; `bootstrap` estimates the
    /// return from the next observation.
    Truncated { bootstrap: f32 },
}

/// The transitions of one agent in one episode, in time order.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub agent:        AgentId,
    pub episode_seed: u64,
    pub transitions:  Vec<Transition>,
    pub end:          TrajectoryEnd,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Value after the last transition: zero when terminal.
    pub fn bootstrap_value(&self) -> f32 {
        match self.end {
            TrajectoryEnd::Terminal(_) => 0.0,
            TrajectoryEnd::Truncated { bootstrap } => bootstrap,
        }
    }

    pub fn total_reward(&self) -> f32 {
        self.transitions.iter().map(|t| t.reward).sum()
    }
}

/// Everything one worker collected in one rollout phase.
#[derive(Clone, Debug, Default)]
pub struct RolloutBatch {
    pub trajectories: Vec<Trajectory>,
    /// Episodes that ended (all terminal or horizon) inside this phase.
    pub episodes:     Vec<EpisodeSummary>,
    /// Transitions across all trajectories.
    pub steps:        usize,
}

impl RolloutBatch {
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.trajectories.iter().flat_map(|t| t.transitions.iter())
    }

    pub fn mean_episode_return(&self) -> Option<f32> {
        if self.episodes.is_empty() {
            return None;
        }
        let sum: f32 = self.episodes.iter().map(EpisodeSummary::mean_return).sum();
        Some(sum / self.episodes.len() as f32)
    }
}
