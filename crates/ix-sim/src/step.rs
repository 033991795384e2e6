//! Step results.

use ix_core::{AgentId, Tick};
use ix_perception::Observation;
use ix_vehicle::AgentStatus;

/// Outcome of one step for one agent that acted in it.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentStep {
    pub agent:     AgentId,
    pub reward:    f32,
    /// Terminal status reached or horizon hit.
    pub done:      bool,
    /// Done only because of the horizon; the agent is still active and its
    /// observation is included for bootstrapping.
    pub truncated: bool,
    pub status:    AgentStatus,
}

/// Step-level events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInfo {
    /// Tick reached by this step.
    pub tick:                    Tick,
    pub collisions:              Vec<AgentId>,
    pub goals:                   Vec<AgentId>,
    pub spawned:                 Vec<AgentId>,
    pub right_of_way_violations: usize,
    pub episode_done:            bool,
}

/// Everything [`IntersectionEnv::step`](crate::IntersectionEnv::step)
/// returns.
#[derive(Clone, Debug, Default)]
pub struct StepOutput {
    /// One entry per agent active after the step, ascending id.
    pub observations: Vec<(AgentId, Observation)>,
    /// One entry per agent that acted, ascending id.
    pub agents:       Vec<AgentStep>,
    pub info:         StepInfo,
}

/// Totals for a finished episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub seed:       u64,
    /// Steps taken.
    pub length:     u64,
    pub spawned:    usize,
    pub goals:      usize,
    pub collisions: usize,
    /// Undiscounted return per agent, indexed by `AgentId`.
    pub returns:    Vec<f32>,
}

impl EpisodeSummary {
    /// Mean return over the agents that spawned.  Agents still waiting when
    /// the episode ended never acted and are left out.
    pub fn mean_return(&self) -> f32 {
        if self.spawned == 0 {
            return 0.0;
        }
        self.returns.iter().sum::<f32>() / self.spawned as f32
    }

    /// Fraction of spawned agents that reached their goal.
    pub fn success_rate(&self) -> f32 {
        if self.spawned == 0 {
            return 0.0;
        }
        self.goals as f32 / self.spawned as f32
    }
}
