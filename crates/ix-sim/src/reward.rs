//! Reward shaping and right-of-way priority.

use serde::{Deserialize, Serialize};

use ix_core::{AgentId, Tick};
use ix_track::Arm;

/// Reward weights.
///
/// Per step an active agent earns `progress_weight × Δs / track_length`.
/// On the step it reaches its goal it also earns
/// `goal_bonus × (0.5 + 0.5 × (1 − active_steps / horizon))`; on the step it
/// collides it earns `collision_penalty`.  With `learn_right_of_way` set,
/// each step spent in the box ahead of a vehicle that had priority costs
/// `right_of_way_penalty`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    pub progress_weight:      f32,
    pub goal_bonus:           f32,
    pub collision_penalty:    f32,
    pub right_of_way_penalty: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            progress_weight:      1.0,
            goal_bonus:           1.0,
            collision_penalty:    -10.0,
            right_of_way_penalty: -0.05,
        }
    }
}

impl RewardConfig {
    pub fn progress(&self, distance: f32, track_length: f32) -> f32 {
        self.progress_weight * distance / track_length
    }

    /// Goal bonus, scaled from 1.0 (instant) down to 0.5 (took the whole
    /// horizon).
    pub fn goal(&self, active_steps: u64, horizon: u64) -> f32 {
        let used = (active_steps as f32 / horizon as f32).min(1.0);
        self.goal_bonus * (0.5 + 0.5 * (1.0 - used))
    }
}

/// A vehicle inside the box, as seen by the priority rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Contender {
    pub agent:   AgentId,
    pub arm:     Arm,
    pub entered: Tick,
}

/// `true` if `a` has priority over `b`.
///
/// First into the box goes first.  On a tie the vehicle approaching from
/// the right goes first; otherwise the lower agent id.
pub fn has_priority(a: &Contender, b: &Contender) -> bool {
    if a.entered != b.entered {
        return a.entered < b.entered;
    }
    if a.arm == b.arm.right() {
        return true;
    }
    if b.arm == a.arm.right() {
        return false;
    }
    a.agent < b.agent
}
