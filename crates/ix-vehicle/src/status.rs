//! Vehicle lifecycle.

use serde::{Deserialize, Serialize};

/// Where a vehicle is in its episode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    NotYetSpawned,
    Active,
    ReachedGoal,
    Collided,
}

impl AgentStatus {
    #[inline]
    pub fn is_active(self) -> bool {
        self == AgentStatus::Active
    }

    /// `true` for `ReachedGoal` and `Collided`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::ReachedGoal | AgentStatus::Collided)
    }

    /// `true` if `self → next` is a legal lifecycle edge.
    pub fn can_advance_to(self, next: AgentStatus) -> bool {
        matches!(
            (self, next),
            (AgentStatus::NotYetSpawned, AgentStatus::Active)
                | (AgentStatus::Active, AgentStatus::ReachedGoal)
                | (AgentStatus::Active, AgentStatus::Collided)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::NotYetSpawned => "not_yet_spawned",
            AgentStatus::Active        => "active",
            AgentStatus::ReachedGoal   => "reached_goal",
            AgentStatus::Collided      => "collided",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
