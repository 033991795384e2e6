//! Discrete action space.
//!
//! The policy picks an index; the table maps it to a fixed longitudinal
//! command.  Lateral motion is fully determined by the track, so every entry
//! carries [`LaneKeep::FollowTrack`].

use serde::{Deserialize, Serialize};

use crate::{VehicleError, VehicleResult};

/// Lateral part of a command.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneKeep {
    #[default]
    FollowTrack,
}

/// One decoded action.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Longitudinal acceleration in m/s².
    pub acceleration: f32,
    pub lane_keep:    LaneKeep,
}

/// Index → command lookup shared by the environment and the policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionTable {
    actions: Vec<Action>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::from_accelerations(&[-4.0, -2.0, 0.0, 2.0, 4.0])
    }
}

impl ActionTable {
    pub fn from_accelerations(accels: &[f32]) -> Self {
        Self {
            actions: accels
                .iter()
                .map(|&acceleration| Action { acceleration, lane_keep: LaneKeep::FollowTrack })
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn decode(&self, index: usize) -> VehicleResult<Action> {
        self.actions
            .get(index)
            .copied()
            .ok_or(VehicleError::UnknownAction { index, len: self.actions.len() })
    }

    /// Largest |acceleration| in the table; used to normalise ego features.
    pub fn max_abs_acceleration(&self) -> f32 {
        self.actions
            .iter()
            .map(|a| a.acceleration.abs())
            .fold(0.0, f32::max)
    }

    /// Index of the entry with the largest acceleration.
    pub fn strongest_acceleration(&self) -> usize {
        self.actions
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, a)| {
                if a.acceleration > best.1 { (i, a.acceleration) } else { best }
            })
            .0
    }
}
