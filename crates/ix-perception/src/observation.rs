//! Observation vectors and ego features.

use ix_core::{AgentId, Pose};
use ix_vehicle::{VehicleParams, VehicleState};

use crate::{PerceptionError, PerceptionResult};

/// Ego kinematic features appended after the lidar history.
pub const EGO_FEATURES: usize = 5;

/// Fixed-length feature vector for one agent at one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation(pub Vec<f32>);

impl Observation {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail on the first NaN or infinity.
    pub fn check_finite(&self, agent: AgentId) -> PerceptionResult<()> {
        match self.0.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(PerceptionError::NonFinite { agent, index }),
            None => Ok(()),
        }
    }
}

/// Shape of the observation vector for one configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObservationLayout {
    pub npoints:     usize,
    pub history_len: usize,
}

impl ObservationLayout {
    #[inline]
    pub fn len(&self) -> usize {
        self.history_len * self.npoints + EGO_FEATURES
    }
}

/// `[speed / max_speed, s / length, cos(heading), sin(heading), accel / max_accel]`.
pub fn ego_features(
    state:        &VehicleState,
    pose:         Pose,
    track_length: f32,
    params:       &VehicleParams,
    max_accel:    f32,
) -> [f32; EGO_FEATURES] {
    let accel_scale = if max_accel > 0.0 { max_accel } else { 1.0 };
    [
        state.speed / params.max_speed,
        (state.s / track_length).min(1.0),
        pose.heading.cos(),
        pose.heading.sin(),
        state.last_accel / accel_scale,
    ]
}
