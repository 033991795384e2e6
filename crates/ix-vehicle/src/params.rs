//! Physical vehicle parameters, shared by every vehicle in an episode.

use ix_core::geo::rectangles_overlap;
use ix_core::Pose;
use serde::{Deserialize, Serialize};

/// Body dimensions and motion limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Body length in metres.
    pub length: f32,
    /// Body width in metres.
    pub width: f32,
    /// Duration of one decision step, seconds.
    pub dt: f32,
    pub max_speed: f32,
    /// Cap on `v²·κ` through curves.
    pub max_lateral_accel: f32,
    /// Speed at the moment of spawning.
    pub spawn_speed: f32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            length:            4.48,
            width:             2.2,
            dt:                0.1,
            max_speed:         16.0,
            max_lateral_accel: 4.0,
            spawn_speed:       2.0,
        }
    }
}

impl VehicleParams {
    /// Radius of the circle used for lidar returns: 1.3 × half the body
    /// diagonal.
    #[inline]
    pub fn safety_radius(&self) -> f32 {
        1.3 * 0.5 * (self.length * self.length + self.width * self.width).sqrt()
    }

    /// `true` if the bodies of two vehicles at `a` and `b` intersect.
    #[inline]
    pub fn bodies_overlap(&self, a: Pose, b: Pose) -> bool {
        rectangles_overlap(a, b, self.length, self.width)
    }

    /// Highest speed allowed on a segment of curvature `curvature`.
    #[inline]
    pub fn speed_cap(&self, curvature: f32) -> f32 {
        if curvature > 0.0 {
            self.max_speed.min((self.max_lateral_accel / curvature).sqrt())
        } else {
            self.max_speed
        }
    }
}
