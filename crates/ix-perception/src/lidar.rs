//! Ray-cast range sensor.

use std::f32::consts::TAU;

use ix_core::geo::ray_circle_hit;
use ix_core::{AgentRng, Point2, Pose, Segment};

use crate::{PerceptionError, PerceptionResult};

/// Sensor geometry and noise level.
#[derive(Clone, Debug, PartialEq)]
pub struct LidarConfig {
    /// Rays per frame, evenly spaced over a full turn starting at the
    /// vehicle heading.
    pub npoints:   usize,
    /// Returns closer than this read as `min_range`.
    pub min_range: f32,
    /// Sensing radius.
    pub max_range: f32,
    /// Standard deviation of the Gaussian added to each normalised sample.
    pub noise:     f32,
}

impl LidarConfig {
    pub fn new(npoints: usize, noise: f32) -> Self {
        Self { npoints, min_range: 2.5, max_range: 50.0, noise }
    }
}

/// A configured lidar.  Stateless; noise comes from the caller's RNG.
#[derive(Clone, Debug)]
pub struct Lidar {
    config: LidarConfig,
    /// Unit ray directions relative to heading 0.
    rays:   Vec<Point2>,
}

impl Lidar {
    pub fn new(config: LidarConfig) -> PerceptionResult<Self> {
        if config.npoints == 0 {
            return Err(PerceptionError::Config("npoints must be positive".into()));
        }
        if !(config.min_range >= 0.0 && config.max_range > config.min_range) {
            return Err(PerceptionError::Config(format!(
                "need 0 <= min_range < max_range, got {} and {}",
                config.min_range, config.max_range
            )));
        }
        let step = TAU / config.npoints as f32;
        let rays = (0..config.npoints)
            .map(|k| Point2::from_heading(k as f32 * step))
            .collect();
        Ok(Self { config, rays })
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    #[inline]
    pub fn npoints(&self) -> usize {
        self.config.npoints
    }

    /// One frame of `npoints` normalised samples seen from `pose`.
    ///
    /// `obstacles` are circle centres of radius `radius` (other vehicles,
    /// already culled to the sensing range); `walls` are road edges.
    pub fn scan(
        &self,
        pose:      Pose,
        obstacles: &[Point2],
        radius:    f32,
        walls:     &[Segment],
        rng:       &mut AgentRng,
    ) -> Vec<f32> {
        let LidarConfig { min_range, max_range, noise, .. } = self.config;
        let origin = pose.position;

        self.rays
            .iter()
            .map(|ray| {
                let dir = ray.rotate(pose.heading);
                let mut nearest = max_range;
                for &c in obstacles {
                    if let Some(t) = ray_circle_hit(origin, dir, c, radius) {
                        nearest = nearest.min(t);
                    }
                }
                for wall in walls {
                    if let Some(t) = wall.ray_hit(origin, dir) {
                        nearest = nearest.min(t);
                    }
                }
                let sample = nearest.clamp(min_range, max_range) / max_range;
                if noise > 0.0 {
                    (sample + noise * rng.normal()).clamp(0.0, 1.0)
                } else {
                    sample
                }
            })
            .collect()
    }
}
