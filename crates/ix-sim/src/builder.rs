//! Fluent builder for constructing an [`IntersectionEnv`].

use std::sync::Arc;

use ix_core::{EnvConfig, EnvKind};
use ix_perception::{Lidar, LidarConfig, Perceiver};
use ix_track::{IntersectionLayout, Maneuver, TrackSet, TrackSetBuilder};
use ix_vehicle::{ActionTable, VehicleParams};

use crate::{IntersectionEnv, RewardConfig, SimError, SimResult};

/// Fluent builder for [`IntersectionEnv`].
///
/// # Optional inputs (have defaults)
///
/// | Method              | Default                                         |
/// |---------------------|-------------------------------------------------|
/// | `.kind(k)`          | `EnvKind::DiscreteFixedTrack`                   |
/// | `.layout(l)`        | `IntersectionLayout::default()`                 |
/// | `.tracks(t)`        | built from the layout and `config.turns`        |
/// | `.vehicle(p)`       | `VehicleParams::default()`                      |
/// | `.rewards(r)`       | `RewardConfig::default()`                       |
/// | `.actions(a)`       | `ActionTable::default()` (5 accelerations)      |
///
/// # Example
///
/// ```rust,ignore
/// let tracks = Arc::new(TrackSetBuilder::new(layout).turns(true).build()?);
/// let env = EnvBuilder::new(config)
///     .tracks(Arc::clone(&tracks))
///     .rewards(rewards)
///     .build()?;
/// ```
pub struct EnvBuilder {
    config:  EnvConfig,
    kind:    EnvKind,
    layout:  IntersectionLayout,
    tracks:  Option<Arc<TrackSet>>,
    vehicle: VehicleParams,
    rewards: RewardConfig,
    actions: ActionTable,
}

impl EnvBuilder {
    pub fn new(config: EnvConfig) -> Self {
        Self {
            config,
            kind:    EnvKind::default(),
            layout:  IntersectionLayout::default(),
            tracks:  None,
            vehicle: VehicleParams::default(),
            rewards: RewardConfig::default(),
            actions: ActionTable::default(),
        }
    }

    pub fn kind(mut self, kind: EnvKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn layout(mut self, layout: IntersectionLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Share an existing track set.  Must have been built with the same
    /// `turns` setting as the config.
    pub fn tracks(mut self, tracks: Arc<TrackSet>) -> Self {
        self.tracks = Some(tracks);
        self
    }

    pub fn vehicle(mut self, params: VehicleParams) -> Self {
        self.vehicle = params;
        self
    }

    pub fn rewards(mut self, rewards: RewardConfig) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn actions(mut self, actions: ActionTable) -> Self {
        self.actions = actions;
        self
    }

    /// Validate inputs and return an environment awaiting
    /// [`reset`](IntersectionEnv::reset).
    pub fn build(self) -> SimResult<IntersectionEnv> {
        self.kind.ensure_supported()?;
        self.config.validate()?;

        if self.actions.is_empty() {
            return Err(SimError::Config("action table is empty".into()));
        }
        if !(self.vehicle.dt > 0.0 && self.vehicle.max_speed > 0.0) {
            return Err(SimError::Config(format!(
                "vehicle dt and max_speed must be positive, got {:?}",
                self.vehicle
            )));
        }

        let expected = 4 * Maneuver::available(self.config.turns).len();
        let tracks = match self.tracks {
            Some(t) => {
                if t.len() != expected {
                    return Err(SimError::Config(format!(
                        "track set has {} tracks but turns={} needs {expected}",
                        t.len(),
                        self.config.turns
                    )));
                }
                t
            }
            None => Arc::new(TrackSetBuilder::new(self.layout).turns(self.config.turns).build()?),
        };

        let lidar = Lidar::new(LidarConfig::new(self.config.npoints, self.config.lidar_noise))?;
        let perceiver = Perceiver::new(lidar, self.config.history_len);

        Ok(IntersectionEnv::new(
            self.config,
            tracks,
            self.vehicle,
            self.rewards,
            self.actions,
            perceiver,
        ))
    }
}
