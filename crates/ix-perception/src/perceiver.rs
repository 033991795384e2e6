//! Per-agent observation: scan, record, stack.

use ix_core::{AgentId, AgentRng, Point2};
use ix_track::TrackSet;
use ix_vehicle::{VehicleParams, VehicleStore};

use crate::observation::ego_features;
use crate::{HistoryBuffer, Lidar, Observation, ObservationLayout, PerceptionResult, VehicleIndex};

/// Read-only world state an observation is computed from.
#[derive(Copy, Clone)]
pub struct WorldView<'a> {
    pub tracks:    &'a TrackSet,
    pub vehicles:  &'a VehicleStore,
    pub index:     &'a VehicleIndex,
    pub params:    &'a VehicleParams,
    /// Largest |acceleration| of the action table.
    pub max_accel: f32,
}

/// Builds observations for one environment configuration.
#[derive(Clone, Debug)]
pub struct Perceiver {
    lidar:  Lidar,
    layout: ObservationLayout,
}

impl Perceiver {
    pub fn new(lidar: Lidar, history_len: usize) -> Self {
        let layout = ObservationLayout { npoints: lidar.npoints(), history_len };
        Self { lidar, layout }
    }

    pub fn layout(&self) -> ObservationLayout {
        self.layout
    }

    pub fn lidar(&self) -> &Lidar {
        &self.lidar
    }

    pub fn new_history(&self) -> HistoryBuffer {
        HistoryBuffer::new(self.layout.history_len, self.layout.npoints)
    }

    /// Scan from `agent`'s pose, push the frame into `history`, and return
    /// the stacked observation.
    pub fn observe(
        &self,
        agent:   AgentId,
        world:   &WorldView<'_>,
        history: &mut HistoryBuffer,
        rng:     &mut AgentRng,
    ) -> PerceptionResult<Observation> {
        let state = &world.vehicles.states[agent.index()];
        let track = world.tracks.track(state.track);
        let pose  = track.pose_at(state.s);
        let radius = world.params.safety_radius();

        let reach = self.lidar.config().max_range + radius;
        let centres: Vec<Point2> = world
            .index
            .within(pose.position, reach)
            .filter(|&(id, _)| id != agent)
            .map(|(_, p)| p)
            .collect();

        let frame = self.lidar.scan(pose, &centres, radius, world.tracks.boundary(), rng);
        history.push(frame);

        let mut data = Vec::with_capacity(self.layout.len());
        history.write_stacked(&mut data);
        data.extend_from_slice(&ego_features(state, pose, track.length(), world.params, world.max_accel));

        let obs = Observation(data);
        obs.check_finite(agent)?;
        Ok(obs)
    }
}
