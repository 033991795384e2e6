//! Per-vehicle dynamic state.

use ix_core::{Tick, TrackId};

use crate::AgentStatus;

/// Everything the step engine tracks about one vehicle.
///
/// Position is one-dimensional: arc length `s` along `track`.  The pose in
/// the map frame is derived on demand from the shared `TrackSet`.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleState {
    pub track:  TrackId,
    /// Arc length along `track`, metres.
    pub s:      f32,
    /// m/s, never negative.
    pub speed:  f32,
    pub status: AgentStatus,

    /// Acceleration applied during the last step.
    pub last_accel: f32,

    pub spawn_tick: Option<Tick>,
    /// Tick of the transition into a terminal status.
    pub end_tick:   Option<Tick>,
    /// First tick the vehicle was observed inside the box.
    pub box_entry_tick: Option<Tick>,
}

impl VehicleState {
    /// A vehicle waiting to spawn onto `track`.
    pub fn pending(track: TrackId) -> Self {
        Self {
            track,
            s:              0.0,
            speed:          0.0,
            status:         AgentStatus::NotYetSpawned,
            last_accel:     0.0,
            spawn_tick:     None,
            end_tick:       None,
            box_entry_tick: None,
        }
    }

    /// Decision steps spent active up to `now`.
    pub fn active_steps(&self, now: Tick) -> u64 {
        match self.spawn_tick {
            Some(spawn) => self.end_tick.unwrap_or(now).since(spawn),
            None => 0,
        }
    }
}
