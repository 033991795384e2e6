//! `VehicleStore` — all vehicle states of one episode.

use ix_core::{AgentId, Tick, TrackId};

use crate::{AgentStatus, VehicleError, VehicleResult, VehicleState};

/// `Vec<VehicleState>` indexed by `AgentId`, with status transitions checked
/// against [`AgentStatus::can_advance_to`].
///
/// The vector length is fixed for the episode; agent `i` is always at
/// index `i`.
#[derive(Clone, Debug, Default)]
pub struct VehicleStore {
    pub states: Vec<VehicleState>,
}

impl VehicleStore {
    /// One pending vehicle per entry of `tracks`.
    pub fn new(tracks: &[TrackId]) -> Self {
        Self { states: tracks.iter().map(|&t| VehicleState::pending(t)).collect() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn get(&self, agent: AgentId) -> Option<&VehicleState> {
        self.states.get(agent.index())
    }

    #[inline]
    pub fn status(&self, agent: AgentId) -> AgentStatus {
        self.states[agent.index()].status
    }

    /// Ids of all active vehicles, ascending.
    pub fn active_ids(&self) -> Vec<AgentId> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status.is_active())
            .map(|(i, _)| AgentId(i as u32))
            .collect()
    }

    pub fn count(&self, status: AgentStatus) -> usize {
        self.states.iter().filter(|s| s.status == status).count()
    }

    /// `true` once every vehicle has reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.states.iter().all(|s| s.status.is_terminal())
    }

    /// Apply the transition `current → next` for `agent`.
    pub fn transition(&mut self, agent: AgentId, next: AgentStatus) -> VehicleResult<()> {
        let state = self
            .states
            .get_mut(agent.index())
            .ok_or(VehicleError::AgentNotFound(agent))?;
        if !state.status.can_advance_to(next) {
            return Err(VehicleError::IllegalTransition { agent, from: state.status, to: next });
        }
        state.status = next;
        Ok(())
    }

    /// Put `agent` at the start of its track.
    pub fn spawn(&mut self, agent: AgentId, now: Tick, speed: f32) -> VehicleResult<()> {
        self.transition(agent, AgentStatus::Active)?;
        let state = &mut self.states[agent.index()];
        state.s          = 0.0;
        state.speed      = speed;
        state.spawn_tick = Some(now);
        Ok(())
    }

    /// Move `agent` into a terminal status at `now`.
    pub fn finish(&mut self, agent: AgentId, status: AgentStatus, now: Tick) -> VehicleResult<()> {
        self.transition(agent, status)?;
        self.states[agent.index()].end_tick = Some(now);
        Ok(())
    }
}
