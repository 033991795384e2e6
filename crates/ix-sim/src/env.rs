//! The `IntersectionEnv` struct and its step loop.

#[cfg(not(feature = "fx-hash"))]
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "fx-hash")]
use rustc_hash::FxHashMap as HashMap;
use tracing::debug;

use ix_core::{AgentId, AgentRng, EnvConfig, Pose, SimRng, Tick, ZoneId};
use ix_perception::{HistoryBuffer, Observation, ObservationLayout, Perceiver, VehicleIndex, WorldView};
use ix_schedule::{SpawnQueue, SpawnSchedule};
use ix_track::TrackSet;
use ix_vehicle::{advance, Action, ActionTable, AgentStatus, VehicleParams, VehicleStore};

use crate::reward::{has_priority, Contender};
use crate::{AgentStep, EpisodeSummary, RewardConfig, SimError, SimResult, StepInfo, StepOutput};

/// One simulation instance: a shared track set plus per-episode world state.
///
/// Create via [`EnvBuilder`](crate::EnvBuilder), then call
/// [`reset`](Self::reset) before the first [`step`](Self::step).
pub struct IntersectionEnv {
    config:    EnvConfig,
    tracks:    Arc<TrackSet>,
    params:    VehicleParams,
    rewards:   RewardConfig,
    actions:   ActionTable,
    perceiver: Perceiver,

    // ── Episode state ─────────────────────────────────────────────────────
    seed:       u64,
    schedule:   Option<SpawnSchedule>,
    queue:      SpawnQueue,
    vehicles:   VehicleStore,
    /// Per-agent lidar history, indexed by `AgentId`.
    histories:  Vec<HistoryBuffer>,
    /// Per-agent noise RNGs, indexed by `AgentId`.
    rngs:       Vec<AgentRng>,
    tick:       Tick,
    done:       bool,
    returns:    Vec<f32>,
    spawned:    usize,
    goals:      usize,
    collisions: usize,
    summary:    Option<EpisodeSummary>,
}

impl IntersectionEnv {
    pub(crate) fn new(
        config:    EnvConfig,
        tracks:    Arc<TrackSet>,
        params:    VehicleParams,
        rewards:   RewardConfig,
        actions:   ActionTable,
        perceiver: Perceiver,
    ) -> Self {
        Self {
            config,
            tracks,
            params,
            rewards,
            actions,
            perceiver,
            seed:       0,
            schedule:   None,
            queue:      SpawnQueue::new(),
            vehicles:   VehicleStore::default(),
            histories:  Vec::new(),
            rngs:       Vec::new(),
            tick:       Tick::ZERO,
            done:       false,
            returns:    Vec::new(),
            spawned:    0,
            goals:      0,
            collisions: 0,
            summary:    None,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn tracks(&self) -> &Arc<TrackSet> {
        &self.tracks
    }

    pub fn vehicles(&self) -> &VehicleStore {
        &self.vehicles
    }

    /// Direct access to vehicle state for scenario setup.  Status changes
    /// must still go through the store's transition methods.
    pub fn vehicles_mut(&mut self) -> &mut VehicleStore {
        &mut self.vehicles
    }

    pub fn schedule(&self) -> Option<&SpawnSchedule> {
        self.schedule.as_ref()
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    pub fn nagents(&self) -> usize {
        self.config.nagents
    }

    pub fn observation_layout(&self) -> ObservationLayout {
        self.perceiver.layout()
    }

    #[inline]
    pub fn observation_len(&self) -> usize {
        self.perceiver.layout().len()
    }

    #[inline]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn active_agents(&self) -> Vec<AgentId> {
        self.vehicles.active_ids()
    }

    /// Agents still waiting to spawn.
    pub fn pending_spawns(&self) -> usize {
        self.queue.len()
    }

    /// Running undiscounted return per agent.
    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    /// Totals of the last finished episode.
    pub fn summary(&self) -> Option<&EpisodeSummary> {
        self.summary.as_ref()
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Start a new episode: draw the spawn schedule from `seed`, admit the
    /// agents due at tick 0, and return their first observations.
    pub fn reset(&mut self, seed: u64) -> SimResult<Vec<(AgentId, Observation)>> {
        let mut rng = SimRng::new(seed);
        let schedule = SpawnSchedule::generate(&self.config, &self.tracks, &mut rng)?;
        let n = schedule.len();

        self.vehicles   = VehicleStore::new(&schedule.tracks());
        self.histories  = (0..n).map(|_| self.perceiver.new_history()).collect();
        self.rngs       = (0..n).map(|i| AgentRng::new(seed, AgentId(i as u32))).collect();
        self.queue      = SpawnQueue::from_schedule(&schedule);
        self.schedule   = Some(schedule);
        self.seed       = seed;
        self.tick       = Tick::ZERO;
        self.done       = false;
        self.returns    = vec![0.0; n];
        self.spawned    = 0;
        self.goals      = 0;
        self.collisions = 0;
        self.summary    = None;

        let spawned = self.admit_spawns(Tick::ZERO)?;
        debug!(seed, agents = n, spawned = spawned.len(), "episode reset");

        self.observe_active()
    }

    /// Advance one decision step.
    ///
    /// `joint` holds exactly one `(agent, action index)` pair per active
    /// agent.  On error the world is left unchanged.
    pub fn step(&mut self, joint: &[(AgentId, usize)]) -> SimResult<StepOutput> {
        if self.schedule.is_none() {
            return Err(SimError::NotReset);
        }
        if self.done {
            return Err(SimError::EpisodeOver);
        }

        let acting = self.vehicles.active_ids();
        let decoded = self.decode_joint_action(&acting, joint)?;
        let mut rewards = vec![0.0f32; self.vehicles.len()];

        // ── Phase 1: actions and kinematics ───────────────────────────────
        for &(agent, action) in &decoded {
            let state = &mut self.vehicles.states[agent.index()];
            let track = self.tracks.track(state.track);
            let before = state.s.min(track.length());
            advance(state, action.acceleration, track, &self.params, self.config.timesteps);
            let moved = state.s.min(track.length()) - before;
            rewards[agent.index()] += self.rewards.progress(moved, track.length());
        }

        self.tick = self.tick + 1;
        let now = self.tick;

        // ── Phase 2: occupancy zones ──────────────────────────────────────
        //
        // Agents past the end of their track have no zone and cannot collide.
        let mut occupancy: HashMap<ZoneId, Vec<AgentId>> = HashMap::default();
        for &agent in &acting {
            let st = &self.vehicles.states[agent.index()];
            if let Some(zone) = self.tracks.occupancy_zone(st.track, st.s) {
                occupancy.entry(zone).or_default().push(agent);
            }
        }

        // ── Phase 3: collisions ───────────────────────────────────────────
        //
        // A shared zone is a collision; so are bodies overlapping across a
        // zone boundary.
        let mut collisions: Vec<AgentId> = occupancy
            .values()
            .filter(|agents| agents.len() > 1)
            .flatten()
            .copied()
            .collect();
        let bodies = self.body_poses(occupancy.values().flatten().copied());
        for (i, &(a, pose_a)) in bodies.iter().enumerate() {
            for &(b, pose_b) in &bodies[i + 1..] {
                if self.params.bodies_overlap(pose_a, pose_b) {
                    collisions.extend([a, b]);
                }
            }
        }
        collisions.sort_unstable();
        collisions.dedup();
        for &agent in &collisions {
            self.vehicles.finish(agent, AgentStatus::Collided, now)?;
            rewards[agent.index()] += self.rewards.collision_penalty;
            debug!(tick = now.0, agent = agent.0, "collision");
        }

        // ── Phase 4: goals ────────────────────────────────────────────────
        let goals: Vec<AgentId> = acting
            .iter()
            .copied()
            .filter(|&agent| {
                let st = &self.vehicles.states[agent.index()];
                st.status.is_active() && st.s >= self.tracks.track(st.track).length()
            })
            .collect();
        for &agent in &goals {
            self.vehicles.finish(agent, AgentStatus::ReachedGoal, now)?;
            let steps = self.vehicles.states[agent.index()].active_steps(now);
            rewards[agent.index()] += self.rewards.goal(steps, self.config.horizon);
            debug!(tick = now.0, agent = agent.0, steps, "goal reached");
        }

        // ── Phase 5: right of way ─────────────────────────────────────────
        self.record_box_entries(&acting, now);
        let violators = self.right_of_way_violators(&acting);
        if self.config.learn_right_of_way {
            for &agent in &violators {
                rewards[agent.index()] += self.rewards.right_of_way_penalty;
            }
        }

        // ── Phase 6: spawns ───────────────────────────────────────────────
        let horizon_hit = now.0 >= self.config.horizon;
        let spawned = if horizon_hit { Vec::new() } else { self.admit_spawns(now)? };

        // ── Phase 7: done flags ───────────────────────────────────────────
        let episode_done = horizon_hit || self.vehicles.all_terminal();
        let agents: Vec<AgentStep> = acting
            .iter()
            .map(|&agent| {
                let status    = self.vehicles.status(agent);
                let terminal  = status.is_terminal();
                let truncated = !terminal && horizon_hit;
                AgentStep {
                    agent,
                    reward: rewards[agent.index()],
                    done: terminal || truncated,
                    truncated,
                    status,
                }
            })
            .collect();
        for step in &agents {
            self.returns[step.agent.index()] += step.reward;
        }
        self.goals      += goals.len();
        self.collisions += collisions.len();

        // ── Phase 8: observations ─────────────────────────────────────────
        let observations = self.observe_active()?;

        if episode_done {
            self.done = true;
            let summary = EpisodeSummary {
                seed:       self.seed,
                length:     now.0,
                spawned:    self.spawned,
                goals:      self.goals,
                collisions: self.collisions,
                returns:    self.returns.clone(),
            };
            debug!(
                seed = self.seed,
                length = now.0,
                goals = self.goals,
                collisions = self.collisions,
                "episode done"
            );
            self.summary = Some(summary);
        }

        Ok(StepOutput {
            observations,
            agents,
            info: StepInfo {
                tick: now,
                collisions,
                goals,
                spawned,
                right_of_way_violations: violators.len(),
                episode_done,
            },
        })
    }

    // ── Step helpers ──────────────────────────────────────────────────────

    /// Check `joint` against the active set and decode every action before
    /// any state is touched.
    fn decode_joint_action(
        &self,
        acting: &[AgentId],
        joint:  &[(AgentId, usize)],
    ) -> SimResult<Vec<(AgentId, Action)>> {
        let mut chosen: Vec<Option<usize>> = vec![None; self.vehicles.len()];
        for &(agent, index) in joint {
            let Some(slot) = chosen.get_mut(agent.index()) else {
                return Err(SimError::InactiveAgent(agent));
            };
            if !self.vehicles.states[agent.index()].status.is_active() {
                return Err(SimError::InactiveAgent(agent));
            }
            if slot.is_some() {
                return Err(SimError::DuplicateAction(agent));
            }
            *slot = Some(index);
        }

        acting
            .iter()
            .map(|&agent| {
                let index = chosen[agent.index()].ok_or(SimError::MissingAction(agent))?;
                let action = self
                    .actions
                    .decode(index)
                    .map_err(|_| SimError::InvalidAction { agent, index })?;
                Ok((agent, action))
            })
            .collect()
    }

    fn record_box_entries(&mut self, acting: &[AgentId], now: Tick) {
        for &agent in acting {
            let st = &mut self.vehicles.states[agent.index()];
            if st.status.is_active()
                && st.box_entry_tick.is_none()
                && self.tracks.track(st.track).in_box(st.s)
            {
                st.box_entry_tick = Some(now);
            }
        }
    }

    /// Active agents inside the box together with a conflicting vehicle that
    /// has priority over them.
    fn right_of_way_violators(&self, acting: &[AgentId]) -> Vec<AgentId> {
        let in_box: Vec<Contender> = acting
            .iter()
            .filter_map(|&agent| {
                let st = &self.vehicles.states[agent.index()];
                let track = self.tracks.track(st.track);
                match (st.status.is_active() && track.in_box(st.s), st.box_entry_tick) {
                    (true, Some(entered)) => Some(Contender { agent, arm: track.entry, entered }),
                    _ => None,
                }
            })
            .collect();

        in_box
            .iter()
            .filter(|me| {
                let my_track = self.vehicles.states[me.agent.index()].track;
                in_box.iter().any(|other| {
                    other.agent != me.agent
                        && self.tracks.tracks_conflict(
                            my_track,
                            self.vehicles.states[other.agent.index()].track,
                        )
                        && has_priority(other, me)
                })
            })
            .map(|c| c.agent)
            .collect()
    }

    /// Pose of every listed agent, ascending id.
    fn body_poses(&self, agents: impl Iterator<Item = AgentId>) -> Vec<(AgentId, Pose)> {
        let mut poses: Vec<(AgentId, Pose)> = agents
            .map(|agent| {
                let st = &self.vehicles.states[agent.index()];
                (agent, self.tracks.position_on_track(st.track, st.s))
            })
            .collect();
        poses.sort_unstable_by_key(|&(agent, _)| agent);
        poses
    }

    /// Admit every due agent whose entry zone is free and whose body would
    /// not overlap an active vehicle; defer the rest by one tick.
    fn admit_spawns(&mut self, now: Tick) -> SimResult<Vec<AgentId>> {
        let due = self.queue.drain_due(now);
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let on_map: Vec<AgentId> = self
            .vehicles
            .active_ids()
            .into_iter()
            .filter(|id| {
                let st = &self.vehicles.states[id.index()];
                self.tracks.occupancy_zone(st.track, st.s).is_some()
            })
            .collect();
        let mut occupied: Vec<ZoneId> = on_map
            .iter()
            .filter_map(|id| {
                let st = &self.vehicles.states[id.index()];
                self.tracks.occupancy_zone(st.track, st.s)
            })
            .collect();
        let mut bodies: Vec<Pose> =
            self.body_poses(on_map.into_iter()).into_iter().map(|(_, pose)| pose).collect();

        let mut spawned = Vec::with_capacity(due.len());
        for agent in due {
            let track = self.vehicles.states[agent.index()].track;
            let entry = self.tracks.occupancy_zone(track, 0.0);
            let pose  = self.tracks.position_on_track(track, 0.0);
            let blocked = entry.is_some_and(|z| occupied.contains(&z))
                || bodies.iter().any(|&other| self.params.bodies_overlap(other, pose));
            if blocked {
                self.queue.push(now.offset(1), agent);
                continue;
            }
            self.vehicles.spawn(agent, now, self.params.spawn_speed)?;
            occupied.extend(entry);
            bodies.push(pose);
            spawned.push(agent);
            debug!(tick = now.0, agent = agent.0, track = track.0, "spawned");
        }
        self.spawned += spawned.len();
        Ok(spawned)
    }

    /// Observation for every active agent, ascending id.
    ///
    /// With the `parallel` feature the per-agent work runs on Rayon.  Every
    /// agent owns its history and RNG, so the result does not depend on
    /// scheduling.
    fn observe_active(&mut self) -> SimResult<Vec<(AgentId, Observation)>> {
        let index = VehicleIndex::build(self.vehicles.active_ids().into_iter().map(|id| {
            let st = &self.vehicles.states[id.index()];
            (id, self.tracks.position_on_track(st.track, st.s).position)
        }));

        // Explicit field borrows so the borrow checker sees disjoint access.
        let vehicles  = &self.vehicles;
        let perceiver = &self.perceiver;
        let histories = &mut self.histories;
        let rngs      = &mut self.rngs;
        let world = WorldView {
            tracks:    &self.tracks,
            vehicles,
            index:     &index,
            params:    &self.params,
            max_accel: self.actions.max_abs_acceleration(),
        };

        #[cfg(not(feature = "parallel"))]
        let observations = histories
            .iter_mut()
            .zip(rngs.iter_mut())
            .enumerate()
            .filter(|(i, _)| vehicles.states[*i].status.is_active())
            .map(|(i, (history, rng))| {
                let agent = AgentId(i as u32);
                perceiver.observe(agent, &world, history, rng).map(|obs| (agent, obs))
            })
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "parallel")]
        let observations = {
            use rayon::prelude::*;

            histories
                .par_iter_mut()
                .zip(rngs.par_iter_mut())
                .enumerate()
                .filter(|(i, _)| vehicles.states[*i].status.is_active())
                .map(|(i, (history, rng))| {
                    let agent = AgentId(i as u32);
                    perceiver.observe(agent, &world, history, rng).map(|obs| (agent, obs))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(observations)
    }
}
