//! Integration tests for ix-sim.

use std::collections::HashMap;

use ix_core::{AgentId, EnvConfig, SimRng, TrackId};
use ix_vehicle::{AgentStatus, VehicleParams};

use crate::{EnvBuilder, EpisodeSummary, IntersectionEnv, StepOutput};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn config(nagents: usize) -> EnvConfig {
    EnvConfig { nagents, npoints: 16, history_len: 2, ..EnvConfig::default() }
}

fn env(config: EnvConfig, seed: u64) -> IntersectionEnv {
    let mut env = EnvBuilder::new(config).build().unwrap();
    env.reset(seed).unwrap();
    env
}

/// The same action index for every active agent.
fn constant(env: &IntersectionEnv, index: usize) -> Vec<(AgentId, usize)> {
    env.active_agents().into_iter().map(|a| (a, index)).collect()
}

/// The agent driving `track` (straight-only, one agent per pocket).
fn agent_on(env: &IntersectionEnv, track: TrackId) -> AgentId {
    let i = env.vehicles().states.iter().position(|s| s.track == track).unwrap();
    AgentId(i as u32)
}

/// Park every vehicle, then put `agent` at arc length `s`.
fn place(env: &mut IntersectionEnv, agent: AgentId, s: f32) {
    let store = env.vehicles_mut();
    for st in &mut store.states {
        st.speed = 0.0;
    }
    store.states[agent.index()].s = s;
}

const HOLD: usize = 2; // 0 m/s²
const FLOOR_IT: usize = 4; // +4 m/s²

// ── EnvBuilder ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use std::sync::Arc;

    use ix_core::{EnvKind, IxError};
    use ix_track::{IntersectionLayout, TrackSetBuilder};

    use super::*;
    use crate::SimError;

    #[test]
    fn continuous_env_is_rejected() {
        let err = EnvBuilder::new(config(1)).kind(EnvKind::ContinuousFixedTrack).build();
        assert!(matches!(err, Err(SimError::Core(IxError::Unsupported(_)))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = EnvConfig { horizon: 0, ..config(1) };
        assert!(matches!(EnvBuilder::new(bad).build(), Err(SimError::Core(IxError::Config(_)))));
    }

    #[test]
    fn track_set_must_match_turns() {
        let tracks = Arc::new(TrackSetBuilder::new(IntersectionLayout::default()).turns(true).build().unwrap());
        let err = EnvBuilder::new(config(2)).tracks(tracks).build();
        assert!(matches!(err, Err(SimError::Config(_))));
    }

    #[test]
    fn shared_track_set_is_accepted() {
        let tracks = Arc::new(TrackSetBuilder::new(IntersectionLayout::default()).build().unwrap());
        let a = EnvBuilder::new(config(2)).tracks(Arc::clone(&tracks)).build().unwrap();
        let b = EnvBuilder::new(config(2)).tracks(Arc::clone(&tracks)).build().unwrap();
        assert!(Arc::ptr_eq(a.tracks(), b.tracks()));
    }

    #[test]
    fn step_before_reset() {
        let mut env = EnvBuilder::new(config(1)).build().unwrap();
        assert!(matches!(env.step(&[]), Err(SimError::NotReset)));
    }
}

// ── Joint action validation ───────────────────────────────────────────────────

#[cfg(test)]
mod actions {
    use super::*;
    use crate::SimError;

    #[test]
    fn missing_action() {
        let mut e = env(config(4), 1);
        let mut joint = constant(&e, HOLD);
        let dropped = joint.pop().unwrap().0;
        assert!(matches!(e.step(&joint), Err(SimError::MissingAction(a)) if a == dropped));
        assert_eq!(e.tick().0, 0);
    }

    #[test]
    fn unknown_action_index() {
        let mut e = env(config(1), 1);
        let err = e.step(&[(AgentId(0), 9)]);
        assert!(matches!(err, Err(SimError::InvalidAction { index: 9, .. })));
    }

    #[test]
    fn action_for_inactive_agent() {
        let mut e = env(config(1), 1);
        let err = e.step(&[(AgentId(0), HOLD), (AgentId(5), HOLD)]);
        assert!(matches!(err, Err(SimError::InactiveAgent(AgentId(5)))));
    }

    #[test]
    fn duplicate_action() {
        let mut e = env(config(1), 1);
        let err = e.step(&[(AgentId(0), HOLD), (AgentId(0), FLOOR_IT)]);
        assert!(matches!(err, Err(SimError::DuplicateAction(AgentId(0)))));
    }
}

// ── Episode flow ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod episode {
    use super::*;
    use crate::SimError;

    #[test]
    fn reset_spawns_balanced_agents_with_observations() {
        let mut e = EnvBuilder::new(config(4)).build().unwrap();
        let obs = e.reset(3).unwrap();
        assert_eq!(obs.len(), 4);
        assert!(obs.iter().all(|(_, o)| o.len() == e.observation_len()));
        assert_eq!(e.observation_len(), 2 * 16 + 5);
        assert_eq!(e.observation_layout().npoints, 16);
        assert!(e.schedule().unwrap().max_pending_per_pocket() <= 1);
        assert_eq!(e.pending_spawns(), 0);
    }

    #[test]
    fn single_agent_reaches_goal() {
        let cfg = EnvConfig { nagents: 1, horizon: 200, turns: false, lidar_noise: 0.0, ..EnvConfig::default() };
        let mut e = env(cfg, 0);
        let mut steps = 0;
        let mut last = StepOutput::default();
        while !e.is_done() {
            last = e.step(&constant(&e, FLOOR_IT)).unwrap();
            steps += 1;
        }

        let summary = e.summary().unwrap();
        assert_eq!(summary.goals, 1);
        assert_eq!(summary.collisions, 0);
        assert_eq!(summary.length, steps);
        assert!(steps < 200);

        let final_step = &last.agents[0];
        assert_eq!(final_step.status, AgentStatus::ReachedGoal);
        assert!(final_step.done && !final_step.truncated);
        assert!(final_step.reward > 0.5);
        assert!(last.observations.is_empty());
        assert!(last.info.episode_done);
    }

    #[test]
    fn horizon_truncates_and_keeps_observations() {
        let cfg = EnvConfig { horizon: 5, ..config(1) };
        let mut e = env(cfg, 0);
        for _ in 0..4 {
            let out = e.step(&constant(&e, HOLD)).unwrap();
            assert!(!out.agents[0].done);
        }
        let out = e.step(&constant(&e, HOLD)).unwrap();
        assert!(out.agents[0].done);
        assert!(out.agents[0].truncated);
        assert_eq!(out.agents[0].status, AgentStatus::Active);
        assert_eq!(out.observations.len(), 1);
        assert!(out.info.episode_done);
        assert_eq!(e.summary().unwrap().length, 5);

        assert!(matches!(e.step(&constant(&e, HOLD)), Err(SimError::EpisodeOver)));
    }

    #[test]
    fn return_is_full_progress_plus_goal_bonus() {
        let cfg = EnvConfig { nagents: 1, horizon: 500, ..EnvConfig::default() };
        let mut e = env(cfg, 0);
        let mut total = 0.0;
        while !e.is_done() {
            let out = e.step(&constant(&e, FLOOR_IT)).unwrap();
            total += out.agents[0].reward;
        }
        assert!((e.summary().unwrap().returns[0] - total).abs() < 1e-5);
        // 1.0 for covering the track, plus a goal bonus in (0.5, 1.0].
        assert!(total > 1.5 && total <= 2.0 + 1e-4, "return {total}");
    }

    #[test]
    fn mean_return_skips_agents_that_never_spawned() {
        let summary = EpisodeSummary {
            seed:       0,
            length:     10,
            spawned:    2,
            goals:      1,
            collisions: 0,
            returns:    vec![1.5, 0.5, 0.0, 0.0],
        };
        assert_eq!(summary.mean_return(), 1.0);
        assert_eq!(EpisodeSummary { spawned: 0, returns: vec![0.0; 4], ..summary }.mean_return(), 0.0);
    }

    #[test]
    fn truncated_episode_averages_over_spawned_agents() {
        // Eight agents over four pockets: the second wave is due a spawn gap
        // later, well past a 3-step horizon.
        let cfg = EnvConfig { horizon: 3, ..config(8) };
        let mut e = env(cfg, 1);
        while !e.is_done() {
            e.step(&constant(&e, HOLD)).unwrap();
        }
        let summary = e.summary().unwrap();
        assert!(summary.spawned < 8);
        let total: f32 = summary.returns.iter().sum();
        assert!((summary.mean_return() - total / summary.spawned as f32).abs() < 1e-6);
    }
}

// ── Collisions and right of way ───────────────────────────────────────────────

#[cfg(test)]
mod interactions {
    use super::*;

    #[test]
    fn same_zone_collides_both() {
        let mut e = env(config(4), 5);
        let east  = agent_on(&e, TrackId(0));
        let north = agent_on(&e, TrackId(1));
        // Both at (-5, 5), where the two lanes cross.
        place(&mut e, east, 55.0);
        place(&mut e, north, 45.0);

        let out = e.step(&constant(&e, HOLD)).unwrap();
        let mut expected = vec![east, north];
        expected.sort();
        assert_eq!(out.info.collisions, expected);

        for step in out.agents.iter().filter(|s| expected.contains(&s.agent)) {
            assert_eq!(step.status, AgentStatus::Collided);
            assert!(step.done);
            assert_eq!(step.reward, -10.0);
        }
        assert_eq!(e.active_agents().len(), 2);
        assert!(out.observations.iter().all(|(a, _)| !expected.contains(a)));
    }

    #[test]
    fn overlapping_bodies_in_neighbouring_zones_collide() {
        let mut e = env(config(4), 5);
        let east  = agent_on(&e, TrackId(0));
        let north = agent_on(&e, TrackId(1));
        // (-7, 5) and (-5, 5): 2 m apart, different zones.
        place(&mut e, east, 57.0);
        place(&mut e, north, 45.0);
        let zone = |e: &IntersectionEnv, a: AgentId| {
            let st = &e.vehicles().states[a.index()];
            e.tracks().occupancy_zone(st.track, st.s)
        };
        assert_ne!(zone(&e, east), zone(&e, north));

        let out = e.step(&constant(&e, HOLD)).unwrap();
        let mut expected = vec![east, north];
        expected.sort();
        assert_eq!(out.info.collisions, expected);
        assert_eq!(e.vehicles().status(east), AgentStatus::Collided);
        assert_eq!(e.vehicles().status(north), AgentStatus::Collided);
    }

    #[test]
    fn approach_from_the_right_has_priority() {
        let cfg = EnvConfig { learn_right_of_way: true, ..config(4) };
        let mut e = env(cfg, 5);
        let east  = agent_on(&e, TrackId(0));
        let north = agent_on(&e, TrackId(1));
        // Both just inside the box, different zones, conflicting tracks.
        place(&mut e, east, 41.0);
        place(&mut e, north, 41.0);

        let out = e.step(&constant(&e, HOLD)).unwrap();
        assert_eq!(out.info.right_of_way_violations, 1);
        let east_step  = out.agents.iter().find(|s| s.agent == east).unwrap();
        let north_step = out.agents.iter().find(|s| s.agent == north).unwrap();
        assert!((east_step.reward + 0.05).abs() < 1e-6);
        assert_eq!(north_step.reward, 0.0);
    }

    #[test]
    fn right_of_way_counted_but_not_scored_when_disabled() {
        let mut e = env(config(4), 5);
        let east  = agent_on(&e, TrackId(0));
        let north = agent_on(&e, TrackId(1));
        place(&mut e, east, 41.0);
        place(&mut e, north, 41.0);

        let out = e.step(&constant(&e, HOLD)).unwrap();
        assert_eq!(out.info.right_of_way_violations, 1);
        assert!(out.agents.iter().all(|s| s.reward == 0.0));
    }
}

// ── Invariants ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod invariants {
    use super::*;

    fn run_episode_checked(cfg: EnvConfig, seed: u64) {
        let horizon = cfg.horizon;
        let mut e = env(cfg, seed);
        let mut rng = SimRng::new(seed ^ 0xabcd);
        let mut prev: Vec<AgentStatus> = e.vehicles().states.iter().map(|s| s.status).collect();
        let mut terminal_rewards: HashMap<AgentId, usize> = HashMap::new();

        while !e.is_done() {
            let joint: Vec<(AgentId, usize)> = e
                .active_agents()
                .into_iter()
                .map(|a| (a, rng.gen_range(0..e.action_count())))
                .collect();
            let out = e.step(&joint).unwrap();

            // Monotonic status transitions.
            for (i, st) in e.vehicles().states.iter().enumerate() {
                assert!(prev[i] == st.status || prev[i].can_advance_to(st.status));
                prev[i] = st.status;
            }

            // No two active agents share a zone or overlap.
            let mut zones = HashMap::new();
            let mut bodies = Vec::new();
            let params = VehicleParams::default();
            for a in e.active_agents() {
                let st = &e.vehicles().states[a.index()];
                if let Some(z) = e.tracks().occupancy_zone(st.track, st.s) {
                    assert!(zones.insert(z, a).is_none(), "zone {z:?} shared");
                    let pose = e.tracks().position_on_track(st.track, st.s);
                    assert!(bodies.iter().all(|&other| !params.bodies_overlap(other, pose)));
                    bodies.push(pose);
                }
            }

            for step in &out.agents {
                if step.status.is_terminal() {
                    *terminal_rewards.entry(step.agent).or_default() += 1;
                }
            }

            assert!(e.tick().0 <= horizon);
            let all_terminal = e.vehicles().all_terminal();
            assert_eq!(out.info.episode_done, all_terminal || e.tick().0 == horizon);
        }

        for (i, st) in e.vehicles().states.iter().enumerate() {
            let count = terminal_rewards.get(&AgentId(i as u32)).copied().unwrap_or(0);
            assert_eq!(count, usize::from(st.status.is_terminal()));
        }
    }

    #[test]
    fn random_episodes_hold_invariants() {
        for seed in 0..6 {
            let cfg = EnvConfig {
                nagents: 8,
                turns: true,
                horizon: 150,
                lidar_noise: 0.05,
                balance_cars: seed % 2 == 0,
                ..config(8)
            };
            run_episode_checked(cfg, seed);
        }
    }

    #[test]
    fn same_seed_same_observations() {
        for noise in [0.0, 0.2] {
            let cfg = EnvConfig { nagents: 4, turns: true, lidar_noise: noise, ..config(4) };
            let mut a = EnvBuilder::new(cfg.clone()).build().unwrap();
            let mut b = EnvBuilder::new(cfg).build().unwrap();
            assert_eq!(a.reset(11).unwrap(), b.reset(11).unwrap());
            for _ in 0..40 {
                if a.is_done() {
                    break;
                }
                let oa = a.step(&constant(&a, 3)).unwrap();
                let ob = b.step(&constant(&b, 3)).unwrap();
                assert_eq!(oa.observations, ob.observations);
                assert_eq!(oa.agents, ob.agents);
            }
        }
    }
}
