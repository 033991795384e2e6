//! Spawn schedule generation.
//!
//! # Balanced (`balance_cars = true`)
//!
//! A seeded permutation of the four pockets is cycled over agent ids, so
//! per-pocket counts never differ by more than one.  The `k`-th agent of a
//! pocket is due at tick `k · spawn_gap`.
//!
//! # Biased (`balance_cars = false`)
//!
//! One seeded favoured pocket receives `ceil(n/4) + 1` agents (for `n ≥ 2`),
//! the remainder pick a pocket uniformly.  Due ticks are `k · spawn_gap`
//! plus a jitter in `[0, spawn_gap/2)`.
//!
//! The favoured pocket always exceeds the balanced maximum, so the biased
//! pocket-count variance is strictly larger whenever `n ≥ 2`.

use ix_core::{AgentId, EnvConfig, SimRng, Tick, TrackId};
use ix_track::{Arm, TrackSet};

use crate::{ScheduleError, ScheduleResult};

/// One agent's entry: pocket, track, and due tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpawnPlan {
    pub agent:  AgentId,
    pub pocket: Arm,
    pub track:  TrackId,
    pub due:    Tick,
}

/// The spawn plans of one episode, indexed by `AgentId`.
#[derive(Clone, Debug)]
pub struct SpawnSchedule {
    plans:    Vec<SpawnPlan>,
    balanced: bool,
}

impl SpawnSchedule {
    /// Draw a schedule for `env.nagents` agents.
    ///
    /// All randomness comes from `rng`, so a fixed seed gives a fixed
    /// schedule.
    pub fn generate(env: &EnvConfig, tracks: &TrackSet, rng: &mut SimRng) -> ScheduleResult<Self> {
        let n = env.nagents;
        if n == 0 {
            return Err(ScheduleError::AgentCount(n));
        }
        for arm in Arm::ALL {
            if tracks.tracks_from(arm).is_empty() {
                return Err(ScheduleError::EmptyPocket(arm));
            }
        }

        let pockets = if env.balance_cars {
            balanced_pockets(n, rng)
        } else {
            biased_pockets(n, rng)
        };

        let gap = env.spawn_gap;
        let mut seen = [0u64; 4];
        let mut plans = Vec::with_capacity(n);
        for (i, &pocket) in pockets.iter().enumerate() {
            let k = seen[pocket.index()];
            seen[pocket.index()] += 1;

            let jitter = if env.balance_cars { 0 } else { rng.gen_range(0..(gap / 2).max(1)) };
            let choices = tracks.tracks_from(pocket);
            let track = choices[rng.gen_range(0..choices.len())];

            plans.push(SpawnPlan {
                agent: AgentId(i as u32),
                pocket,
                track,
                due: Tick(k * gap + jitter),
            });
        }

        Ok(Self { plans, balanced: env.balance_cars })
    }

    pub fn plans(&self) -> &[SpawnPlan] {
        &self.plans
    }

    #[inline]
    pub fn plan(&self, agent: AgentId) -> &SpawnPlan {
        &self.plans[agent.index()]
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    /// Tracks in agent-id order.
    pub fn tracks(&self) -> Vec<TrackId> {
        self.plans.iter().map(|p| p.track).collect()
    }

    /// Agents assigned to each pocket, indexed by `Arm::index()`.
    pub fn pocket_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for p in &self.plans {
            counts[p.pocket.index()] += 1;
        }
        counts
    }

    /// Largest number of agents waiting in one pocket before the first
    /// spawn.
    pub fn max_pending_per_pocket(&self) -> usize {
        self.pocket_counts().into_iter().max().unwrap_or(0)
    }

    /// Population variance of [`pocket_counts`](Self::pocket_counts).
    pub fn pocket_count_variance(&self) -> f64 {
        let counts = self.pocket_counts();
        let mean = self.plans.len() as f64 / 4.0;
        counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / 4.0
    }
}

fn balanced_pockets(n: usize, rng: &mut SimRng) -> Vec<Arm> {
    let mut order = Arm::ALL;
    rng.shuffle(&mut order);
    (0..n).map(|i| order[i % 4]).collect()
}

fn biased_pockets(n: usize, rng: &mut SimRng) -> Vec<Arm> {
    let favoured = Arm::from_index(rng.gen_range(0..4));
    let heavy = if n >= 2 { (n.div_ceil(4) + 1).min(n) } else { n };

    let mut pockets = vec![favoured; heavy];
    pockets.extend((heavy..n).map(|_| Arm::from_index(rng.gen_range(0..4))));
    rng.shuffle(&mut pockets);
    pockets
}
