//! Deterministic per-agent and episode-level RNG wrappers.
//!
//! # Determinism strategy
//!
//! Each agent gets its own independent `SmallRng` seeded by:
//!
//!   seed = episode_seed XOR (agent_id * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive agent IDs uniformly across the seed space.
//! This means:
//!
//! - Agents never share RNG state, so lidar noise does not depend on the
//!   order (or thread) in which observations are computed.
//! - Adding agents at the end of the list does not disturb the noise streams
//!   of existing agents.
//! - All RNG calls are local to the owning thread; no synchronisation needed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::AgentId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Combine a root seed with a stream index (worker rank, iteration, …) into
/// an independent seed.  Pure function: the same inputs always give the same
/// seed, which is what makes resumed training runs reproducible.
#[inline]
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(MIXING_CONSTANT);
    // splitmix64 finaliser
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Standard normal sample by the Box–Muller transform.
#[inline]
fn box_muller(rng: &mut SmallRng) -> f32 {
    let u1: f64 = rng.r#gen::<f64>().max(1e-300); // avoid ln(0)
    let u2: f64 = rng.r#gen();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
}

// ── AgentRng ──────────────────────────────────────────────────────────────────

/// Per-agent deterministic RNG, used for lidar noise.
///
/// Create one per agent at episode reset and store it in a parallel
/// `Vec<AgentRng>` next to the vehicle states.  Each Rayon worker borrows its
/// own slice.
pub struct AgentRng(SmallRng);

impl AgentRng {
    /// Seed deterministically from the episode seed and an agent ID.
    pub fn new(episode_seed: u64, agent: AgentId) -> Self {
        let seed = episode_seed ^ (agent.0 as u64).wrapping_mul(MIXING_CONSTANT);
        AgentRng(SmallRng::seed_from_u64(seed))
    }

    /// Sample a uniformly distributed value of any `Standard`-distributed type.
    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    /// Zero-mean, unit-variance Gaussian sample.
    #[inline]
    pub fn normal(&mut self) -> f32 {
        box_muller(&mut self.0)
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Episode-level RNG for global operations (spawn schedules, policy action
/// sampling, parameter initialisation).
///
/// Used only in single-threaded contexts.  Parallel consumers seed their own
/// from [`mix_seed`].
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    #[inline]
    pub fn normal(&mut self) -> f32 {
        box_muller(&mut self.0)
    }

    /// Shuffle a mutable slice in-place (Fisher-Yates).
    #[inline]
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.0);
    }
}
