//! `ix-sim` — the multi-agent step engine.
//!
//! # Step phases
//!
//! ```text
//! step(joint_action):
//!   ① Actions    — decode one action per active agent, integrate kinematics,
//!                  accumulate progress reward.
//!   ② Zones      — occupancy zone of every active agent (none once past the
//!                  end of its track).
//!   ③ Collisions — every agent sharing a zone with another → Collided.
//!   ④ Goals      — arc length ≥ track length → ReachedGoal.
//!   ⑤ Right of way (learn_right_of_way only) — penalise yielding failures.
//!   ⑥ Spawns     — admit due agents whose entry zone is free.
//!   ⑦ Done       — per-agent (terminal or horizon) and episode
//!                  (all terminal or horizon).
//!   ⑧ Observe    — one observation per agent still active
//!                  (parallel with the `parallel` feature).
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the observation phase on Rayon's thread pool.     |
//! | `fx-hash`  | FxHash for the occupancy index.                        |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ix_core::EnvConfig;
//! use ix_sim::EnvBuilder;
//!
//! let mut env = EnvBuilder::new(EnvConfig::default()).build()?;
//! let mut obs = env.reset(42)?;
//! while !env.is_done() {
//!     let actions: Vec<_> = obs.iter().map(|(id, _)| (*id, 2)).collect();
//!     obs = env.step(&actions)?.observations;
//! }
//! ```

pub mod builder;
pub mod env;
pub mod error;
pub mod reward;
pub mod step;

#[cfg(test)]
mod tests;

pub use builder::EnvBuilder;
pub use env::IntersectionEnv;
pub use error::{SimError, SimResult};
pub use reward::RewardConfig;
pub use step::{AgentStep, EpisodeSummary, StepInfo, StepOutput};
