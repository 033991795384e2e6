//! `ix-rollout` — turning a policy and an environment into trajectories.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`policy`]     | `Policy` trait, `ActionSample`, `RandomPolicy`, `ConstantPolicy` |
//! | [`trajectory`] | `Transition`, `Trajectory`, `TrajectoryEnd`, `RolloutBatch`|
//! | [`worker`]     | `RolloutWorker`                                            |
//! | [`error`]      | `RolloutError`, `RolloutResult<T>`                         |
//!
//! # Loop
//!
//! ```text
//! reset(seed) → observations
//! loop:
//!   act(observations) → (action, log_prob, value) per agent
//!   step(joint action) → rewards, dones, next observations
//!   append one transition per acting agent
//!   terminal agent   → close its trajectory (bootstrap 0)
//!   horizon / budget → close every open trajectory with V(next obs)
//! ```
//!
//! One trajectory per agent per episode.  Trajectories are handed over by
//! value and never touched again by the worker.

pub mod error;
pub mod policy;
pub mod trajectory;
pub mod worker;


pub use error::{RolloutError, RolloutResult};
pub use policy::{ActionSample, ConstantPolicy, Policy, RandomPolicy};
pub use trajectory::{RolloutBatch, Trajectory, TrajectoryEnd, Transition};
pub use worker::RolloutWorker;
