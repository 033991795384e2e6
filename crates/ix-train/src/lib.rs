//! `ix-train` — distributed on-policy training for the intersection
//! environment.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                        |
//! |----------------|-----------------------------------------------------------------|
//! | [`config`]     | `TrainConfig`, `RuntimeConfig`, `ExperimentConfig`              |
//! | [`gae`]        | `discounted_cumsum`, GAE, `TrainBatch`                          |
//! | [`model`]      | `ActorCritic` trait, `LossCoefficients`, `LossReport`           |
//! | [`backend`]    | `InferenceBackend`, `TrainBackend` (burn `NdArray`)             |
//! | [`mlp`]        | `MlpActorCritic` on burn `Linear` layers                        |
//! | [`adam`]       | burn Adam with per-group learning rates                         |
//! | [`collective`] | `Collective` trait, `ChannelCollective`                         |
//! | [`checkpoint`] | `CheckpointStore`, `FsCheckpointStore`, `MemoryCheckpointStore` |
//! | [`observer`]   | `TrainObserver`, `IterationStats`                               |
//! | [`trainer`]    | `Trainer`, `launch`, `launch_with`, `EnvFactory`                |
//! | [`error`]      | `TrainError`, `TrainResult<T>`                                  |
//!
//! # Iteration
//!
//! ```text
//! broadcast parameters (startup / resume only)
//! loop:
//!   rollout (steps_per_epoch / workers per rank)
//!   GAE → all-reduce advantage moments → normalise
//!   for epoch in 0..epochs:
//!     gradient → all-reduce mean → Adam step
//!     KL(new) all-reduced; stop if > target_kl
//!   rank 0 checkpoints → barrier
//! ```
//!
//! Ranks are threads; the only cross-rank traffic goes through the
//! [`Collective`] endpoint each rank owns.

pub mod adam;
pub mod backend;
pub mod checkpoint;
pub mod collective;
pub mod config;
pub mod error;
pub mod gae;
pub mod mlp;
pub mod model;
pub mod observer;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use adam::{Adam, AdamState, ParamGroup};
pub use backend::{InferenceBackend, TrainBackend};
pub use checkpoint::{
    CheckpointStore, FsCheckpointStore, MemoryCheckpointStore, TrainingState, load_checkpoint_file,
};
pub use collective::{ChannelCollective, Collective};
pub use config::{ExperimentConfig, RuntimeConfig, TrainConfig};
pub use error::{TrainError, TrainResult};
pub use gae::{TrainBatch, advantages, discounted_cumsum};
pub use mlp::MlpActorCritic;
pub use model::{ActorCritic, LossCoefficients, LossReport};
pub use observer::{IterationStats, NoopTrainObserver, TrainObserver};
pub use trainer::{EnvFactory, TrainReport, Trainer, launch, launch_with};
