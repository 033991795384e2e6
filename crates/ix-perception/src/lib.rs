//! `ix-perception` — what a vehicle sees.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                |
//! |-----------------|---------------------------------------------------------|
//! | [`index`]       | `VehicleIndex` — R-tree over active vehicle positions   |
//! | [`lidar`]       | `Lidar`, `LidarConfig` — ray casting with Gaussian noise|
//! | [`history`]     | `HistoryBuffer` — last `history_len` lidar frames       |
//! | [`observation`] | `Observation`, `ObservationLayout`, ego features        |
//! | [`perceiver`]   | `Perceiver`, `WorldView` — one call per agent per step  |
//! | [`error`]       | `PerceptionError`, `PerceptionResult<T>`                |
//!
//! # Observation layout
//!
//! ```text
//! [ frame[t-h+1] (npoints) | … | frame[t] (npoints) | ego (5) ]
//! ```
//!
//! Frames are oldest first.  Until `history_len` frames exist, missing
//! leading frames are zeros.  Each lidar sample is `distance / max_range`
//! in `[0, 1]`, `1.0` meaning nothing within range.
//!
//! With `lidar_noise = 0` no random numbers are drawn, so two runs with the
//! same seed and actions give bit-identical observations.

pub mod error;
pub mod history;
pub mod index;
pub mod lidar;
pub mod observation;
pub mod perceiver;


pub use error::{PerceptionError, PerceptionResult};
pub use history::HistoryBuffer;
pub use index::VehicleIndex;
pub use lidar::{Lidar, LidarConfig};
pub use observation::{EGO_FEATURES, Observation, ObservationLayout};
pub use perceiver::{Perceiver, WorldView};
