//! `ix-vehicle` — per-vehicle state and motion along a fixed track.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`status`]     | `AgentStatus` — the monotonic lifecycle state machine      |
//! | [`action`]     | `Action`, `LaneKeep`, `ActionTable` (index → command)      |
//! | [`params`]     | `VehicleParams` — body size, step length, speed limits     |
//! | [`state`]      | `VehicleState` — one vehicle's track, position, speed      |
//! | [`kinematics`] | `advance` — integrate one decision step along a track      |
//! | [`store`]      | `VehicleStore` — `Vec<VehicleState>` indexed by `AgentId`  |
//! | [`error`]      | `VehicleError`, `VehicleResult<T>`                         |
//!
//! # Lifecycle
//!
//! ```text
//! NotYetSpawned ──spawn──▶ Active ──┬──▶ ReachedGoal
//!                                   └──▶ Collided
//! ```
//!
//! Terminal states are final.  Every transition goes through
//! [`VehicleStore::transition`], which rejects anything else.

pub mod action;
pub mod error;
pub mod kinematics;
pub mod params;
pub mod state;
pub mod status;
pub mod store;


pub use action::{Action, ActionTable, LaneKeep};
pub use error::{VehicleError, VehicleResult};
pub use kinematics::advance;
pub use params::VehicleParams;
pub use state::VehicleState;
pub use status::AgentStatus;
pub use store::VehicleStore;
