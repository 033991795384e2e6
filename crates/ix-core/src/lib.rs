//! `ix-core` — foundational types for the signal-free intersection workspace.
//!
//! This crate is a dependency of every other `ix-*` crate.  It intentionally
//! has no `ix-*` dependencies and minimal external ones (`rand`, `thiserror`
//! and `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `TrackId`, `ZoneId`                        |
//! | [`geo`]         | `Point2`, `Pose`, `Segment`, ray and overlap tests    |
//! | [`time`]        | `Tick`                                                |
//! | [`rng`]         | `AgentRng` (per-agent), `SimRng` (episode-level)      |
//! | [`config`]      | `EnvKind`, `EnvConfig`, `ActorCriticConfig`           |
//! | [`error`]       | `IxError`, `IxResult`                                 |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{ActorCriticConfig, EnvConfig, EnvKind};
pub use error::{IxError, IxResult};
pub use geo::{Point2, Pose, Segment};
pub use ids::{AgentId, TrackId, ZoneId};
pub use rng::{AgentRng, SimRng};
pub use time::Tick;
