//! `ix-track` — static geometry of the signal-free intersection.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                     |
//! |------------|--------------------------------------------------------------|
//! | [`layout`] | `IntersectionLayout`, `Arm`, `Maneuver`                      |
//! | [`track`]  | `Track` — waypoints, arc-length interpolation, curvature     |
//! | [`zones`]  | `ZoneGrid` — square occupancy cells over the map             |
//! | [`set`]    | `TrackSet` (shared, read-only), `TrackSetBuilder`            |
//! | [`error`]  | `TrackError`, `TrackResult<T>`                               |
//!
//! # Map model
//!
//! ```text
//!                 North (1)
//!                  |  ↓ |
//!                  |  ↓ |
//!   West (2) ------+----+------ East (0)
//!                  | box|
//!   ---------------+----+---------------
//!                  |  ↑ |
//!                  |  ↑ |
//!                 South (3)
//! ```
//!
//! Four arms meet in a square box.  Traffic keeps right.  Every vehicle
//! follows one immutable [`Track`] from the outer end of its entry arm to the
//! outer end of its exit arm.  Collisions are defined on a square grid of
//! occupancy zones: two vehicles whose poses fall into the same zone in the
//! same step have collided.  Two tracks *conflict* when they come from
//! different arms and share a zone inside the box.

pub mod error;
pub mod layout;
pub mod set;
pub mod track;
pub mod zones;


pub use error::{TrackError, TrackResult};
pub use layout::{Arm, IntersectionLayout, Maneuver};
pub use set::{TrackSet, TrackSetBuilder};
pub use track::Track;
pub use zones::ZoneGrid;
