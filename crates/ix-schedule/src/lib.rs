//! `ix-schedule` — who enters the map, where, and when.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`schedule`] | `SpawnPlan`, `SpawnSchedule` (balanced / biased generation)|
//! | [`queue`]    | `SpawnQueue` (`BTreeMap<Tick, Vec<AgentId>>`)              |
//! | [`error`]    | `ScheduleError`, `ScheduleResult<T>`                       |
//!
//! # Pockets
//!
//! Every vehicle enters at the outer end of one of the four arms.  An arm
//! seen as a spawn location is a *pocket*.  A schedule assigns each agent a
//! pocket, a track leaving that pocket, and the tick at which it becomes due.
//! Due agents wait in the [`SpawnQueue`]; the step engine admits them once
//! their entry zone is clear.

pub mod error;
pub mod queue;
pub mod schedule;


pub use error::{ScheduleError, ScheduleResult};
pub use queue::SpawnQueue;
pub use schedule::{SpawnPlan, SpawnSchedule};
