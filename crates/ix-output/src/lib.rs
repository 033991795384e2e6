//! `ix-output` — training output writers.
//!
//! | Module       | Contents                                   |
//! |--------------|--------------------------------------------|
//! | [`row`]      | `ProgressRow`, `EpisodeRow`                |
//! | [`writer`]   | `OutputWriter` trait                       |
//! | [`csv`]      | `CsvWriter` (`progress.csv`, `episodes.csv`) |
//! | [`observer`] | `ProgressObserver<W>`                      |
//! | [`error`]    | `OutputError`, `OutputResult<T>`           |
//!
//! # Usage
//!
//! ```rust,ignore
//! use ix_output::{CsvWriter, ProgressObserver};
//!
//! let writer = CsvWriter::append(Path::new("./output"))?;
//! let mut obs = ProgressObserver::new(writer);
//! ix_train::launch(&config, &store, &mut obs)?;
//! obs.take_error().map(|e| eprintln!("output error: {e}"));
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::ProgressObserver;
pub use row::{EpisodeRow, ProgressRow};
pub use writer::OutputWriter;
