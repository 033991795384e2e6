//! Error types for ix-train.

use std::path::PathBuf;

use ix_core::IxError;
use ix_rollout::RolloutError;
use ix_sim::SimError;
use ix_track::TrackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Core(#[from] IxError),

    #[error("track error: {0}")]
    Track(#[from] TrackError),

    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("rollout error: {0}")]
    Rollout(#[from] RolloutError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rank {rank} timed out waiting for round {round}")]
    CollectiveTimeout { rank: usize, round: u64 },

    #[error("rank {rank} lost its connection to rank {peer}")]
    PeerDisconnected { rank: usize, peer: usize },

    /// Ranks disagreed on a collective call: buffer length or round tag.
    #[error("collective mismatch on rank {rank}: {detail}")]
    CollectiveMismatch { rank: usize, detail: String },

    #[error("parameter vector has length {got}, model expects {expected}")]
    ParameterCount { expected: usize, got: usize },

    #[error("non-finite {0} during optimisation")]
    NonFinite(&'static str),

    /// Tensor backend or record failure.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("checkpoint {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("worker thread for rank {0} panicked")]
    WorkerPanicked(usize),
}

impl TrainError {
    /// Errors that only echo a failure on another rank.
    pub fn is_secondary(&self) -> bool {
        matches!(self, TrainError::PeerDisconnected { .. })
    }
}

pub type TrainResult<T> = Result<T, TrainError>;
