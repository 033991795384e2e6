use ix_core::{AgentId, IxError};
use ix_perception::PerceptionError;
use ix_schedule::ScheduleError;
use ix_track::TrackError;
use ix_vehicle::VehicleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("environment configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] IxError),

    #[error("track error: {0}")]
    Track(#[from] TrackError),

    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("vehicle error: {0}")]
    Vehicle(#[from] VehicleError),

    #[error("perception error: {0}")]
    Perception(#[from] PerceptionError),

    #[error("no action supplied for active agent {0}")]
    MissingAction(AgentId),

    #[error("agent {agent}: action index {index} is not in the action table")]
    InvalidAction { agent: AgentId, index: usize },

    #[error("action supplied for agent {0}, which is not active")]
    InactiveAgent(AgentId),

    #[error("more than one action supplied for agent {0}")]
    DuplicateAction(AgentId),

    #[error("episode is over; call reset")]
    EpisodeOver,

    #[error("environment has not been reset")]
    NotReset,
}

pub type SimResult<T> = Result<T, SimError>;
