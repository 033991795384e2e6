use ix_core::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("non-finite observation value for agent {agent} at index {index}")]
    NonFinite { agent: AgentId, index: usize },

    #[error("invalid lidar configuration: {0}")]
    Config(String),
}

pub type PerceptionResult<T> = Result<T, PerceptionError>;
