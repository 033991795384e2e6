use ix_core::AgentId;
use thiserror::Error;

use crate::AgentStatus;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("agent {agent}: illegal status transition {from:?} -> {to:?}")]
    IllegalTransition {
        agent: AgentId,
        from:  AgentStatus,
        to:    AgentStatus,
    },

    #[error("action index {index} out of range (table has {len} entries)")]
    UnknownAction { index: usize, len: usize },

    #[error("agent {0} not found")]
    AgentNotFound(AgentId),
}

pub type VehicleResult<T> = Result<T, VehicleError>;
