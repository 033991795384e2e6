use ix_core::AgentId;
use ix_sim::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("policy produced a non-finite {what} for agent {agent}")]
    NonFinite { agent: AgentId, what: &'static str },

    #[error("policy returned {got} outputs for {expected} inputs")]
    PolicyOutput { expected: usize, got: usize },
}

pub type RolloutResult<T> = Result<T, RolloutError>;
