//! Workspace error type.
//!
//! Sub-crates define their own error enums and wrap `IxError` as one variant
//! via `#[from]`, so configuration failures surface unchanged at the top.

use thiserror::Error;

use crate::AgentId;

/// The top-level error type for `ix-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum IxError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported environment: {0}")]
    Unsupported(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for all `ix-*` crates.
pub type IxResult<T> = Result<T, IxError>;
