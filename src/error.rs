use thiserror::Error;

use crate::basic::ecs::post_processing::PowerFlowResult;

/// Errors raised by the simulation core.
///
/// Validation errors surface before any solving begins. A non-converged power flow is
/// reported as [`SimError::SolverDivergence`] with the last iterate attached.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
    #[error(
        "power flow did not converge after {} iterations (max mismatch {:.3e} pu)",
        .0.iterations,
        .0.max_mismatch
    )]
    SolverDivergence(Box<PowerFlowResult>),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        SimError::InvalidInput(msg.into())
    }
    pub(crate) fn invalid_network(msg: impl Into<String>) -> Self {
        SimError::InvalidNetwork(msg.into())
    }

    /// Returns the non-converged power flow state when this is a divergence error.
    pub fn divergent_result(&self) -> Option<&PowerFlowResult> {
        match self {
            SimError::SolverDivergence(res) => Some(res),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
