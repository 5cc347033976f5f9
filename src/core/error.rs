//! Error types for sigma options

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigmaError {
    /// Valuation inputs outside the model domain (t <= 0, sigma <= 0,
    /// price outside no-arbitrage bounds, ...)
    #[error("Domain error: {0}")]
    Domain(String),

    /// An iterative solver ran out of iterations
    #[error("Convergence failure: {0}")]
    Convergence(String),

    /// The hedge model has no feasible solution
    #[error("Infeasible model: {0}")]
    InfeasibleModel(String),

    /// The LP/MIP backend reported an internal failure
    #[error("Solver fault: {0}")]
    SolverFault(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation called out of order on a stateful component
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type SigmaResult<T> = Result<T, SigmaError>;

impl SigmaError {
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn convergence(msg: impl Into<String>) -> Self {
        Self::Convergence(msg.into())
    }

    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::InfeasibleModel(msg.into())
    }

    pub fn solver_fault(msg: impl Into<String>) -> Self {
        Self::SolverFault(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

impl From<serde_json::Error> for SigmaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
