//! Error type shared by every stage of the solve pipeline.

use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Debug, Error)]
pub enum SolverError {
    /// Rejected before any numerical work was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The restarted Arnoldi iteration ran out of its restart budget.
    #[error(
        "eigensolver did not converge after {restarts} restarts ({converged}/{requested} eigenpairs within tolerance)"
    )]
    ConvergenceFailure {
        restarts: usize,
        converged: usize,
        requested: usize,
    },

    /// A cache record exists but does not decode into the expected shapes.
    #[error("cache record corrupt: {0}")]
    CacheCorruption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SolverError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CacheCorruption(msg.into())
    }
}
