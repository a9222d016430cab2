//! Error types for sampling and configuration.

use nalgebra::Vector3;
use thiserror::Error;

/// Raised by a wavefunction when the drift force cannot be evaluated for a
/// subset of walkers (e.g. a singular Slater-matrix factorization).
#[derive(Debug, Clone, Error)]
#[error("force evaluation failed for {} walker(s)", .failed.len())]
pub struct ForceError {
    /// Batch indices of the walkers that failed.
    pub failed: Vec<usize>,
}

/// A `ForceError` enriched by the sampler with the offending walker
/// configurations, for post-mortem inspection by the caller.
#[derive(Debug, Clone, Error)]
#[error("force evaluation failed for walkers {failed:?}")]
pub struct ForceEvaluationError {
    pub failed: Vec<usize>,
    /// Electron coordinates of the failed walkers, in `failed` order.
    pub configurations: Vec<Vec<Vector3<f64>>>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Force(#[from] ForceEvaluationError),
    #[error("config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
