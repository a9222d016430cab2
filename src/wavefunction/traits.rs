//! Wavefunction boundary traits for Langevin sampling.
//!
//! The sampler never looks inside a wavefunction: it only needs, for a batch
//! of walker configurations, the drift force F(R) = ∇ ln|Ψ(R)| and the
//! amplitude Ψ(R). Anything that can supply those (a neural ansatz, a
//! Slater-Jastrow product, a toy model) plugs in through `DriftWavefunction`.

use nalgebra::Vector3;
use rand::Rng;

use crate::error::ForceError;
use crate::walker::Configuration;

/// Drift forces and amplitudes for a batch of walkers.
#[derive(Debug, Clone)]
pub struct ForceBatch {
    /// One force per electron per walker, same shape as the input positions.
    pub forces: Vec<Configuration>,
    /// One amplitude per walker.
    pub psis: Vec<f64>,
}

/// A wavefunction that can supply drift forces for Langevin proposals.
pub trait DriftWavefunction {
    /// Number of electrons in a configuration.
    fn n_electrons(&self) -> usize;

    /// Draw an initial electron configuration.
    fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration;

    /// Evaluate `(drift force, amplitude)` at one configuration.
    ///
    /// Returns `None` when the evaluation fails numerically, e.g. a singular
    /// factorization of the underlying determinant.
    fn evaluate(&self, rs: &[Vector3<f64>]) -> Option<(Configuration, f64)>;

    /// Evaluate a whole walker batch, collecting the indices of any failed
    /// walkers into a single `ForceError`.
    fn evaluate_batch(&self, walkers: &[Configuration]) -> Result<ForceBatch, ForceError> {
        let mut forces = Vec::with_capacity(walkers.len());
        let mut psis = Vec::with_capacity(walkers.len());
        let mut failed = Vec::new();
        for (i, rs) in walkers.iter().enumerate() {
            match self.evaluate(rs) {
                Some((force, psi)) => {
                    forces.push(force);
                    psis.push(psi);
                }
                None => failed.push(i),
            }
        }
        if failed.is_empty() {
            Ok(ForceBatch { forces, psis })
        } else {
            Err(ForceError { failed })
        }
    }
}

/// Trait for computing local energy from electron positions.
pub trait EnergyCalculator {
    fn local_energy(&self, positions: &[Vector3<f64>]) -> f64;
}
