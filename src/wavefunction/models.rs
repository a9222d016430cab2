//! Closed-form model wavefunctions.
//!
//! These are not research ansätze: they exist so the sampler and estimator
//! can be exercised end to end against systems with known ground states.

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::walker::Configuration;
use super::traits::{DriftWavefunction, EnergyCalculator};

/// Product of isotropic Gaussians, Ψ(R) = exp(-α Σ_e |r_e|²).
///
/// Ground state of n independent 3D harmonic oscillators with ω = 2α,
/// so the local energy is exactly 3α per electron everywhere.
#[derive(Debug, Clone, Copy)]
pub struct GaussianModel {
    pub alpha: f64,
    pub n_electrons: usize,
}

impl DriftWavefunction for GaussianModel {
    fn n_electrons(&self) -> usize {
        self.n_electrons
    }

    fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration {
        // Draw from |Ψ|² directly: a Gaussian with σ = 1/(2√α).
        let sigma = 1.0 / (2.0 * self.alpha.sqrt());
        let normal = Normal::new(0.0, sigma).unwrap();
        (0..self.n_electrons)
            .map(|_| {
                Vector3::new(
                    normal.sample(rng),
                    normal.sample(rng),
                    normal.sample(rng),
                )
            })
            .collect()
    }

    fn evaluate(&self, rs: &[Vector3<f64>]) -> Option<(Configuration, f64)> {
        let forces: Configuration = rs.iter().map(|r| -2.0 * self.alpha * r).collect();
        let r2: f64 = rs.iter().map(|r| r.norm_squared()).sum();
        Some((forces, (-self.alpha * r2).exp()))
    }
}

impl EnergyCalculator for GaussianModel {
    fn local_energy(&self, positions: &[Vector3<f64>]) -> f64 {
        // KE: 3α - 2α²r² per electron; V = 2α²r² makes E_L constant.
        3.0 * self.alpha * positions.len() as f64
    }
}

/// Product of hydrogen-like 1s orbitals, Ψ(R) = Π_e exp(-Z |r_e|),
/// with independent electrons around a nucleus of charge `charge`.
#[derive(Debug, Clone, Copy)]
pub struct HydrogenLikeModel {
    /// Orbital exponent.
    pub z: f64,
    /// Nuclear charge in the local-energy Coulomb term.
    pub charge: f64,
    pub n_electrons: usize,
}

impl DriftWavefunction for HydrogenLikeModel {
    fn n_electrons(&self) -> usize {
        self.n_electrons
    }

    fn initialize<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration {
        let normal = Normal::new(0.0, 1.0 / self.z).unwrap();
        (0..self.n_electrons)
            .map(|_| {
                Vector3::new(
                    normal.sample(rng),
                    normal.sample(rng),
                    normal.sample(rng),
                )
            })
            .collect()
    }

    fn evaluate(&self, rs: &[Vector3<f64>]) -> Option<(Configuration, f64)> {
        let mut forces = Vec::with_capacity(rs.len());
        let mut log_psi = 0.0;
        for r in rs {
            let norm = r.norm();
            if norm == 0.0 {
                // Drift -Z r/|r| is undefined at the nucleus.
                return None;
            }
            forces.push(-self.z / norm * r);
            log_psi -= self.z * norm;
        }
        Some((forces, log_psi.exp()))
    }
}

impl EnergyCalculator for HydrogenLikeModel {
    fn local_energy(&self, positions: &[Vector3<f64>]) -> f64 {
        positions
            .iter()
            .map(|r| -0.5 * self.z * self.z + (self.z - self.charge) / r.norm())
            .sum()
    }
}
