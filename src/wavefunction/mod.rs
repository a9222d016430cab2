//! Wavefunction boundary - drift force and amplitude evaluation.

mod models;
mod traits;

pub use models::{GaussianModel, HydrogenLikeModel};
pub use traits::{DriftWavefunction, EnergyCalculator, ForceBatch};
