//! Sampling module - Langevin Monte Carlo walker propagation.

mod langevin;
mod trajectory;

pub use langevin::{LangevinParams, LangevinSampler, Sample};
pub use trajectory::{keep_step, sample_trajectory, StepTable, Thinned, Trajectory};
