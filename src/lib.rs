//! Langevin QMC - Monte Carlo sampling and trajectory analysis for
//! neural-network wavefunction optimization.
//!
//! This crate provides the statistical core of a deep-learning QMC training
//! loop: a Langevin Monte Carlo walker ensemble with Metropolis-Hastings
//! correction (`LangevinSampler`), burn-in/thinning trajectory collection,
//! and an outlier-robust exponentially-weighted estimator of the energy
//! trajectory with divergence detection (`EWMEstimator`). Wavefunctions plug
//! in through the `DriftWavefunction` boundary; training orchestration and
//! checkpointing live outside.

pub mod analysis;
pub mod conf;
pub mod error;
pub mod sampling;
pub mod walker;
pub mod wavefunction;

// Re-export commonly used types at crate root
pub use analysis::{
    stat_index, BlowupEpisode, Decay, EWMEstimator, StatSpec, StepRecord, N_STATS, STAT_TABLE,
};
pub use conf::{read_config, RunConfig, System};
pub use error::{Error, ForceError, ForceEvaluationError, Result};
pub use sampling::{
    keep_step, sample_trajectory, LangevinParams, LangevinSampler, Sample, StepTable, Thinned,
    Trajectory,
};
pub use walker::{Configuration, ProposedMove, StepInfo, WalkerState};
pub use wavefunction::{
    DriftWavefunction, EnergyCalculator, ForceBatch, GaussianModel, HydrogenLikeModel,
};

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::analysis::stats::{autocorrelation_time, blocking_error, mean};
    use crate::{
        sample_trajectory, DriftWavefunction, EWMEstimator, EnergyCalculator, GaussianModel,
        HydrogenLikeModel, LangevinParams, LangevinSampler,
    };

    fn sampler_for<W: DriftWavefunction + Copy>(
        wf: W,
        n_walkers: usize,
        params: LangevinParams,
    ) -> LangevinSampler<W> {
        let mut rng = StdRng::seed_from_u64(17);
        let rs = (0..n_walkers).map(|_| wf.initialize(&mut rng)).collect();
        LangevinSampler::new(wf, rs, params, 99).unwrap()
    }

    #[test]
    fn gaussian_pipeline_recovers_the_exact_energy() {
        // The Gaussian model's local energy is exactly 3α per electron, so
        // the estimator must converge to it regardless of sampling noise.
        let wf = GaussianModel { alpha: 0.5, n_electrons: 2 };
        let params = LangevinParams { tau: 0.1, n_first_certain: 3, ..Default::default() };
        let mut sampler = sampler_for(wf, 50, params);
        let mut estimator = EWMEstimator::new();
        let trajectory = sample_trajectory(&mut sampler, 60, 10, 0).unwrap();
        for batch in &trajectory.rs {
            let e_loc: Vec<f64> = batch.iter().map(|r| wf.local_energy(r)).collect();
            estimator.update(&e_loc);
        }
        let (energy, _) = estimator.energy().unwrap();
        assert_relative_eq!(energy, 3.0, epsilon = 1e-9);
        assert!(!estimator.blowup());
    }

    #[test]
    fn hydrogen_sampling_stays_near_the_ground_state_energy() {
        let wf = HydrogenLikeModel { z: 1.0, charge: 1.0, n_electrons: 1 };
        let params = LangevinParams {
            tau: 0.05,
            max_age: Some(20),
            n_first_certain: 3,
            psi_threshold: Some(1e-8),
        };
        let mut sampler = sampler_for(wf, 100, params);
        let trajectory = sample_trajectory(&mut sampler, 200, 50, 1).unwrap();
        assert_eq!(trajectory.n_samples(), 75);

        let step_means: Vec<f64> = trajectory
            .rs
            .iter()
            .map(|batch| mean(&batch.iter().map(|r| wf.local_energy(r)).collect::<Vec<_>>()))
            .collect();
        // E_L is exactly -1/2 for Z = charge = 1.
        assert_relative_eq!(mean(&step_means), -0.5, epsilon = 1e-9);
        let tau = autocorrelation_time(&step_means);
        assert!(tau >= 1.0);
        assert!(blocking_error(&step_means, tau) < 1e-9);
    }

    #[test]
    fn estimator_tracks_a_noisy_but_stable_trajectory_without_blowup() {
        let wf = GaussianModel { alpha: 0.3, n_electrons: 3 };
        let params = LangevinParams { tau: 0.2, max_age: Some(10), ..Default::default() };
        let mut sampler = sampler_for(wf, 30, params);
        let mut estimator = EWMEstimator::new();
        for _ in 0..80 {
            let (rs, psis, _) = sampler.advance().unwrap();
            assert_eq!(psis.len(), 30);
            let e_loc: Vec<f64> = rs.iter().map(|r| wf.local_energy(r)).collect();
            let record = estimator.update(&e_loc);
            assert!(!record.blowup);
        }
        assert_eq!(estimator.trajectory().len(), 80);
    }
}
