//! Langevin Monte Carlo sampler with Metropolis-Hastings correction.
//!
//! Walkers are advanced by the Euler-Maruyama discretization of overdamped
//! Langevin dynamics driven by the drift force F = ∇ ln|Ψ|:
//!
//!   r' = r + F(r)·τ + √τ·ξ,   ξ ~ N(0, 1)
//!
//! and the proposal is accepted with the Metropolis-Hastings probability for
//! the target density |Ψ|², using the symmetrized Onsager-Machlup action
//! difference between the forward and reverse proposal densities:
//!
//!   ln(G(r|r')/G(r'|r)) = Σ_e (F + F')·((r - r') + τ/2·(F - F'))

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::ForceEvaluationError;
use crate::walker::{Configuration, ProposedMove, StepInfo, WalkerState};
use crate::wavefunction::{DriftWavefunction, ForceBatch};

/// One sampler iteration: positions, amplitudes and step diagnostics.
pub type Sample = (Vec<Configuration>, Vec<f64>, StepInfo);

/// Policy parameters for the Langevin sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LangevinParams {
    /// Langevin time step.
    pub tau: f64,
    /// Force-accept any walker whose age has reached this cap.
    pub max_age: Option<u64>,
    /// Accept unconditionally during the first n steps (warm-up).
    pub n_first_certain: u64,
    /// Force-accept moves that raise a sub-threshold amplitude
    /// (escape mechanism for walkers stuck near a node).
    pub psi_threshold: Option<f64>,
}

impl Default for LangevinParams {
    fn default() -> Self {
        Self {
            tau: 0.1,
            max_age: None,
            n_first_certain: 0,
            psi_threshold: None,
        }
    }
}

/// Langevin/Metropolis sampler owning a fixed-size walker ensemble.
pub struct LangevinSampler<W, R = StdRng> {
    wf: W,
    state: WalkerState,
    params: LangevinParams,
    rng: R,
}

impl<W: DriftWavefunction> LangevinSampler<W, StdRng> {
    /// Construct from an initial configuration batch with a seeded RNG.
    pub fn new(
        wf: W,
        rs: Vec<Configuration>,
        params: LangevinParams,
        seed: u64,
    ) -> Result<Self, ForceEvaluationError> {
        Self::with_rng(wf, rs, params, StdRng::seed_from_u64(seed))
    }
}

impl<W: DriftWavefunction, R: Rng> LangevinSampler<W, R> {
    /// Construct from an initial configuration batch, evaluating forces and
    /// amplitudes once up front.
    pub fn with_rng(
        wf: W,
        rs: Vec<Configuration>,
        params: LangevinParams,
        rng: R,
    ) -> Result<Self, ForceEvaluationError> {
        let n = rs.len();
        let mut sampler = Self {
            wf,
            state: WalkerState {
                rs,
                forces: Vec::new(),
                psis: Vec::new(),
                ages: vec![0; n],
                step: 0,
            },
            params,
            rng,
        };
        sampler.restart()?;
        Ok(sampler)
    }

    /// Resume from a snapshot without re-evaluating forces, so that stepping
    /// continues bit-for-bit identically to the run that produced it.
    pub fn from_snapshot(wf: W, state: WalkerState, params: LangevinParams, rng: R) -> Self {
        Self { wf, state, params, rng }
    }

    /// Clone the current ensemble state for checkpointing.
    pub fn snapshot(&self) -> WalkerState {
        self.state.clone()
    }

    pub fn state(&self) -> &WalkerState {
        &self.state
    }

    pub fn wavefunction(&self) -> &W {
        &self.wf
    }

    /// Number of walkers, invariant over the sampler's lifetime.
    pub fn len(&self) -> usize {
        self.state.n_walkers()
    }

    pub fn is_empty(&self) -> bool {
        self.state.n_walkers() == 0
    }

    /// Evaluate forces/amplitudes, attaching the offending configurations
    /// when a subset of walkers fails.
    fn qforce(&self, rs: &[Configuration]) -> Result<ForceBatch, ForceEvaluationError> {
        self.wf.evaluate_batch(rs).map_err(|e| ForceEvaluationError {
            configurations: e.failed.iter().map(|&i| rs[i].clone()).collect(),
            failed: e.failed,
        })
    }

    /// Euler-Maruyama proposal for every walker.
    fn walker_step(&mut self) -> Vec<Configuration> {
        let tau = self.params.tau;
        let width = tau.sqrt();
        let mut proposed = Vec::with_capacity(self.state.n_walkers());
        for (rs, forces) in self.state.rs.iter().zip(&self.state.forces) {
            let config = rs
                .iter()
                .zip(forces)
                .map(|(r, f)| {
                    let noise = nalgebra::Vector3::new(
                        self.rng.sample::<f64, _>(StandardNormal),
                        self.rng.sample::<f64, _>(StandardNormal),
                        self.rng.sample::<f64, _>(StandardNormal),
                    );
                    r + f * tau + width * noise
                })
                .collect();
            proposed.push(config);
        }
        proposed
    }

    /// Advance the ensemble by one Langevin/Metropolis step.
    ///
    /// Rejected walkers keep their position, force and amplitude; accepted
    /// walkers take the proposed ones. Ages reset on acceptance and
    /// increment otherwise.
    pub fn advance(&mut self) -> Result<Sample, ForceEvaluationError> {
        let tau = self.params.tau;
        let rs_new = self.walker_step();
        let ForceBatch { forces: forces_new, psis: psis_new } = self.qforce(&rs_new)?;

        let n = self.state.n_walkers();
        let mut accepted = vec![false; n];
        for w in 0..n {
            let mut log_g_ratio = 0.0;
            for e in 0..self.state.rs[w].len() {
                let f_old = self.state.forces[w][e];
                let f_new = forces_new[w][e];
                let dr = self.state.rs[w][e] - rs_new[w][e];
                log_g_ratio += (f_old + f_new).dot(&(dr + tau / 2.0 * (f_old - f_new)));
            }
            let p_acc = log_g_ratio.exp() * (psis_new[w] / self.state.psis[w]).powi(2);
            // The uniform is always drawn, so overrides below do not shift
            // the RNG stream.
            accepted[w] = p_acc > self.rng.gen::<f64>();
        }

        if let Some(threshold) = self.params.psi_threshold {
            for w in 0..n {
                let psi_old = self.state.psis[w].abs();
                let psi_new = psis_new[w].abs();
                accepted[w] = (accepted[w] && psi_new > threshold)
                    || (psi_old < threshold && psi_new > psi_old);
            }
        }
        if let Some(max_age) = self.params.max_age {
            for w in 0..n {
                if self.state.ages[w] >= max_age {
                    accepted[w] = true;
                }
            }
        }
        if self.state.step < self.params.n_first_certain {
            accepted.fill(true);
        }

        for (age, &acc) in self.state.ages.iter_mut().zip(&accepted) {
            *age = if acc { 0 } else { *age + 1 };
        }
        let n_accepted = accepted.iter().filter(|&&acc| acc).count();
        let info = StepInfo {
            acceptance: n_accepted as f64 / n as f64,
            ages: self.state.ages.clone(),
        };
        self.state.merge_accepted(
            ProposedMove { rs: rs_new, forces: forces_new, psis: psis_new },
            &accepted,
        );
        self.state.step += 1;
        debug!(
            "step {}: acceptance {:.3}, max age {}",
            self.state.step,
            info.acceptance,
            info.ages.iter().max().copied().unwrap_or(0)
        );
        Ok((self.state.rs.clone(), self.state.psis.clone(), info))
    }

    /// Reset the step counter and recompute forces, amplitudes and ages from
    /// the current positions, after an external resynchronization.
    pub fn restart(&mut self) -> Result<(), ForceEvaluationError> {
        self.state.step = 0;
        let ForceBatch { forces, psis } = self.qforce(&self.state.rs)?;
        self.state.forces = forces;
        self.state.psis = psis;
        self.state.ages = vec![0; self.state.n_walkers()];
        Ok(())
    }

    /// Move every walker unconditionally (no accept/reject), then restart.
    /// Decorrelates the ensemble quickly.
    pub fn propagate_all(&mut self) -> Result<(), ForceEvaluationError> {
        self.state.rs = self.walker_step();
        self.restart()
    }
}

impl<W: DriftWavefunction, R: Rng> Iterator for LangevinSampler<W, R> {
    type Item = Result<Sample, ForceEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.advance())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::walker::Configuration;
    use crate::wavefunction::{DriftWavefunction, GaussianModel};
    use super::*;

    fn initial_walkers(wf: &GaussianModel, n_walkers: usize, seed: u64) -> Vec<Configuration> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_walkers).map(|_| wf.initialize(&mut rng)).collect()
    }

    fn gaussian_sampler(params: LangevinParams) -> LangevinSampler<GaussianModel> {
        let wf = GaussianModel { alpha: 0.5, n_electrons: 2 };
        let rs = initial_walkers(&wf, 16, 7);
        LangevinSampler::new(wf, rs, params, 42).unwrap()
    }

    #[test]
    fn population_size_is_invariant() {
        let mut sampler = gaussian_sampler(LangevinParams::default());
        for _ in 0..50 {
            sampler.advance().unwrap();
            assert_eq!(sampler.len(), 16);
        }
    }

    #[test]
    fn acceptance_is_a_fraction() {
        let mut sampler = gaussian_sampler(LangevinParams { tau: 0.5, ..Default::default() });
        for _ in 0..50 {
            let (_, _, info) = sampler.advance().unwrap();
            assert!((0.0..=1.0).contains(&info.acceptance));
        }
    }

    #[test]
    fn first_certain_steps_accept_everything() {
        let params = LangevinParams { n_first_certain: 5, ..Default::default() };
        let mut sampler = gaussian_sampler(params);
        for step in 0..10 {
            let (_, _, info) = sampler.advance().unwrap();
            if step < 5 {
                assert_eq!(info.acceptance, 1.0);
                assert!(info.ages.iter().all(|&a| a == 0));
            }
        }
    }

    #[test]
    fn ages_never_exceed_max_age() {
        // A large tau makes rejections frequent enough to trigger the cap.
        let params = LangevinParams { tau: 2.0, max_age: Some(3), ..Default::default() };
        let mut sampler = gaussian_sampler(params);
        for _ in 0..200 {
            let (_, _, info) = sampler.advance().unwrap();
            assert!(info.ages.iter().all(|&a| a <= 3));
        }
    }

    #[test]
    fn rejected_walkers_keep_their_amplitude() {
        let mut sampler = gaussian_sampler(LangevinParams { tau: 2.0, ..Default::default() });
        for _ in 0..20 {
            let before = sampler.snapshot();
            let (_, psis, info) = sampler.advance().unwrap();
            for w in 0..sampler.len() {
                if info.ages[w] > 0 {
                    assert_eq!(psis[w], before.psis[w]);
                }
            }
        }
    }

    #[test]
    fn restart_zeroes_ages_and_step() {
        let params = LangevinParams { tau: 2.0, ..Default::default() };
        let mut sampler = gaussian_sampler(params);
        for _ in 0..20 {
            sampler.advance().unwrap();
        }
        sampler.restart().unwrap();
        let state = sampler.state();
        assert_eq!(state.step, 0);
        assert!(state.ages.iter().all(|&a| a == 0));
        assert_eq!(state.psis.len(), 16);
    }

    #[test]
    fn propagate_all_moves_every_walker() {
        let mut sampler = gaussian_sampler(LangevinParams::default());
        let before = sampler.snapshot();
        sampler.propagate_all().unwrap();
        let after = sampler.state();
        for w in 0..sampler.len() {
            assert_ne!(before.rs[w][0], after.rs[w][0]);
        }
        assert_eq!(after.step, 0);
    }

    #[test]
    fn snapshot_resume_is_bit_for_bit() {
        let params = LangevinParams { max_age: Some(10), ..Default::default() };
        let mut reference = gaussian_sampler(params);
        let mut interrupted = gaussian_sampler(params);

        for _ in 0..6 {
            reference.advance().unwrap();
            interrupted.advance().unwrap();
        }
        // Serialize the walker state, restore it into a fresh sampler that
        // shares the RNG stream, and continue.
        let yaml = serde_yaml::to_string(&interrupted.snapshot()).unwrap();
        let restored: WalkerState = serde_yaml::from_str(&yaml).unwrap();
        let mut resumed = LangevinSampler::from_snapshot(
            GaussianModel { alpha: 0.5, n_electrons: 2 },
            restored,
            params,
            interrupted.rng,
        );
        for _ in 0..6 {
            let (rs_ref, psis_ref, info_ref) = reference.advance().unwrap();
            let (rs_res, psis_res, info_res) = resumed.advance().unwrap();
            assert_eq!(rs_ref, rs_res);
            assert_eq!(psis_ref, psis_res);
            assert_eq!(info_ref, info_res);
        }
    }

    /// Fails on every walker whose first electron has gone past x = 0.
    struct HalfPlaneModel;

    impl DriftWavefunction for HalfPlaneModel {
        fn n_electrons(&self) -> usize {
            1
        }

        fn initialize<R: rand::Rng + ?Sized>(&self, _rng: &mut R) -> Configuration {
            vec![Vector3::new(-1.0, 0.0, 0.0)]
        }

        fn evaluate(&self, rs: &[Vector3<f64>]) -> Option<(Configuration, f64)> {
            if rs[0].x > 0.0 {
                None
            } else {
                Some((vec![Vector3::new(1.0, 0.0, 0.0)], 1.0))
            }
        }
    }

    #[test]
    fn force_failure_carries_offending_configurations() {
        // Strong positive drift pushes all walkers into the failing region.
        let rs = vec![vec![Vector3::new(-0.01, 0.0, 0.0)]; 4];
        let params = LangevinParams { tau: 1.0, ..Default::default() };
        let mut sampler = LangevinSampler::new(HalfPlaneModel, rs, params, 1).unwrap();
        let mut seen = None;
        for _ in 0..50 {
            match sampler.advance() {
                Ok(_) => continue,
                Err(e) => {
                    seen = Some(e);
                    break;
                }
            }
        }
        let err = seen.expect("drift must eventually cross into the failing region");
        assert!(!err.failed.is_empty());
        assert_eq!(err.failed.len(), err.configurations.len());
        for rs in &err.configurations {
            assert!(rs[0].x > 0.0);
        }
    }
}
