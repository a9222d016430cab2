//! Trajectory collection: burn-in, decorrelation thinning and stacking.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ForceEvaluationError;
use crate::walker::{Configuration, StepInfo};
use crate::wavefunction::DriftWavefunction;
use super::langevin::{LangevinSampler, Sample};

/// Whether step `i` survives burn-in and thinning.
pub fn keep_step(i: usize, n_discard: usize, n_decorrelate: usize) -> bool {
    i >= n_discard && i % (n_decorrelate + 1) == 0
}

/// Columnar per-step diagnostics over the kept window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepTable {
    pub steps: Vec<usize>,
    pub acceptance: Vec<f64>,
    pub age_mean: Vec<f64>,
    pub age_max: Vec<u64>,
}

impl StepTable {
    pub fn push(&mut self, step: usize, info: &StepInfo) {
        let n = info.ages.len().max(1) as f64;
        self.steps.push(step);
        self.acceptance.push(info.acceptance);
        self.age_mean.push(info.ages.iter().sum::<u64>() as f64 / n);
        self.age_max.push(info.ages.iter().max().copied().unwrap_or(0));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Kept samples stacked along a sample axis, plus their diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Kept positions, indexed `[sample][walker][electron]`.
    pub rs: Vec<Vec<Configuration>>,
    /// Kept amplitudes, indexed `[sample][walker]`.
    pub psis: Vec<Vec<f64>>,
    pub table: StepTable,
}

impl Trajectory {
    pub fn n_samples(&self) -> usize {
        self.rs.len()
    }
}

/// Drive the sampler for `steps` steps, keeping step `i` iff
/// `i >= n_discard` and `i % (n_decorrelate + 1) == 0`.
pub fn sample_trajectory<W: DriftWavefunction, R: Rng>(
    sampler: &mut LangevinSampler<W, R>,
    steps: usize,
    n_discard: usize,
    n_decorrelate: usize,
) -> Result<Trajectory, ForceEvaluationError> {
    let mut trajectory = Trajectory::default();
    for i in 0..steps {
        let (rs, psis, info) = sampler.advance()?;
        if keep_step(i, n_discard, n_decorrelate) {
            trajectory.table.push(i, &info);
            trajectory.rs.push(rs);
            trajectory.psis.push(psis);
        }
    }
    Ok(trajectory)
}

/// Lazy thinning adapter over a sampler iterator: skips the burn-in prefix,
/// keeps every `(n_decorrelate + 1)`-th step and stops after `n_samples`
/// kept samples. Finite and non-restartable.
pub struct Thinned<I> {
    inner: I,
    i: usize,
    yielded: usize,
    n_samples: usize,
    n_discard: usize,
    n_decorrelate: usize,
}

impl<I> Thinned<I> {
    pub fn new(inner: I, n_samples: usize, n_discard: usize, n_decorrelate: usize) -> Self {
        Self { inner, i: 0, yielded: 0, n_samples, n_discard, n_decorrelate }
    }
}

impl<I> Iterator for Thinned<I>
where
    I: Iterator<Item = Result<Sample, ForceEvaluationError>>,
{
    type Item = Result<Sample, ForceEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.yielded < self.n_samples {
            let item = self.inner.next()?;
            let i = self.i;
            self.i += 1;
            match item {
                Err(e) => return Some(Err(e)),
                Ok(sample) => {
                    if keep_step(i, self.n_discard, self.n_decorrelate) {
                        self.yielded += 1;
                        return Some(Ok(sample));
                    }
                }
            }
        }
        None
    }
}
