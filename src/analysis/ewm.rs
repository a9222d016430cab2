//! Exponentially-weighted trajectory statistics with outlier rejection and
//! divergence ("blowup") detection.
//!
//! Each training step produces a batch of noisy per-walker local energies.
//! The estimator condenses the batch into a fixed vector of 23 tracked
//! statistics (median, ±1/2/3-sigma percentiles, and raw/log-clipped mean
//! variants under two decay regimes), maintains a running exponentially
//! weighted mean/variance/error for each, freezes the running estimates when
//! a statistic jumps outside its outlier gate, and promotes a sustained
//! excursion of the percentile band to a reported blowup. Blowup is data,
//! not an error: the training driver decides whether to rewind.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::stats::{log_clip, mean, percentile_of_sorted};

/// Number of tracked statistics.
pub const N_STATS: usize = 23;

/// Percentile points: median, then ±68/95/99.7 bands.
const PERCENTILES: [f64; 7] = [50.0, 16.0, 84.0, 2.5, 97.5, 0.15, 99.85];

/// Index of the reference mean (`mean3`) used for blowup deviation.
const BLOWUP_REF: usize = 8;
/// Index of the mean (`mean5`) frozen as the episode baseline.
const BLOWUP_BASELINE: usize = 9;
/// The percentile-band statistics polled for the blowup quorum, together
/// with `BLOWUP_REF`.
const BLOWUP_BAND: std::ops::Range<usize> = 1..7;
/// Simultaneous outliers required to open an episode.
const BLOWUP_QUORUM: usize = 6;
/// Steps without outlier evidence after which an episode is stale.
const BLOWUP_TIMEOUT: u64 = 50;
/// Normalized deviation from the baseline that confirms a blowup.
const BLOWUP_THRESHOLD: f64 = 0.5;
/// Updates before outlier gating and log-clipping switch on.
const WARMUP: u64 = 5;

/// Decay regime of a tracked statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decay {
    /// Long memory, ceiling 0.96.
    Primary,
    /// Short memory, ceiling 0.80.
    Fast,
}

impl Decay {
    fn cap(self) -> f64 {
        match self {
            Decay::Primary => 0.96,
            Decay::Fast => 0.80,
        }
    }

    /// Step-dependent decay coefficient: adapts fast early, stabilizes late.
    fn coefficient(self, step: u64) -> f64 {
        self.cap().min(1.0 - 1.0 / (2.0 + step as f64 / 10.0))
    }
}

/// Static description of one tracked statistic.
#[derive(Debug, Clone, Copy)]
pub struct StatSpec {
    pub label: &'static str,
    /// Outlier gate in units of the running standard deviation;
    /// infinity means the statistic is never flagged.
    pub threshold: f64,
    pub decay: Decay,
}

const INF: f64 = f64::INFINITY;

/// Index-addressed table of the tracked statistics. Order is load-bearing:
/// 0..7 percentiles, 7..15 primary-decay means, 15..23 fast-decay means,
/// with the `*c` variants computed from log-clipped energies.
pub const STAT_TABLE: [StatSpec; N_STATS] = [
    StatSpec { label: "med", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "-1s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "+1s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "-2s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "+2s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "-3s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "+3s", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "mean2", threshold: 2.0, decay: Decay::Primary },
    StatSpec { label: "mean3", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "mean5", threshold: 5.0, decay: Decay::Primary },
    StatSpec { label: "mean", threshold: INF, decay: Decay::Primary },
    StatSpec { label: "meanc2", threshold: 2.0, decay: Decay::Primary },
    StatSpec { label: "meanc3", threshold: 3.0, decay: Decay::Primary },
    StatSpec { label: "meanc5", threshold: 5.0, decay: Decay::Primary },
    StatSpec { label: "meanc", threshold: INF, decay: Decay::Primary },
    StatSpec { label: "fmean2", threshold: 2.0, decay: Decay::Fast },
    StatSpec { label: "fmean3", threshold: 3.0, decay: Decay::Fast },
    StatSpec { label: "fmean5", threshold: 5.0, decay: Decay::Fast },
    StatSpec { label: "fmean", threshold: INF, decay: Decay::Fast },
    StatSpec { label: "fmeanc2", threshold: 2.0, decay: Decay::Fast },
    StatSpec { label: "fmeanc3", threshold: 3.0, decay: Decay::Fast },
    StatSpec { label: "fmeanc5", threshold: 5.0, decay: Decay::Fast },
    StatSpec { label: "fmeanc", threshold: INF, decay: Decay::Fast },
];

/// Index of a tracked statistic by label.
pub fn stat_index(label: &str) -> Option<usize> {
    STAT_TABLE.iter().position(|spec| spec.label == label)
}

/// A suspected divergence episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlowupEpisode {
    Idle,
    Active {
        /// Step of the most recent quorum of simultaneous outliers.
        last_seen: u64,
        /// Running `mean5` at episode start.
        baseline: f64,
        /// Current normalized deviation of `mean3` from the baseline.
        delta: f64,
        /// Deviation accumulated over the episode.
        accum_delta: f64,
    },
}

/// One row of the output trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u64,
    pub stat: [f64; N_STATS],
    pub ewm_mean: [f64; N_STATS],
    pub ewm_std: [f64; N_STATS],
    pub ewm_err: [f64; N_STATS],
    pub is_outlier: [bool; N_STATS],
    pub n_outlier: [u64; N_STATS],
    pub blowup_candidate: bool,
    pub blowup: bool,
    pub delta: f64,
    pub accum_delta: f64,
}

/// Outlier-robust exponentially-weighted estimator of an energy trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EWMEstimator {
    step: u64,
    mean: [f64; N_STATS],
    var: [f64; N_STATS],
    err: [f64; N_STATS],
    is_outlier: [bool; N_STATS],
    n_outlier: [u64; N_STATS],
    episode: BlowupEpisode,
    trajectory: Vec<StepRecord>,
}

impl Default for EWMEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EWMEstimator {
    pub fn new() -> Self {
        Self {
            step: 0,
            mean: [0.0; N_STATS],
            var: [0.0; N_STATS],
            err: [0.0; N_STATS],
            is_outlier: [false; N_STATS],
            n_outlier: [0; N_STATS],
            episode: BlowupEpisode::Idle,
            trajectory: Vec::new(),
        }
    }

    /// Consume one step's batch of per-walker local energies.
    pub fn update(&mut self, e_loc: &[f64]) -> &StepRecord {
        let stat = self.statistic_vector(e_loc);
        self.update_vector(stat)
    }

    /// Condense a raw energy batch into the tracked statistic vector.
    fn statistic_vector(&self, e_loc: &[f64]) -> [f64; N_STATS] {
        let mut sorted = e_loc.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mut stat = [0.0; N_STATS];
        for (k, &p) in PERCENTILES.iter().enumerate() {
            stat[k] = percentile_of_sorted(&sorted, p);
        }
        let raw_mean = mean(e_loc);
        let clipped_mean = if self.step > WARMUP {
            // Clip against the previous running median and ±3-sigma band.
            let (clipped, (n_below, n_above)) =
                log_clip(e_loc, self.mean[0], self.mean[5], self.mean[6]);
            if n_below + n_above > 0 {
                debug!("step {}: log-clipped {} energies", self.step, n_below + n_above);
            }
            mean(&clipped)
        } else {
            raw_mean
        };
        stat[7..11].fill(raw_mean);
        stat[11..15].fill(clipped_mean);
        stat[15..19].fill(raw_mean);
        stat[19..23].fill(clipped_mean);
        stat
    }

    /// Core EWM update on an already-condensed statistic vector.
    pub fn update_vector(&mut self, stat: [f64; N_STATS]) -> &StepRecord {
        let i = self.step;
        if i == 0 {
            // First observation: every statistic becomes its own mean.
            self.mean = stat;
        } else {
            if i > WARMUP {
                for j in 0..N_STATS {
                    self.is_outlier[j] = (stat[j] - self.mean[j]).abs()
                        > STAT_TABLE[j].threshold * self.var[j].sqrt();
                }
            }
            for j in 0..N_STATS {
                if self.is_outlier[j] {
                    // Frozen: outlier values never contaminate the running
                    // estimates, but the streak is counted.
                    self.n_outlier[j] += 1;
                } else {
                    let a = STAT_TABLE[j].decay.coefficient(i);
                    let var_new = (1.0 - a) * (stat[j] - self.mean[j]).powi(2) + a * self.var[j];
                    let err_new = (1.0 - a).powi(2) * self.var[j] + a * a * self.err[j];
                    self.mean[j] = (1.0 - a) * stat[j] + a * self.mean[j];
                    self.var[j] = var_new;
                    self.err[j] = err_new;
                    self.n_outlier[j] = 0;
                }
            }
        }

        let n_band = BLOWUP_BAND
            .map(|j| self.is_outlier[j] as usize)
            .sum::<usize>()
            + self.is_outlier[BLOWUP_REF] as usize;
        let blowup_candidate = n_band >= BLOWUP_QUORUM;
        if blowup_candidate {
            match &mut self.episode {
                BlowupEpisode::Idle => {
                    debug!("step {i}: blowup episode opened");
                    self.episode = BlowupEpisode::Active {
                        last_seen: i,
                        baseline: self.mean[BLOWUP_BASELINE],
                        delta: 0.0,
                        accum_delta: 0.0,
                    };
                }
                BlowupEpisode::Active { last_seen, .. } => *last_seen = i,
            }
        }
        if let BlowupEpisode::Active { last_seen, .. } = &self.episode {
            if i - last_seen > BLOWUP_TIMEOUT {
                debug!("step {i}: blowup episode timed out");
                self.episode = BlowupEpisode::Idle;
            }
        }
        let (delta, accum_delta, blowup) = match &mut self.episode {
            BlowupEpisode::Idle => (0.0, 0.0, false),
            BlowupEpisode::Active { baseline, delta, accum_delta, .. } => {
                *delta = (self.mean[BLOWUP_REF] - *baseline) / self.var[BLOWUP_REF].sqrt();
                *accum_delta += *delta;
                (*delta, *accum_delta, *delta > BLOWUP_THRESHOLD)
            }
        };
        if blowup {
            warn!("step {i}: blowup detected, delta {delta:.3}");
        }

        let mut ewm_std = [0.0; N_STATS];
        let mut ewm_err = [0.0; N_STATS];
        for j in 0..N_STATS {
            ewm_std[j] = self.var[j].sqrt();
            ewm_err[j] = self.err[j].sqrt();
        }
        self.trajectory.push(StepRecord {
            step: i,
            stat,
            ewm_mean: self.mean,
            ewm_std,
            ewm_err,
            is_outlier: self.is_outlier,
            n_outlier: self.n_outlier,
            blowup_candidate,
            blowup,
            delta,
            accum_delta,
        });
        self.step += 1;
        self.trajectory.last().expect("record just pushed")
    }

    /// Number of updates consumed so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn running_mean(&self) -> &[f64; N_STATS] {
        &self.mean
    }

    pub fn running_var(&self) -> &[f64; N_STATS] {
        &self.var
    }

    pub fn outlier_flags(&self) -> &[bool; N_STATS] {
        &self.is_outlier
    }

    pub fn episode(&self) -> &BlowupEpisode {
        &self.episode
    }

    /// Whether the most recent step was reported as a blowup.
    pub fn blowup(&self) -> bool {
        self.trajectory.last().is_some_and(|r| r.blowup)
    }

    /// The append-only trajectory of per-step records.
    pub fn trajectory(&self) -> &[StepRecord] {
        &self.trajectory
    }

    /// Running estimate of the energy: the unclipped `mean` statistic with
    /// its error, once at least one step has been consumed.
    pub fn energy(&self) -> Option<(f64, f64)> {
        if self.trajectory.is_empty() {
            return None;
        }
        let j = stat_index("mean").expect("mean is in the table");
        Some((self.mean[j], self.err[j].sqrt()))
    }
}
