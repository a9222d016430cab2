//! Analysis module - robust running statistics over energy trajectories.

mod ewm;
pub mod stats;

pub use ewm::{
    stat_index, BlowupEpisode, Decay, EWMEstimator, StatSpec, StepRecord, N_STATS, STAT_TABLE,
};
