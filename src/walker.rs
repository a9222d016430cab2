//! Walker ensemble state for Langevin Monte Carlo.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Electron coordinates of a single walker (one 3-vector per electron).
pub type Configuration = Vec<Vector3<f64>>;

/// State of a fixed-size population of walkers.
///
/// `forces` and `psis` are always consistent with `rs`: they are recomputed
/// or merged together, never updated independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkerState {
    /// Electron positions, one configuration per walker.
    pub rs: Vec<Configuration>,
    /// Drift forces at `rs`, same shape.
    pub forces: Vec<Configuration>,
    /// Wavefunction amplitude at `rs`, one scalar per walker.
    pub psis: Vec<f64>,
    /// Steps since each walker last accepted a move.
    pub ages: Vec<u64>,
    /// Step counter since construction or last `restart`.
    pub step: u64,
}

/// A proposed batch move: new positions with their forces and amplitudes.
#[derive(Debug, Clone)]
pub struct ProposedMove {
    pub rs: Vec<Configuration>,
    pub forces: Vec<Configuration>,
    pub psis: Vec<f64>,
}

/// Per-step diagnostic record, produced once per `advance` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Fraction of walkers that accepted the proposed move, in [0, 1].
    pub acceptance: f64,
    /// Age of each walker after the step.
    pub ages: Vec<u64>,
}

impl WalkerState {
    pub fn n_walkers(&self) -> usize {
        self.rs.len()
    }

    pub fn n_electrons(&self) -> usize {
        self.rs.first().map_or(0, |c| c.len())
    }

    /// Merge a proposed move into the state: accepted walkers take the
    /// proposed positions/forces/amplitudes, rejected walkers are unchanged.
    pub fn merge_accepted(&mut self, proposal: ProposedMove, accepted: &[bool]) {
        debug_assert_eq!(accepted.len(), self.n_walkers());
        let ProposedMove { rs, forces, psis } = proposal;
        for (w, ((r, f), psi)) in rs.into_iter().zip(forces).zip(psis).enumerate() {
            if accepted[w] {
                self.rs[w] = r;
                self.forces[w] = f;
                self.psis[w] = psi;
            }
        }
    }
}
