//! Run configuration for the demo binary, loaded from YAML.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sampling::LangevinParams;

/// Model system to sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum System {
    Gaussian { alpha: f64, n_electrons: usize },
    Hydrogen { z: f64, charge: f64, n_electrons: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub system: System,
    pub n_walkers: usize,
    pub seed: u64,
    pub sampler: LangevinParams,
    /// Total sampler steps to drive.
    pub n_steps: usize,
    /// Burn-in prefix discarded before collecting.
    pub n_discard: usize,
    /// Thinning stride between kept steps.
    pub n_decorrelate: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            system: System::Gaussian { alpha: 0.5, n_electrons: 2 },
            n_walkers: 100,
            seed: 0,
            sampler: LangevinParams::default(),
            n_steps: 1000,
            n_discard: 50,
            n_decorrelate: 0,
        }
    }
}

pub fn read_config(filename: &str) -> Result<RunConfig> {
    let file = std::fs::File::open(filename)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_yaml::from_reader(reader)?)
}

// example of yaml file
// system:
//   kind: gaussian
//   alpha: 0.5
//   n_electrons: 2
// n_walkers: 100
// seed: 0
// sampler:
//   tau: 0.1
//   max_age: 20
//   n_first_certain: 3
//   psi_threshold: null
// n_steps: 1000
// n_discard: 50
// n_decorrelate: 0

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip() {
        let config = RunConfig {
            sampler: LangevinParams { max_age: Some(20), ..Default::default() },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: RunConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn parses_an_explicit_document() {
        let yaml = "
system:
  kind: hydrogen
  z: 1.0
  charge: 1.0
  n_electrons: 1
n_walkers: 8
seed: 7
sampler:
  tau: 0.05
  max_age: null
  n_first_certain: 0
  psi_threshold: 0.001
n_steps: 100
n_discard: 10
n_decorrelate: 1
";
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.n_walkers, 8);
        assert_eq!(config.sampler.psi_threshold, Some(0.001));
        assert!(matches!(config.system, System::Hydrogen { .. }));
    }
}
