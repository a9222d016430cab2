use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use langevin_qmc::{
    keep_step, read_config, stat_index, DriftWavefunction, EWMEstimator, EnergyCalculator,
    GaussianModel, HydrogenLikeModel, LangevinSampler, Result, RunConfig, System,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.yml")]
    config: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = if std::path::Path::new(&args.config).exists() {
        read_config(&args.config)?
    } else {
        info!("{} not found, using the default run config", args.config);
        RunConfig::default()
    };

    match config.system {
        System::Gaussian { alpha, n_electrons } => {
            run(GaussianModel { alpha, n_electrons }, &config)
        }
        System::Hydrogen { z, charge, n_electrons } => {
            run(HydrogenLikeModel { z, charge, n_electrons }, &config)
        }
    }
}

fn run<W: DriftWavefunction + EnergyCalculator>(wf: W, config: &RunConfig) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let rs = (0..config.n_walkers).map(|_| wf.initialize(&mut rng)).collect();
    let mut sampler = LangevinSampler::with_rng(wf, rs, config.sampler, rng)?;
    let mut estimator = EWMEstimator::new();

    let mut acceptance_sum = 0.0;
    let mut n_kept = 0usize;
    let mut n_blowup = 0usize;
    for i in 0..config.n_steps {
        let (rs, _psis, info) = sampler.advance()?;
        if !keep_step(i, config.n_discard, config.n_decorrelate) {
            continue;
        }
        let e_loc: Vec<f64> = rs
            .iter()
            .map(|walker| sampler.wavefunction().local_energy(walker))
            .collect();
        let record = estimator.update(&e_loc);
        if record.blowup {
            n_blowup += 1;
            warn!("step {i}: training blowup reported, delta {:.3}", record.delta);
        }
        acceptance_sum += info.acceptance;
        n_kept += 1;
    }

    let outliers: u64 = estimator
        .trajectory()
        .iter()
        .map(|r| r.is_outlier[stat_index("med").unwrap_or(0)] as u64)
        .sum();
    println!("Langevin QMC sampling results");
    println!("-----------------------------");
    println!("Walkers:            {}", config.n_walkers);
    println!("Steps driven:       {}", config.n_steps);
    println!("Samples kept:       {n_kept}");
    if let Some((energy, err)) = estimator.energy() {
        println!("Energy:             {energy:.6} ± {err:.6} Ha");
    }
    println!(
        "Mean acceptance:    {:.3}",
        acceptance_sum / n_kept.max(1) as f64
    );
    println!("Outlier steps:      {outliers}");
    println!("Blowup steps:       {n_blowup}");
    Ok(())
}
