//! intersection — train vehicles to cross a signal-free intersection.
//!
//! ```text
//! intersection experiments/four_way.toml
//! ```
//!
//! Re-running the same experiment file resumes from the newest checkpoint
//! under `runtime.checkpoint_dir/<experiment_id>/` and appends to the CSV
//! files under `runtime.output_dir/<experiment_id>/`.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ix_output::{CsvWriter, ProgressObserver};
use ix_train::{ExperimentConfig, FsCheckpointStore, launch};

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: intersection <experiment.toml | experiment.json>")?;
    let config = ExperimentConfig::load(Path::new(&path))
        .with_context(|| format!("loading experiment file {path}"))?;
    config.validate().context("invalid experiment")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.runtime.log_filter)?)
        .init();

    if config.runtime.num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.runtime.num_threads)
            .build_global()?;
    }

    let train = &config.train;
    let store = FsCheckpointStore::new(&config.runtime.checkpoint_dir);
    let out_dir = config.runtime.output_dir.join(&train.experiment_id);
    let mut obs = ProgressObserver::new(CsvWriter::append(&out_dir)?);

    info!(
        experiment = %train.experiment_id,
        env = %config.env_kind,
        nagents = config.env.nagents,
        workers = train.workers,
        "starting"
    );

    let t0 = Instant::now();
    let reports = launch(&config, &store, &mut obs)?;
    let elapsed = t0.elapsed();

    if let Some(e) = obs.take_error() {
        eprintln!("output error: {e}");
    }

    let Some(root) = reports.first() else {
        anyhow::bail!("training returned no reports");
    };
    println!("Training complete in {:.1} s", elapsed.as_secs_f64());
    println!("  iterations run : {}", root.iterations_run);
    println!("  final iteration: {}", root.final_iteration);
    if let Some(from) = root.resumed_from {
        println!("  resumed from   : {from}");
    }
    if let Some(last) = &root.last {
        match last.mean_return {
            Some(r) => println!("  mean return    : {r:.3}"),
            None => println!("  mean return    : n/a"),
        }
        println!("  success rate   : {:.3}", last.success_rate());
    }
    println!("  checkpoints    : {}", store.root().join(&train.experiment_id).display());
    println!("  output         : {}", out_dir.display());
    Ok(())
}
