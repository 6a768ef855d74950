//! Independent replications of the simulation with noisy consumption.
//!
//! Each replication runs on its own thread and loads its own copy of the model, so no state is
//! shared between them.
use super::observe::NoisyObservations;
use super::{RunOptions, run_with_observer};
use crate::input::load_model;
use crate::output::create_output_directory;
use anyhow::{Context, Result, anyhow};
use log::info;
use std::path::{Path, PathBuf};
use std::thread;

/// The output folder for a replication
pub fn replication_output_path(output_path: &Path, replication: usize) -> PathBuf {
    output_path.join(format!("replication_{replication}"))
}

/// The seed for a replication's consumption noise
pub fn replication_seed(base_seed: u64, replication: usize) -> u64 {
    base_seed.wrapping_add(replication as u64)
}

/// Run `count` replications of the model in parallel.
///
/// # Arguments
///
/// * `model_path` - Path to the model directory
/// * `output_path` - Folder under which each replication gets its own subfolder
/// * `count` - Number of replications
/// * `base_seed` - Seed for the first replication; later replications add their index
/// * `options` - Options for each run
pub fn run_replications(
    model_path: &Path,
    output_path: &Path,
    count: usize,
    base_seed: u64,
    options: RunOptions,
) -> Result<()> {
    info!("Running {count} replications with base seed {base_seed}");
    let results: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..count)
            .map(|replication| {
                scope.spawn(move || {
                    run_replication(model_path, output_path, replication, base_seed, options)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(replication, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("Replication {replication} panicked")))
            })
            .collect()
    });

    for (replication, result) in results.into_iter().enumerate() {
        result.with_context(|| format!("Replication {replication} failed"))?;
    }
    info!("All {count} replications finished");

    Ok(())
}

fn run_replication(
    model_path: &Path,
    output_path: &Path,
    replication: usize,
    base_seed: u64,
    options: RunOptions,
) -> Result<()> {
    let output_path = replication_output_path(output_path, replication);
    create_output_directory(&output_path, true)?;

    let model = load_model(model_path)?;
    let mut observer = NoisyObservations::new(replication_seed(base_seed, replication));
    run_with_observer(&model, &output_path, options, &mut observer)?;
    info!("Replication {replication} finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replication_paths_and_seeds() {
        let path = replication_output_path(Path::new("results"), 3);
        assert_eq!(path, Path::new("results").join("replication_3"));
        assert_eq!(replication_seed(10, 3), 13);
        assert_eq!(replication_seed(u64::MAX, 1), 0);
    }
}
