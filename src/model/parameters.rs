//! Defines the `ModelFile` struct, which represents the contents of `model.toml`.
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

/// The name of the model file in the model directory
pub const MODEL_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_relax_end_charge_on_failure, bool, true);
define_param_default!(default_solver_time_limit, f64, 60.0);

/// What to do when a horizon can't be solved
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Eq, Default, Clone, Copy)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the last known good storage state
    #[default]
    #[string = "skip"]
    Skip,
    /// Stop the run with an error
    #[string = "abort"]
    Abort,
}

/// The `[simulation]` table of the model file
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SimulationParameters {
    /// The first simulated hour
    pub start: NaiveDateTime,
    /// Number of hours to simulate
    pub hours: usize,
    /// What to do when a horizon can't be solved
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Whether to retry a failed solve once without the end-of-horizon storage band
    #[serde(default = "default_relax_end_charge_on_failure")]
    pub relax_end_charge_on_failure: bool,
    /// Time limit for each horizon solve (seconds)
    #[serde(default = "default_solver_time_limit")]
    pub solver_time_limit: f64,
    /// Seed for the solver, which makes degenerate solutions reproducible
    #[serde(default)]
    pub random_seed: u32,
}

impl SimulationParameters {
    fn validate(&self) -> Result<()> {
        ensure!(self.hours > 0, "hours must be greater than zero");
        ensure!(
            self.solver_time_limit.is_finite() && self.solver_time_limit > 0.0,
            "solver_time_limit must be a finite number greater than zero"
        );
        ensure!(
            i32::try_from(self.random_seed).is_ok(),
            "random_seed must be at most {}",
            i32::MAX
        );

        Ok(())
    }
}

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelFile {
    /// Parameters for the simulation run
    pub simulation: SimulationParameters,
    /// The raw `[AreaInfo]` table, which is resolved against the parameter schema
    #[serde(rename = "AreaInfo", default)]
    pub area_info: toml::Table,
}

impl ModelFile {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelFile> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        let model_file: ModelFile = read_toml(&file_path)?;
        model_file
            .simulation
            .validate()
            .with_context(|| input_err_msg(&file_path))?;

        Ok(model_file)
    }
}
