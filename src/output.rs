//! The module responsible for writing output data to disk.
use crate::agent::{AgentID, Store};
use crate::carrier::Carrier;
use crate::simulation::dispatch::CommittedDispatch;
use crate::simulation::prices::ClearingPrice;
use crate::simulation::{FailedPeriod, SimulationState};
use crate::trade::TradeRecord;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "lecsim_results";

/// The output file name for trade records
pub const TRADES_FILE_NAME: &str = "trades.csv";

/// The output file name for clearing prices
pub const CLEARING_PRICES_FILE_NAME: &str = "clearing_prices.csv";

/// The output file name for storage levels
pub const STORAGE_LEVELS_FILE_NAME: &str = "storage_levels.csv";

/// The output file name for heat held in building structures
pub const THERMAL_MASS_LEVELS_FILE_NAME: &str = "thermal_mass_levels.csv";

/// The output file name for periods which couldn't be solved
pub const FAILED_PERIODS_FILE_NAME: &str = "failed_periods.csv";

/// The output file name for the state at the end of the simulation
pub const FINAL_STATE_FILE_NAME: &str = "final_state.toml";

/// The output file name for agent balance duals
const AGENT_BALANCE_DUALS_FILE_NAME: &str = "debug_agent_balance_duals.csv";

/// The output file name for extra solver output values
const SOLVER_VALUES_FILE_NAME: &str = "debug_solver.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // The model name is the last component of the canonical model path
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, emptying it first if `overwrite` is set.
///
/// # Returns
///
/// Whether an existing non-empty folder was overwritten.
pub fn create_output_directory(output_dir: &Path, overwrite: bool) -> Result<bool> {
    let is_empty = || {
        fs::read_dir(output_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    };

    let overwritten = output_dir.exists() && !is_empty();
    if overwritten {
        ensure!(
            overwrite,
            "Output folder {} already exists and is not empty. Please delete the folder or pass \
            the --overwrite command-line option.",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwritten)
}

/// Represents a row in the storage levels CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageLevelRow {
    period: usize,
    datetime: NaiveDateTime,
    agent_id: AgentID,
    store: Store,
    level: f64,
}

/// Represents a row in the thermal mass levels CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ThermalMassLevelRow {
    period: usize,
    datetime: NaiveDateTime,
    agent_id: AgentID,
    shallow: f64,
    deep: f64,
}

/// Represents a row in the agent balance duals CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AgentBalanceDualsRow {
    period: usize,
    datetime: NaiveDateTime,
    agent_id: AgentID,
    carrier: Carrier,
    value: f64,
}

/// Represents a row in the debug solver values CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SolverValuesRow {
    period: usize,
    datetime: NaiveDateTime,
    objective_value: f64,
    max_balance_residual: f64,
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    agent_balance_duals_writer: csv::Writer<File>,
    solver_values_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            agent_balance_duals_writer: new_writer(AGENT_BALANCE_DUALS_FILE_NAME)?,
            solver_values_writer: new_writer(SOLVER_VALUES_FILE_NAME)?,
        })
    }

    /// Write all debug info for a committed period
    fn write_debug_info(&mut self, dispatch: &CommittedDispatch) -> Result<()> {
        let period = &dispatch.period;
        for (key, value) in &dispatch.agent_duals {
            let Some(agent_id) = &key.agent_id else {
                continue;
            };
            let row = AgentBalanceDualsRow {
                period: period.index,
                datetime: period.start,
                agent_id: agent_id.clone(),
                carrier: key.carrier,
                value: *value,
            };
            self.agent_balance_duals_writer.serialize(row)?;
        }

        self.solver_values_writer.serialize(SolverValuesRow {
            period: period.index,
            datetime: period.start,
            objective_value: dispatch.objective_value,
            max_balance_residual: dispatch.max_balance_residual(),
        })?;

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.agent_balance_duals_writer.flush()?;
        self.solver_values_writer.flush()?;

        Ok(())
    }
}

/// An object for writing simulation results to file
pub struct DataWriter {
    trades_writer: csv::Writer<File>,
    prices_writer: csv::Writer<File>,
    storage_writer: csv::Writer<File>,
    thermal_mass_writer: csv::Writer<File>,
    failed_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            trades_writer: new_writer(TRADES_FILE_NAME)?,
            prices_writer: new_writer(CLEARING_PRICES_FILE_NAME)?,
            storage_writer: new_writer(STORAGE_LEVELS_FILE_NAME)?,
            thermal_mass_writer: new_writer(THERMAL_MASS_LEVELS_FILE_NAME)?,
            failed_writer: new_writer(FAILED_PERIODS_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write trade records to a CSV file
    pub fn write_trades(&mut self, trades: &[TradeRecord]) -> Result<()> {
        for trade in trades {
            self.trades_writer.serialize(trade)?;
        }

        Ok(())
    }

    /// Write clearing prices to a CSV file
    pub fn write_clearing_prices(&mut self, prices: &[ClearingPrice]) -> Result<()> {
        for price in prices {
            self.prices_writer.serialize(price)?;
        }

        Ok(())
    }

    /// Write storage and thermal mass levels at the end of a committed period to CSV files
    pub fn write_storage_levels(&mut self, dispatch: &CommittedDispatch) -> Result<()> {
        for (agent_id, store, level) in dispatch.iter_storage_levels() {
            let row = StorageLevelRow {
                period: dispatch.period.index,
                datetime: dispatch.period.start,
                agent_id: agent_id.clone(),
                store,
                level,
            };
            self.storage_writer.serialize(row)?;
        }
        for (agent_id, levels) in dispatch.iter_thermal_mass_levels() {
            let row = ThermalMassLevelRow {
                period: dispatch.period.index,
                datetime: dispatch.period.start,
                agent_id: agent_id.clone(),
                shallow: levels.shallow,
                deep: levels.deep,
            };
            self.thermal_mass_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Record a period which couldn't be solved
    pub fn write_failed_period(&mut self, failure: &FailedPeriod) -> Result<()> {
        self.failed_writer.serialize(failure)?;

        Ok(())
    }

    /// Write debug information to CSV files
    pub fn write_debug_info(&mut self, dispatch: &CommittedDispatch) -> Result<()> {
        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_debug_info(dispatch)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.trades_writer.flush()?;
        self.prices_writer.flush()?;
        self.storage_writer.flush()?;
        self.thermal_mass_writer.flush()?;
        self.failed_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

/// Write the simulation state to the output folder in TOML format
pub fn write_final_state(output_path: &Path, state: &SimulationState) -> Result<()> {
    let file_path = output_path.join(FINAL_STATE_FILE_NAME);
    fs::write(&file_path, toml::to_string(state)?)?;

    Ok(())
}
