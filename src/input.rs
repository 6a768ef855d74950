//! Common routines for handling input data.
use crate::agent::{AgentID, AgentKind, Building};
use crate::carrier::Carrier;
use crate::error::ConfigurationError;
use crate::horizon::is_summer_month;
use crate::model::{Model, ModelFile};
use anyhow::{Context, Result, bail, ensure};
use chrono::Datelike;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod schema;
mod agent;
pub use agent::read_agents;
mod area;
pub use area::read_area_info;
mod data;
pub use data::read_exogenous_data;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }
    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file, returning an empty iterator if the file is absent.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    let vec = read_csv_internal(file_path)?;
    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read a model from the specified directory.
///
/// Any error is wrapped in a [`ConfigurationError`], as nothing can be simulated without a valid
/// model.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    load_model_files(model_dir).with_context(|| ConfigurationError {
        model_path: model_dir.to_path_buf(),
    })
}

fn load_model_files(model_dir: &Path) -> Result<Model> {
    let model_file = ModelFile::from_path(model_dir)?;
    let area = read_area_info(model_file.area_info)
        .with_context(|| input_err_msg(model_dir.join(crate::model::MODEL_FILE_NAME)))?;
    let agents = read_agents(model_dir, &area)?;
    let data = read_exogenous_data(model_dir, &agents, &area)?;

    let model = Model {
        model_path: model_dir.to_path_buf(),
        parameters: model_file.simulation,
        area,
        agents,
        data,
    };
    check_demand_can_be_met(&model)?;

    Ok(model)
}

/// Reject models with a demand that no combination of devices could ever cover
fn check_demand_can_be_met(model: &Model) -> Result<()> {
    let has_demand = |agent_id: &AgentID, carrier, summer_only: bool| {
        model
            .data
            .iter_consumption(agent_id, carrier)
            .any(|(dt, sample)| {
                sample.expected > 0.0 && (!summer_only || is_summer_month(dt.month()))
            })
    };
    let buildings = || {
        model.agents.values().filter_map(|agent| match &agent.kind {
            AgentKind::Building(building) => Some((&agent.id, building)),
            _ => None,
        })
    };

    let area = &model.area;
    let has_chiller = area.local_market_enabled && area.comp_chiller_max_input > 0.0;
    let has_cooling_heat_pump = buildings().any(|(_, building)| {
        building
            .heat_pump
            .is_some_and(|hp| hp.provides_cooling && hp.max_input > 0.0 && hp.max_output > 0.0)
    });
    ensure!(
        has_chiller
            || has_cooling_heat_pump
            || !model
                .agents
                .keys()
                .any(|id| has_demand(id, Carrier::Cooling, false)),
        "Agents have a cooling demand, but there is no way of producing cooling"
    );

    // In summer, heat pumps only deliver low-temperature heat
    let has_booster = |building: &Building| {
        building
            .booster_pump
            .is_some_and(|bp| bp.max_input > 0.0 && bp.max_output > 0.0)
    };
    let external_supply = model.grid_agent(Carrier::HighTempHeat).is_some()
        || model.agents.values().any(|agent| {
            matches!(&agent.kind, AgentKind::HeatProducer(producer)
                if producer.carrier == Carrier::HighTempHeat)
        });
    let shared_boosters =
        area.local_market_enabled && buildings().any(|(_, building)| has_booster(building));
    if external_supply || shared_boosters {
        return Ok(());
    }

    let problem_agents = buildings()
        .filter(|(id, building)| {
            !has_booster(building) && has_demand(id, Carrier::HighTempHeat, true)
        })
        .map(|(id, _)| id.to_string())
        .collect_vec();
    match problem_agents.as_slice() {
        [] => Ok(()),
        [agent] => bail!("Agent {agent} needs a booster heat pump for its summer hot water demand"),
        agents => bail!(
            "Agents {} need booster heat pumps for their summer hot water demand",
            agents.join(", ")
        ),
    }
}
