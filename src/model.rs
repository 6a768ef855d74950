//! The model: everything loaded from a model directory.
use crate::agent::{Agent, AgentID, AgentKind, AgentMap, Store, StorageUnit, ThermalMass};
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::data::ExogenousData;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{FailurePolicy, MODEL_FILE_NAME, ModelFile, SimulationParameters};

/// Model definition
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters for the simulation run
    pub parameters: SimulationParameters,
    /// Community-wide parameters
    pub area: AreaInfo,
    /// Agents in the community
    pub agents: AgentMap,
    /// Forecasts, spot prices and irradiation
    pub data: ExogenousData,
}

impl Model {
    /// Iterate over every store of every agent
    pub fn iter_storage(&self) -> impl Iterator<Item = (&AgentID, Store, &StorageUnit)> {
        self.agents.iter().flat_map(|(id, agent)| {
            agent
                .stores()
                .map(move |(store, storage)| (id, store, storage))
        })
    }

    /// Iterate over buildings which store heat in their structure
    pub fn iter_thermal_mass(&self) -> impl Iterator<Item = (&AgentID, &ThermalMass)> {
        self.agents
            .iter()
            .filter_map(|(id, agent)| agent.thermal_mass().map(|mass| (id, mass)))
    }

    /// Iterate over agents which are not grid connections
    pub fn iter_participants(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(|agent| !agent.is_grid())
    }

    /// The grid agent supplying `carrier`, if any
    pub fn grid_agent(&self, carrier: Carrier) -> Option<&Agent> {
        self.agents.values().find(
            |agent| matches!(&agent.kind, AgentKind::Grid(grid) if grid.carrier == carrier),
        )
    }

    /// The max import or export per hour for `carrier`, if there is a grid connection for it
    pub fn grid_transfer_rate(&self, carrier: Carrier) -> Option<f64> {
        self.grid_agent(carrier).and_then(|agent| match &agent.kind {
            AgentKind::Grid(grid) => Some(grid.transfer_rate),
            _ => None,
        })
    }

    /// Whether any agent has solar panels
    pub fn has_pv(&self) -> bool {
        self.agents.values().any(|agent| agent.pv().is_some())
    }
}
