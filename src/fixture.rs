//! Fixtures for tests

use crate::agent::{
    Agent, AgentKind, AgentMap, BoosterPump, Building, GridConnection, HeatPump,
    PhotovoltaicArray, StorageUnit,
};
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::data::ExogenousData;
use crate::input::read_area_info;
use crate::model::{FailurePolicy, Model, SimulationParameters};
use crate::simulation::optimisation::SolverOptions;
use chrono::{NaiveDate, NaiveDateTime};
use rstest::fixture;
use std::path::PathBuf;
use toml::Table;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {{
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    }};
}
pub(crate) use assert_error;

/// An hour in 2019
pub fn datetime(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, month, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .unwrap()
}

#[fixture]
pub fn area_info() -> AreaInfo {
    read_area_info(Table::new()).unwrap()
}

#[fixture]
pub fn storage_unit() -> StorageUnit {
    StorageUnit {
        carrier: Carrier::Electricity,
        capacity: 1000.0,
        charge_rate: 0.4,
        discharge_rate: 0.4,
        round_trip_efficiency: 0.93,
        initial_charge_level: 0.5,
        buy_price_percentile: None,
        sell_price_percentile: None,
    }
}

#[fixture]
pub fn storage_agent(storage_unit: StorageUnit) -> Agent {
    Agent {
        id: "Storage".into(),
        kind: AgentKind::Storage(storage_unit),
    }
}

#[fixture]
pub fn building() -> Agent {
    Agent {
        id: "Building".into(),
        kind: AgentKind::Building(Building {
            floor_area: 1000.0,
            pv: Some(PhotovoltaicArray {
                area: 100.0,
                efficiency: 0.2,
            }),
            heat_pump: Some(HeatPump {
                max_input: 10.0,
                max_output: 30.0,
                provides_cooling: false,
            }),
            booster_pump: Some(BoosterPump {
                max_input: 2.0,
                max_output: 9.0,
            }),
            battery: None,
            thermal_mass: None,
            accumulator_tank: None,
        }),
    }
}

fn grid(id: &str, carrier: Carrier) -> Agent {
    Agent {
        id: id.into(),
        kind: AgentKind::Grid(GridConnection {
            carrier,
            transfer_rate: 1000.0,
        }),
    }
}

/// A model with one building and grid connections for electricity and high-temperature heat.
///
/// The model has no exogenous data, so tests must supply their own forecasts and prices.
#[fixture]
pub fn grid_model(area_info: AreaInfo, building: Agent) -> Model {
    let agents: AgentMap = [
        building,
        grid("ElectricityGrid", Carrier::Electricity),
        grid("HeatGrid", Carrier::HighTempHeat),
    ]
    .into_iter()
    .map(|agent| (agent.id.clone(), agent))
    .collect();

    Model {
        model_path: PathBuf::new(),
        parameters: SimulationParameters {
            start: datetime(1, 1, 0),
            hours: 24,
            failure_policy: FailurePolicy::Skip,
            relax_end_charge_on_failure: true,
            solver_time_limit: 60.0,
            random_seed: 0,
        },
        area: area_info,
        agents,
        data: ExogenousData::new(2019),
    }
}

#[fixture]
pub fn solver_options() -> SolverOptions {
    SolverOptions {
        time_limit: 60.0,
        random_seed: 0,
        solver_output: false,
    }
}
