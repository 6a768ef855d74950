//! Code for reading agents from `agents.toml`.
use super::read_toml;
use super::schema::definitions::{
    BUILDING_PARAMS, GRID_PARAMS, GROCERY_STORE_PARAMS, HEAT_PRODUCER_PARAMS, PV_PARAMS,
    STORAGE_PARAMS,
};
use super::schema::{ParamSpec, resolve_params, take_string};
use crate::agent::{
    Agent, AgentID, AgentKind, AgentMap, BoosterPump, Building, GridConnection, GroceryStore,
    HeatProducer, HeatPump, PhotovoltaicArray, StorageUnit, ThermalMass,
};
use crate::agent::storage::accumulator_tank_capacity;
use crate::area::AreaInfo;
use crate::carrier::{Carrier, Resource};
use crate::input::input_err_msg;
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use toml::{Table, Value};

const AGENTS_FILE_NAME: &str = "agents.toml";

/// The contents of `agents.toml`
#[derive(Debug, Deserialize)]
struct AgentsFile {
    #[serde(rename = "Agents", default)]
    agents: Vec<Table>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuildingRaw {
    atemp: f64,
    #[serde(rename = "PVArea")]
    pv_area: f64,
    #[serde(rename = "PVEfficiency")]
    pv_efficiency: Option<f64>,
    number_heat_pumps: i64,
    heat_pump_max_input: f64,
    heat_pump_max_output: f64,
    heat_pump_for_cooling: bool,
    booster_pump_max_input: f64,
    booster_pump_max_output: f64,
    battery_capacity: f64,
    battery_charge_rate: Option<f64>,
    battery_discharge_rate: Option<f64>,
    #[serde(rename = "FractionUsedForBITES")]
    fraction_used_for_bites: f64,
    accumulator_tank_capacity: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroceryStoreRaw {
    atemp: f64,
    #[serde(rename = "PVArea")]
    pv_area: f64,
    #[serde(rename = "PVEfficiency")]
    pv_efficiency: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HeatProducerRaw {
    resource: Resource,
    max_output: f64,
    production_cost: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StorageRaw {
    resource: Resource,
    capacity: f64,
    charge_rate: Option<f64>,
    discharge_rate: Option<f64>,
    round_trip_efficiency: f64,
    initial_charge_level: Option<f64>,
    buy_price_percentile: Option<f64>,
    sell_price_percentile: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PvRaw {
    #[serde(rename = "PVArea")]
    pv_area: f64,
    #[serde(rename = "PVEfficiency")]
    pv_efficiency: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GridRaw {
    resource: Resource,
    transfer_rate: f64,
}

/// Read agents from `agents.toml`.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `area` - Community-wide parameters, which supply some agent defaults
///
/// # Returns
///
/// A map of agents keyed by agent ID, in file order
pub fn read_agents(model_dir: &Path, area: &AreaInfo) -> Result<AgentMap> {
    let file_path = model_dir.join(AGENTS_FILE_NAME);
    let agents_file: AgentsFile = read_toml(&file_path)?;
    read_agents_from_tables(agents_file.agents, area).with_context(|| input_err_msg(&file_path))
}

fn read_agents_from_tables(tables: Vec<Table>, area: &AreaInfo) -> Result<AgentMap> {
    let mut agents = AgentMap::new();
    for mut table in tables {
        let name = take_string(&mut table, "Name")?;
        let agent_type = take_string(&mut table, "Type")?;
        let kind = read_agent_kind(&agent_type, table, area)
            .with_context(|| format!("Invalid parameters for agent {name}"))?;

        let id = AgentID::new(&name);
        ensure!(!agents.contains_key(&id), "Duplicate agent name: {name}");
        agents.insert(id.clone(), Agent { id, kind });
    }

    check_grid_agents(&agents)?;
    ensure!(
        agents.values().any(|agent| !agent.is_grid()),
        "At least one agent which is not a grid agent is required"
    );

    Ok(agents)
}

/// Resolve a raw table against its parameter definitions and deserialise it
fn resolve<T: DeserializeOwned>(specs: &[ParamSpec], mut table: Table) -> Result<T> {
    resolve_params(specs, &mut table)?;
    Ok(Value::Table(table).try_into()?)
}

fn read_agent_kind(agent_type: &str, table: Table, area: &AreaInfo) -> Result<AgentKind> {
    let kind = match agent_type {
        "BuildingAgent" => {
            let raw: BuildingRaw = resolve(BUILDING_PARAMS, table)?;
            AgentKind::Building(building_from_raw(raw, area)?)
        }
        "GroceryStoreAgent" => {
            let raw: GroceryStoreRaw = resolve(GROCERY_STORE_PARAMS, table)?;
            AgentKind::GroceryStore(GroceryStore {
                floor_area: raw.atemp,
                pv: pv_array(raw.pv_area, raw.pv_efficiency, area),
            })
        }
        "HeatProducerAgent" => {
            let raw: HeatProducerRaw = resolve(HEAT_PRODUCER_PARAMS, table)?;
            AgentKind::HeatProducer(HeatProducer {
                carrier: raw.resource.into(),
                max_output: raw.max_output,
                production_cost: raw.production_cost,
            })
        }
        "StorageAgent" => {
            let raw: StorageRaw = resolve(STORAGE_PARAMS, table)?;
            let (charge_rate, discharge_rate) =
                check_rates("", raw.capacity, raw.charge_rate, raw.discharge_rate)?;
            if let (Some(buy), Some(sell)) = (raw.buy_price_percentile, raw.sell_price_percentile)
            {
                ensure!(
                    sell > buy,
                    "SellPricePercentile ({sell}) must be greater than BuyPricePercentile ({buy})"
                );
            }

            AgentKind::Storage(StorageUnit {
                carrier: raw.resource.into(),
                capacity: raw.capacity,
                charge_rate,
                discharge_rate,
                round_trip_efficiency: raw.round_trip_efficiency,
                initial_charge_level: raw
                    .initial_charge_level
                    .unwrap_or(area.storage_end_charge_level),
                buy_price_percentile: raw.buy_price_percentile,
                sell_price_percentile: raw.sell_price_percentile,
            })
        }
        "PVAgent" => {
            let raw: PvRaw = resolve(PV_PARAMS, table)?;
            AgentKind::PV(PhotovoltaicArray {
                area: raw.pv_area,
                efficiency: raw.pv_efficiency.unwrap_or(area.default_pv_efficiency),
            })
        }
        "GridAgent" => {
            let raw: GridRaw = resolve(GRID_PARAMS, table)?;
            AgentKind::Grid(GridConnection {
                carrier: raw.resource.into(),
                transfer_rate: raw.transfer_rate,
            })
        }
        other => bail!("Unknown agent type: {other}"),
    };

    Ok(kind)
}

fn building_from_raw(raw: BuildingRaw, area: &AreaInfo) -> Result<Building> {
    let heat_pump = (raw.number_heat_pumps > 0).then_some(HeatPump {
        max_input: raw.heat_pump_max_input,
        max_output: raw.heat_pump_max_output,
        provides_cooling: raw.heat_pump_for_cooling,
    });
    let booster_pump = (raw.booster_pump_max_input > 0.0).then_some(BoosterPump {
        max_input: raw.booster_pump_max_input,
        max_output: raw.booster_pump_max_output,
    });

    let (charge_rate, discharge_rate) = check_rates(
        "Battery",
        raw.battery_capacity,
        raw.battery_charge_rate,
        raw.battery_discharge_rate,
    )?;
    let battery = (raw.battery_capacity > 0.0).then(|| StorageUnit {
        carrier: Carrier::Electricity,
        capacity: raw.battery_capacity,
        charge_rate,
        discharge_rate,
        round_trip_efficiency: area.battery_efficiency,
        initial_charge_level: area.storage_end_charge_level,
        buy_price_percentile: None,
        sell_price_percentile: None,
    });

    let thermal_area = raw.atemp * raw.fraction_used_for_bites;
    let thermal_mass = (thermal_area > 0.0).then_some(ThermalMass { area: thermal_area });

    // Charging and discharging each take a full tank an hour, losing efficiency on each leg
    let accumulator_tank = (raw.accumulator_tank_capacity > 0.0).then(|| StorageUnit {
        carrier: Carrier::HighTempHeat,
        capacity: accumulator_tank_capacity(raw.accumulator_tank_capacity),
        charge_rate: 1.0,
        discharge_rate: 1.0,
        round_trip_efficiency: area.acc_tank_efficiency.powi(2),
        initial_charge_level: area.storage_end_charge_level,
        buy_price_percentile: None,
        sell_price_percentile: None,
    });

    Ok(Building {
        floor_area: raw.atemp,
        pv: pv_array(raw.pv_area, raw.pv_efficiency, area),
        heat_pump,
        booster_pump,
        battery,
        thermal_mass,
        accumulator_tank,
    })
}

fn pv_array(pv_area: f64, efficiency: Option<f64>, area: &AreaInfo) -> Option<PhotovoltaicArray> {
    (pv_area > 0.0).then(|| PhotovoltaicArray {
        area: pv_area,
        efficiency: efficiency.unwrap_or(area.default_pv_efficiency),
    })
}

/// Check the charge and discharge rates for a storage unit.
///
/// The discharge rate defaults to the charge rate.
fn check_rates(
    prefix: &str,
    capacity: f64,
    charge_rate: Option<f64>,
    discharge_rate: Option<f64>,
) -> Result<(f64, f64)> {
    ensure!(
        discharge_rate.is_none() || charge_rate.is_some(),
        "{prefix}DischargeRate cannot be given without {prefix}ChargeRate"
    );

    let charge_rate = match charge_rate {
        Some(rate) => rate,
        None => {
            ensure!(
                capacity <= 0.0,
                "{prefix}ChargeRate is required when {prefix}Capacity is non-zero"
            );
            0.0
        }
    };

    Ok((charge_rate, discharge_rate.unwrap_or(charge_rate)))
}

/// Check that no carrier has more than one grid connection
fn check_grid_agents(agents: &AgentMap) -> Result<()> {
    let mut carriers = HashSet::new();
    for agent in agents.values() {
        if let AgentKind::Grid(grid) = &agent.kind {
            ensure!(
                carriers.insert(grid.carrier),
                "More than one grid agent for {}",
                grid.carrier
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{area_info, assert_error};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn parse(toml_str: &str, area: &AreaInfo) -> Result<AgentMap> {
        let file: AgentsFile = toml::from_str(toml_str).unwrap();
        read_agents_from_tables(file.agents, area)
    }

    #[rstest]
    fn test_read_agents_file(area_info: AreaInfo) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(AGENTS_FILE_NAME),
            r#"
[[Agents]]
Name = "House"
Type = "BuildingAgent"
Atemp = 1000
PVArea = 50
NumberHeatPumps = 2
HeatPumpMaxInput = 10
HeatPumpMaxOutput = 30
BatteryCapacity = 20
BatteryChargeRate = 0.5

[[Agents]]
Name = "Grid"
Type = "GridAgent"
Resource = "ELECTRICITY"
"#,
        )
        .unwrap();

        let agents = read_agents(dir.path(), &area_info).unwrap();
        assert_eq!(agents.len(), 2);

        let AgentKind::Building(building) = &agents[&AgentID::new("House")].kind else {
            panic!("Expected a building");
        };
        let pv = building.pv.unwrap();
        assert_approx_eq!(f64, pv.efficiency, area_info.default_pv_efficiency);
        assert_approx_eq!(f64, building.heat_pump.unwrap().max_output, 30.0);
        assert!(building.booster_pump.is_none());
        let battery = building.battery.as_ref().unwrap();
        assert_approx_eq!(f64, battery.discharge_rate, 0.5);
        assert_approx_eq!(f64, battery.round_trip_efficiency, area_info.battery_efficiency);

        let AgentKind::Grid(grid) = &agents[&AgentID::new("Grid")].kind else {
            panic!("Expected a grid agent");
        };
        assert_eq!(grid.carrier, Carrier::Electricity);
        assert_approx_eq!(f64, grid.transfer_rate, 10000.0);
    }

    #[rstest]
    fn test_building_thermal_storage(area_info: AreaInfo) {
        let agents = parse(
            r#"
[[Agents]]
Name = "House"
Type = "BuildingAgent"
Atemp = 1000
FractionUsedForBITES = 0.25
AccumulatorTankCapacity = 2
"#,
            &area_info,
        )
        .unwrap();
        let AgentKind::Building(building) = &agents[0].kind else {
            panic!("Expected a building");
        };
        assert_approx_eq!(f64, building.thermal_mass.unwrap().area, 250.0);
        assert!(building.battery.is_none());

        let tank = building.accumulator_tank.as_ref().unwrap();
        assert_eq!(tank.carrier, Carrier::HighTempHeat);
        assert_approx_eq!(f64, tank.capacity, accumulator_tank_capacity(2.0));
        assert_approx_eq!(f64, tank.max_charge(), tank.capacity);
        assert_approx_eq!(
            f64,
            tank.round_trip_efficiency,
            area_info.acc_tank_efficiency * area_info.acc_tank_efficiency
        );
        assert_eq!(agents[0].stores().count(), 1);
    }

    #[rstest]
    #[case("FractionUsedForBITES = 1.5", "FractionUsedForBITES")]
    #[case("AccumulatorTankCapacity = -1", "AccumulatorTankCapacity")]
    fn test_invalid_building_thermal_storage(
        area_info: AreaInfo,
        #[case] params: &str,
        #[case] name: &str,
    ) {
        let table: Table = format!("Atemp = 1000\n{params}").parse().unwrap();
        let err = read_agent_kind("BuildingAgent", table, &area_info).unwrap_err();
        assert!(format!("{err:#}").contains(name));
    }

    #[rstest]
    fn test_heat_pump_params_disabled_without_pumps(area_info: AreaInfo) {
        let agents = parse(
            r#"
[[Agents]]
Name = "House"
Type = "BuildingAgent"
Atemp = 1000
HeatPumpMaxInput = 10
HeatPumpForCooling = true
"#,
            &area_info,
        )
        .unwrap();
        let AgentKind::Building(building) = &agents[0].kind else {
            panic!("Expected a building");
        };
        assert!(building.heat_pump.is_none());
    }

    #[rstest]
    fn test_storage_initial_level_defaults_to_end_level(area_info: AreaInfo) {
        let agents = parse(
            r#"
[[Agents]]
Name = "Battery"
Type = "StorageAgent"
Resource = "ELECTRICITY"
Capacity = 1000
ChargeRate = 0.4
"#,
            &area_info,
        )
        .unwrap();
        let storage = agents[0].storage().unwrap();
        assert_approx_eq!(f64, storage.initial_charge_level, area_info.storage_end_charge_level);
        assert_approx_eq!(f64, storage.discharge_rate, 0.4);
        assert_approx_eq!(f64, storage.round_trip_efficiency, 0.93);
    }

    #[rstest]
    #[case(
        "Resource = \"ELECTRICITY\"\nCapacity = 1000\nDischargeRate = 0.4",
        "DischargeRate cannot be given without ChargeRate"
    )]
    #[case(
        "Resource = \"ELECTRICITY\"\nCapacity = 1000",
        "ChargeRate is required when Capacity is non-zero"
    )]
    #[case(
        "Resource = \"ELECTRICITY\"\nCapacity = 1000\nChargeRate = 0.4\n\
        BuyPricePercentile = 60\nSellPricePercentile = 40",
        "SellPricePercentile (40) must be greater than BuyPricePercentile (60)"
    )]
    #[case(
        "Resource = \"LOW_TEMP_HEAT\"\nCapacity = 1000\nChargeRate = 0.4",
        "Resource (Resource) must be one of [\"ELECTRICITY\", \"HIGH_TEMP_HEAT\"], got \"LOW_TEMP_HEAT\""
    )]
    #[case(
        "Resource = \"ELECTRICITY\"\nCapacity = 1000\nChargeRate = 2",
        "ChargeRate (Charge rate (fraction of capacity per hour)) must be at most 1, got 2"
    )]
    #[case(
        "Resource = \"ELECTRICITY\"\nCapacity = 1000\nChargeRate = 0.4\nColour = \"red\"",
        "Unknown parameter: Colour"
    )]
    fn test_invalid_storage(area_info: AreaInfo, #[case] params: &str, #[case] msg: &str) {
        let table: Table = toml::from_str(params).unwrap();
        assert_error!(read_agent_kind("StorageAgent", table, &area_info), msg);
    }

    #[rstest]
    fn test_unknown_agent_type(area_info: AreaInfo) {
        assert_error!(
            read_agent_kind("WindTurbineAgent", Table::new(), &area_info),
            "Unknown agent type: WindTurbineAgent"
        );
    }

    #[rstest]
    #[case(
        r#"
[[Agents]]
Name = "Grid"
Type = "GridAgent"
Resource = "ELECTRICITY"
"#,
        "At least one agent which is not a grid agent is required"
    )]
    #[case(
        r#"
[[Agents]]
Name = "PV"
Type = "PVAgent"
PVArea = 10

[[Agents]]
Name = "PV"
Type = "PVAgent"
PVArea = 20
"#,
        "Duplicate agent name: PV"
    )]
    #[case(
        r#"
[[Agents]]
Name = "Grid1"
Type = "GridAgent"
Resource = "HIGH_TEMP_HEAT"

[[Agents]]
Name = "Grid2"
Type = "GridAgent"
Resource = "HIGH_TEMP_HEAT"
"#,
        "More than one grid agent for high_temp_heat"
    )]
    fn test_invalid_agents(area_info: AreaInfo, #[case] toml_str: &str, #[case] msg: &str) {
        assert_error!(parse(toml_str, &area_info), msg);
    }
}
