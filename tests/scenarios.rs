//! End-to-end scenarios for the rolling scheduler.
use float_cmp::assert_approx_eq;
use lecsim::agent::{
    Agent, AgentID, AgentKind, AgentMap, Building, GridConnection, HeatPump, PhotovoltaicArray,
    Store, StorageUnit,
};
use lecsim::carrier::Carrier;
use lecsim::data::{ConsumptionSample, ExogenousData};
use lecsim::input::read_area_info;
use lecsim::model::{FailurePolicy, Model, SimulationParameters};
use lecsim::simulation::observe::ExpectedValues;
use lecsim::simulation::optimisation::Cems;
use lecsim::simulation::{SimulationState, StepOutcome, solver_options, step};
use lecsim::trade::Market;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::path::PathBuf;
use toml::Table;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap()
}

fn hour(index: usize) -> NaiveDateTime {
    start() + TimeDelta::hours(i64::try_from(index).unwrap())
}

fn building(id: &str, heat_pump: Option<HeatPump>) -> Agent {
    Agent {
        id: id.into(),
        kind: AgentKind::Building(Building {
            floor_area: 1000.0,
            pv: None,
            heat_pump,
            booster_pump: None,
            battery: None,
            thermal_mass: None,
            accumulator_tank: None,
        }),
    }
}

fn solar(id: &str) -> Agent {
    Agent {
        id: id.into(),
        kind: AgentKind::PV(PhotovoltaicArray {
            area: 100.0,
            efficiency: 0.2,
        }),
    }
}

fn grid(carrier: Carrier) -> Agent {
    Agent {
        id: format!("{carrier}_grid").as_str().into(),
        kind: AgentKind::Grid(GridConnection {
            carrier,
            transfer_rate: 1000.0,
        }),
    }
}

/// Build a model from agents, `[AreaInfo]` entries, spot prices and consumption.
///
/// The simulation covers one hour per spot price. Irradiation is 0.5 kW/m2 in every hour.
fn model(
    agents: Vec<Agent>,
    area_info: &str,
    spot_prices: &[f64],
    consumption: &[(&str, Carrier, f64)],
) -> Model {
    let area = read_area_info(area_info.parse::<Table>().unwrap()).unwrap();
    let mut data = ExogenousData::new(2019);
    for (i, &price) in spot_prices.iter().enumerate() {
        data.insert_spot_price(hour(i), price).unwrap();
        data.insert_irradiation(hour(i), 0.5).unwrap();
        for &(agent_id, carrier, expected) in consumption {
            let sample = ConsumptionSample {
                expected,
                relative_std_dev: 0.0,
            };
            data.insert_consumption(agent_id.into(), carrier, hour(i), sample)
                .unwrap();
        }
    }

    let agents: AgentMap = agents
        .into_iter()
        .map(|agent| (agent.id.clone(), agent))
        .collect();

    Model {
        model_path: PathBuf::new(),
        parameters: SimulationParameters {
            start: start(),
            hours: spot_prices.len(),
            failure_policy: FailurePolicy::Skip,
            relax_end_charge_on_failure: true,
            solver_time_limit: 60.0,
            random_seed: 0,
        },
        area,
        agents,
        data,
    }
}

/// Run every period of the model, returning what happened in each
fn run_all(model: &Model) -> (Vec<StepOutcome>, SimulationState) {
    let mut cems = Cems::new(model, solver_options(model, false));
    let mut state = SimulationState::new(model);
    let mut outcomes = Vec::new();
    while state.next_period < model.parameters.hours {
        outcomes.push(step(model, &mut cems, &mut state, &mut ExpectedValues).unwrap());
    }

    (outcomes, state)
}

fn committed(outcome: &StepOutcome) -> &lecsim::simulation::dispatch::CommittedDispatch {
    match outcome {
        StepOutcome::Committed { dispatch, .. } => dispatch,
        StepOutcome::Skipped(failure) => panic!("Period {} was skipped", failure.period),
    }
}

#[test]
fn test_single_building_imports_at_external_price() {
    let prices: Vec<f64> = (0..24u32).map(|hour| 0.5 + 0.01 * f64::from(hour)).collect();
    let model = model(
        vec![building("House", None), grid(Carrier::Electricity)],
        "TradingHorizon = 24",
        &prices,
        &[("House", Carrier::Electricity, 10.0)],
    );
    let (outcomes, state) = run_all(&model);
    assert_eq!(state.next_period, 24);
    assert_eq!(outcomes.len(), 24);
    for outcome in &outcomes {
        let dispatch = committed(outcome);
        assert_approx_eq!(
            f64,
            dispatch.total_import(Carrier::Electricity),
            10.0,
            epsilon = 1e-6
        );
    }

    let StepOutcome::Committed {
        dispatch,
        clearing_prices,
        trades,
    } = &outcomes[0]
    else {
        panic!("First period was skipped");
    };
    let area = &model.area;
    let expected_price = 0.5 + area.electricity_tax + area.electricity_transmission_fee;
    assert_approx_eq!(
        f64,
        dispatch.external_prices.electricity_import,
        expected_price
    );
    assert_approx_eq!(
        f64,
        dispatch.internal_exchange(area, Carrier::Electricity),
        0.0,
        epsilon = 1e-6
    );
    assert!(dispatch.max_balance_residual() < 1e-5);

    let clearing = clearing_prices
        .iter()
        .find(|price| price.carrier == Carrier::Electricity)
        .unwrap();
    assert_approx_eq!(f64, clearing.price, expected_price, epsilon = 1e-6);

    let house_id = AgentID::from("House");
    let house = trades
        .iter()
        .find(|trade| trade.agent_id == house_id)
        .unwrap();
    assert!(house.is_buy());
    assert_approx_eq!(f64, house.quantity.value(), 10.0, epsilon = 1e-6);
    assert_approx_eq!(f64, house.price.value(), expected_price, epsilon = 1e-6);

    // The grid mirrors the community's import
    let grid_id = AgentID::from("electricity_grid");
    let grid = trades
        .iter()
        .find(|trade| trade.agent_id == grid_id)
        .unwrap();
    assert_approx_eq!(f64, grid.quantity.value(), -10.0, epsilon = 1e-6);
    assert_eq!(grid.market, Market::External);
}

#[test]
fn test_local_market_exchanges_surplus() {
    let model = model(
        vec![
            building("House", None),
            solar("Solar"),
            grid(Carrier::Electricity),
        ],
        "TradingHorizon = 2\nElectricityTaxInternal = 0.01",
        &[0.5, 0.5],
        &[("House", Carrier::Electricity, 6.0)],
    );
    let (outcomes, _) = run_all(&model);

    for outcome in &outcomes {
        let dispatch = committed(outcome);
        assert!(dispatch.max_balance_residual() < 1e-5);

        // 0.5 kW/m2 * 100 m2 * 0.2 = 10 kWh of PV, of which 6 kWh are used locally
        assert_approx_eq!(
            f64,
            dispatch.internal_exchange(&model.area, Carrier::Electricity),
            6.0,
            epsilon = 1e-6
        );
        assert_approx_eq!(
            f64,
            dispatch.total_export(Carrier::Electricity),
            4.0,
            epsilon = 1e-6
        );
        assert_approx_eq!(
            f64,
            dispatch.total_import(Carrier::Electricity),
            0.0,
            epsilon = 1e-6
        );
    }
}

#[test]
fn test_disabled_market_trades_externally() {
    let model = model(
        vec![
            building("House", None),
            solar("Solar"),
            grid(Carrier::Electricity),
        ],
        "TradingHorizon = 2\nLocalMarketEnabled = false",
        &[0.5, 0.5],
        &[("House", Carrier::Electricity, 6.0)],
    );
    let (outcomes, _) = run_all(&model);

    let StepOutcome::Committed {
        dispatch,
        clearing_prices,
        trades,
    } = &outcomes[0]
    else {
        panic!("First period was skipped");
    };
    assert!(!dispatch.local_market);
    assert_approx_eq!(
        f64,
        dispatch.internal_exchange(&model.area, Carrier::Electricity),
        0.0
    );
    for price in clearing_prices {
        assert_approx_eq!(f64, price.internal_exchange, 0.0);
    }

    let prices = &dispatch.external_prices;
    let house_id = AgentID::from("House");
    let solar_id = AgentID::from("Solar");
    for trade in trades.iter().filter(|trade| trade.agent_id != "electricity_grid".into()) {
        assert_eq!(trade.market, Market::External);
        if trade.agent_id == house_id {
            assert_approx_eq!(f64, trade.quantity.value(), 6.0, epsilon = 1e-6);
            assert_approx_eq!(f64, trade.price.value(), prices.electricity_import);
        } else if trade.agent_id == solar_id {
            assert_approx_eq!(f64, trade.quantity.value(), -10.0, epsilon = 1e-6);
            assert_approx_eq!(f64, trade.price.value(), prices.electricity_export);
        }
    }
}

#[test]
fn test_heat_pump_output_follows_cop() {
    let heat_pump = HeatPump {
        max_input: 10.0,
        max_output: 30.0,
        provides_cooling: false,
    };
    let model = model(
        vec![
            building("House", Some(heat_pump)),
            grid(Carrier::Electricity),
            grid(Carrier::HighTempHeat),
        ],
        "TradingHorizon = 2",
        &[0.5, 0.5],
        &[("House", Carrier::HighTempHeat, 20.0)],
    );
    let (outcomes, _) = run_all(&model);

    let cop = model.area.cop_heat_pumps_high_temp;
    for outcome in &outcomes {
        let dispatch = committed(outcome);
        let conversion = dispatch.agents[&AgentID::from("House")].heat_pump.unwrap();
        assert!(conversion.output > 0.0);
        assert!(conversion.input <= heat_pump.max_input + 1e-6);
        assert!(conversion.output <= heat_pump.max_output + 1e-6);
        assert_approx_eq!(f64, conversion.output, cop * conversion.input, epsilon = 1e-6);
    }
}

#[test]
fn test_storage_stays_within_capacity() {
    let storage = Agent {
        id: "Battery".into(),
        kind: AgentKind::Storage(StorageUnit {
            carrier: Carrier::Electricity,
            capacity: 1000.0,
            charge_rate: 0.4,
            discharge_rate: 0.4,
            round_trip_efficiency: 0.93,
            initial_charge_level: 0.5,
            buy_price_percentile: None,
            sell_price_percentile: None,
        }),
    };
    let mut prices = vec![0.1; 6];
    prices.extend([2.0; 6]);
    let model = model(
        vec![building("House", None), storage, grid(Carrier::Electricity)],
        "TradingHorizon = 12\nStorageEndChargeBand = 0.5",
        &prices,
        &[("House", Carrier::Electricity, 20.0)],
    );
    let (outcomes, state) = run_all(&model);

    let battery_id = AgentID::from("Battery");
    let leg = 0.93f64.sqrt();
    let max_rate = 0.4 * 1000.0;
    let mut previous = 500.0;
    let mut charged = 0.0;
    let mut discharged = 0.0;
    for (hour, outcome) in outcomes.iter().enumerate() {
        let dispatch = committed(outcome);
        let battery = dispatch.agents[&battery_id].storage[&Store::Unit];
        assert!(battery.level >= -1e-6);
        assert!(battery.level <= 1000.0 + 1e-6);
        assert!(battery.charge <= max_rate + 1e-6);
        assert!(battery.discharge <= max_rate + 1e-6);
        assert_approx_eq!(
            f64,
            battery.level,
            previous + leg * battery.charge - battery.discharge / leg,
            epsilon = 1e-6
        );

        // Charge only while energy is cheap and discharge only once it is expensive
        if hour < 6 {
            assert!(battery.charge >= -1e-6);
            assert_approx_eq!(f64, battery.discharge, 0.0, epsilon = 1e-6);
            charged += battery.charge;
        } else {
            assert!(battery.discharge >= -1e-6);
            assert_approx_eq!(f64, battery.charge, 0.0, epsilon = 1e-6);
            discharged += battery.discharge;
        }

        previous = battery.level;
    }

    // Nothing comes out that didn't go in, net of losses
    assert!(discharged <= 0.93 * charged + leg * 500.0 + 1e-6);
    assert!(charged > 0.0);
    assert!(discharged > 0.0);
    assert_approx_eq!(
        f64,
        state.storage_level(&battery_id, Store::Unit).unwrap(),
        previous
    );
}

#[test]
fn test_infeasible_period_is_skipped() {
    let model = model(
        vec![building("House", None)],
        "TradingHorizon = 2\nInterAgentElectricityTransferCapacity = 5.0",
        &[0.5, 0.5],
        &[("House", Carrier::Electricity, 10.0)],
    );
    let (outcomes, state) = run_all(&model);
    assert_eq!(state.next_period, 2);
    for outcome in &outcomes {
        let StepOutcome::Skipped(failure) = outcome else {
            panic!("Infeasible period was committed");
        };
        assert_eq!(failure.kind, "infeasible");
    }
}

#[test]
fn test_infeasible_period_aborts() {
    let mut model = model(
        vec![building("House", None)],
        "TradingHorizon = 2\nInterAgentElectricityTransferCapacity = 5.0",
        &[0.5, 0.5],
        &[("House", Carrier::Electricity, 10.0)],
    );
    model.parameters.failure_policy = FailurePolicy::Abort;

    let mut cems = Cems::new(&model, solver_options(&model, false));
    let mut state = SimulationState::new(&model);
    let err = step(&model, &mut cems, &mut state, &mut ExpectedValues).unwrap_err();
    assert_eq!(err.to_string(), "Simulation aborted at 2019-01-01 00:00:00");
    assert_eq!(state.next_period, 0);
}
