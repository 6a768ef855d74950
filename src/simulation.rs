//! Functionality for running the rolling-horizon simulation.
use crate::agent::PeriodInputs;
use crate::error::HorizonSolveError;
use crate::horizon::{Horizon, TradingPeriod};
use crate::model::{FailurePolicy, Model};
use crate::output::{DataWriter, write_final_state};
use crate::trade::TradeRecord;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

pub mod dispatch;
use dispatch::CommittedDispatch;
pub mod observe;
use observe::{DemandObserver, ExpectedValues};
pub mod optimisation;
use optimisation::{Cems, HorizonInputs, SolverOptions};
pub mod prices;
use prices::{ClearingPrice, clearing_prices, settle};
pub mod replication;
pub mod state;
pub use state::{EffectFeeTracker, SimulationState};

/// Committed dispatch which violates a balance by more than this (kWh) is reported
const BALANCE_TOLERANCE: f64 = 1e-5;

/// A period for which nothing was committed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPeriod {
    /// Index of the trading period
    pub period: usize,
    /// Start of the trading period
    pub datetime: chrono::NaiveDateTime,
    /// What kind of failure occurred
    pub kind: String,
    /// The error message
    pub message: String,
}

/// What happened in a single step of the simulation
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The leading period was solved and settled
    Committed {
        /// The committed decisions
        dispatch: Box<CommittedDispatch>,
        /// Clearing price of each carrier
        clearing_prices: Vec<ClearingPrice>,
        /// Settled trades
        trades: Vec<TradeRecord>,
    },
    /// The horizon could not be solved and the period was skipped
    Skipped(FailedPeriod),
}

/// Options for running the simulation which don't come from the model
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    /// Whether to write extra debug information
    pub debug_model: bool,
    /// Whether to show the solver's console output
    pub solver_output: bool,
}

/// Solver options for the model
pub fn solver_options(model: &Model, solver_output: bool) -> SolverOptions {
    SolverOptions {
        time_limit: model.parameters.solver_time_limit,
        random_seed: model.parameters.random_seed,
        solver_output,
    }
}

/// Gather forecasts, prices and agent bounds for a horizon.
///
/// Consumption in the leading period is realised through `observer`; later periods use expected
/// values.
pub fn build_horizon_inputs(
    model: &Model,
    state: &SimulationState,
    horizon: &Horizon,
    observer: &mut dyn DemandObserver,
) -> Result<HorizonInputs> {
    let data = &model.data;
    let spot_prices: Vec<f64> = horizon
        .iter()
        .map(|period| data.spot_price(period.start))
        .collect::<Result<_>>()?;

    let mut inputs = HorizonInputs {
        periods: horizon.iter().copied().collect(),
        contributions: Vec::with_capacity(horizon.len()),
        prices: Vec::with_capacity(horizon.len()),
        initial_levels: state
            .iter_store_levels()
            .map(|(id, store, level)| ((id.clone(), store), level))
            .collect(),
        initial_thermal_mass: state.thermal_mass_levels.clone(),
    };
    for (t, (period, &spot_price)) in horizon.iter().zip(&spot_prices).enumerate() {
        let irradiation = if model.has_pv() {
            data.irradiation(period.start)?
        } else {
            0.0
        };

        let mut contributions = IndexMap::new();
        for agent in model.iter_participants() {
            let forecast = data.forecast(&agent.id, period.start)?;
            let usage = if t == 0 {
                observer.observe(&forecast)
            } else {
                ExpectedValues.observe(&forecast)
            };
            let period_inputs = PeriodInputs {
                usage: &usage,
                irradiation,
                spot_price,
                horizon_spot_prices: &spot_prices,
            };
            let levels = (t == 0).then(|| state.store_levels(&agent.id));
            let contribution =
                agent.contribution(&model.area, period, &period_inputs, levels.as_ref());
            contributions.insert(agent.id.clone(), contribution);
        }

        inputs.contributions.push(contributions);
        inputs.prices.push(prices::external::ExternalPrices::calculate(
            &model.area,
            period.start,
            spot_price,
            &state.effect_fees,
        ));
    }

    Ok(inputs)
}

/// Solve the horizon starting at the next period, then commit and settle its leading period.
///
/// Horizon solve failures are handled according to the model's failure policy. Other errors (e.g.
/// missing data) are always returned.
pub fn step(
    model: &Model,
    cems: &mut Cems<'_>,
    state: &mut SimulationState,
    observer: &mut dyn DemandObserver,
) -> Result<StepOutcome> {
    let parameters = &model.parameters;
    let horizon = Horizon::new(
        parameters.start,
        state.next_period,
        model.area.trading_horizon,
        parameters.hours,
    );
    let period = *horizon.first();
    let inputs = build_horizon_inputs(model, state, &horizon, observer)?;

    let result = cems.solve_with_relaxation(&inputs, parameters.relax_end_charge_on_failure);
    cems.reset();
    let solution = match result {
        Ok(solution) => solution,
        Err(err) => return handle_failure(model, state, &period, err),
    };

    let dispatch = CommittedDispatch::from_solution(&model.area, &inputs, &solution);
    let residual = dispatch.max_balance_residual();
    if residual > BALANCE_TOLERANCE {
        warn!(
            "Carrier balances for {} are violated by up to {residual:e} kWh",
            period.start
        );
    }

    let clearing_prices = clearing_prices(model, &dispatch);
    let trades = settle(model, &dispatch, &clearing_prices);
    state.commit(&dispatch)?;
    debug!(
        "Committed period {} ({}): {} trades",
        period.index,
        period.start,
        trades.len()
    );

    Ok(StepOutcome::Committed {
        dispatch: Box::new(dispatch),
        clearing_prices,
        trades,
    })
}

fn handle_failure(
    model: &Model,
    state: &mut SimulationState,
    period: &TradingPeriod,
    err: anyhow::Error,
) -> Result<StepOutcome> {
    let Some(solve_error) = err.downcast_ref::<HorizonSolveError>() else {
        return Err(err);
    };
    let kind = solve_error.kind().to_string();

    match model.parameters.failure_policy {
        FailurePolicy::Abort => Err(err.context(format!("Simulation aborted at {}", period.start))),
        FailurePolicy::Skip => {
            warn!("{err}. Skipping period {} ({}).", period.index, period.start);
            state.skip(period)?;
            Ok(StepOutcome::Skipped(FailedPeriod {
                period: period.index,
                datetime: period.start,
                kind,
                message: err.to_string(),
            }))
        }
    }
}

/// Run the simulation with consumption exactly as forecast.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `options` - Options for the run
pub fn run(model: &Model, output_path: &Path, options: RunOptions) -> Result<SimulationState> {
    run_with_observer(model, output_path, options, &mut ExpectedValues)
}

/// Run the simulation, realising each period's consumption through `observer`
pub fn run_with_observer(
    model: &Model,
    output_path: &Path,
    options: RunOptions,
    observer: &mut dyn DemandObserver,
) -> Result<SimulationState> {
    let mut writer = DataWriter::create(output_path, options.debug_model)?;
    let mut state = SimulationState::new(model);
    let mut cems = Cems::new(model, solver_options(model, options.solver_output));
    let parameters = &model.parameters;

    info!(
        "Simulating {} hours from {}",
        parameters.hours, parameters.start
    );
    let mut failed = 0;
    while state.next_period < parameters.hours {
        match step(model, &mut cems, &mut state, observer)? {
            StepOutcome::Committed {
                dispatch,
                clearing_prices,
                trades,
            } => {
                writer.write_trades(&trades)?;
                writer.write_clearing_prices(&clearing_prices)?;
                writer.write_storage_levels(&dispatch)?;
                writer.write_debug_info(&dispatch)?;
            }
            StepOutcome::Skipped(failure) => {
                failed += 1;
                writer.write_failed_period(&failure)?;
            }
        }

        if state.next_period % 24 == 0 {
            info!("Simulated {} of {} hours", state.next_period, parameters.hours);
        }
    }

    if failed > 0 {
        warn!("{failed} of {} periods could not be solved", parameters.hours);
    }

    writer.flush()?;
    write_final_state(output_path, &state).context("Failed to write final state")?;

    Ok(state)
}
