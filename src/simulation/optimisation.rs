//! The horizon optimisation performed by the community energy management system (CEMS).
//!
//! The whole horizon is formulated as a single cost-minimising linear program. Only the leading
//! period's decisions are committed by the caller; the rest exist to value storage correctly.
use crate::agent::{AgentID, PeriodContribution, Store, ThermalMassLevels};
use crate::error::HorizonSolveError;
use crate::horizon::TradingPeriod;
use crate::model::Model;
use crate::simulation::prices::external::ExternalPrices;
use anyhow::Result;
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::{debug, warn};

pub mod balance;
use balance::BalanceKey;
mod constraints;
use constraints::{ConstraintKeys, add_constraints};
pub mod variables;
use variables::{VariableKey, VariableMap, add_variables};

/// Options passed to the solver for every solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Time limit for a single solve (seconds)
    pub time_limit: f64,
    /// Seed for the solver's internal randomisation
    pub random_seed: u32,
    /// Whether to show the solver's own console output
    pub solver_output: bool,
}

/// Options which may differ between attempts at the same horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonOptions {
    /// Whether the final period's storage levels must lie within the end charge band
    pub enforce_end_charge: bool,
}

impl Default for HorizonOptions {
    fn default() -> Self {
        Self {
            enforce_end_charge: true,
        }
    }
}

/// Everything the optimisation needs to know about a horizon
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonInputs {
    /// The periods of the horizon, leading period first
    pub periods: Vec<TradingPeriod>,
    /// What each participating agent contributes in each period
    pub contributions: Vec<IndexMap<AgentID, PeriodContribution>>,
    /// External prices in each period
    pub prices: Vec<ExternalPrices>,
    /// Storage levels (kWh) at the start of the horizon
    pub initial_levels: IndexMap<(AgentID, Store), f64>,
    /// Heat held in building structures at the start of the horizon
    pub initial_thermal_mass: IndexMap<AgentID, ThermalMassLevels>,
}

impl HorizonInputs {
    /// Number of periods in the horizon
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the horizon is empty
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The first hour of the horizon
    pub fn start(&self) -> chrono::NaiveDateTime {
        self.periods[0].start
    }

    /// The level (kWh) of an agent's store at the start of the horizon
    pub fn initial_level(&self, agent_id: &AgentID, store: Store) -> f64 {
        self.initial_levels
            .get(&(agent_id.clone(), store))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether any agent has storage whose end level could be relaxed
    fn has_storage(&self) -> bool {
        self.contributions
            .last()
            .is_some_and(|c| c.values().any(|c| !c.storage.is_empty()))
    }
}

/// Where the CEMS is in handling a horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CemsPhase {
    /// No horizon in progress
    #[default]
    Idle,
    /// Variables and constraints are being added
    Formulating,
    /// The solver is running
    Solving,
    /// A solution was found
    Solved,
    /// The horizon could not be solved
    Infeasible,
}

/// The solution to the horizon optimisation problem
#[derive(Debug)]
pub struct Solution {
    solution: highs::Solution,
    variables: VariableMap,
    constraint_keys: ConstraintKeys,
}

impl Solution {
    /// The value of a variable, or zero if it was not part of the problem
    pub fn value(&self, key: &VariableKey) -> f64 {
        self.variables
            .index_of(key)
            .map_or(0.0, |idx| self.solution.columns()[idx])
    }

    /// The variables of the problem
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Solved values of all columns, in the order of [`Solution::variables`]
    pub fn columns(&self) -> &[f64] {
        self.solution.columns()
    }

    /// Total cost over the horizon (SEK)
    pub fn objective_value(&self) -> f64 {
        self.variables.objective_value(self.solution.columns())
    }

    /// Iterate over the shadow prices of the community carrier balances.
    ///
    /// These are the internal clearing prices (SEK/kWh).
    pub fn iter_community_duals(&self) -> impl Iterator<Item = (&BalanceKey, f64)> {
        self.constraint_keys
            .community_balance_keys
            .zip_duals(self.solution.dual_rows())
    }

    /// Iterate over the shadow prices of each agent's carrier balances
    pub fn iter_agent_duals(&self) -> impl Iterator<Item = (&BalanceKey, f64)> {
        self.constraint_keys
            .agent_balance_keys
            .zip_duals(self.solution.dual_rows())
    }
}

/// Convert a solver status into a result
fn check_status(status: HighsModelStatus, inputs: &HorizonInputs, time_limit: f64) -> Result<()> {
    let horizon_start = inputs.start();
    let err = match status {
        HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => return Ok(()),
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
            HorizonSolveError::Infeasible {
                horizon_start,
                reason: format!("solver status {status:?}"),
            }
        }
        HighsModelStatus::ReachedTimeLimit => HorizonSolveError::Timeout {
            horizon_start,
            time_limit,
        },
        status => HorizonSolveError::SolverFailure {
            horizon_start,
            status: format!("{status:?}"),
        },
    };

    Err(err.into())
}

/// The community energy management system.
///
/// Solves one horizon at a time for a given model.
pub struct Cems<'a> {
    model: &'a Model,
    options: SolverOptions,
    phase: CemsPhase,
}

impl<'a> Cems<'a> {
    /// Create a new [`Cems`] for the model
    pub fn new(model: &'a Model, options: SolverOptions) -> Self {
        Self {
            model,
            options,
            phase: CemsPhase::Idle,
        }
    }

    /// The current phase
    pub fn phase(&self) -> CemsPhase {
        self.phase
    }

    /// Return to [`CemsPhase::Idle`] once the outcome of a horizon has been handled
    pub fn reset(&mut self) {
        self.phase = CemsPhase::Idle;
    }

    /// Formulate and solve the horizon once.
    ///
    /// On failure the error wraps a [`HorizonSolveError`].
    pub fn solve(&mut self, inputs: &HorizonInputs, options: &HorizonOptions) -> Result<Solution> {
        self.phase = CemsPhase::Formulating;
        let result = self.formulate_and_solve(inputs, options);
        self.phase = if result.is_ok() {
            CemsPhase::Solved
        } else {
            CemsPhase::Infeasible
        };

        result
    }

    /// Solve the horizon, retrying once without the end-of-horizon storage band if allowed.
    ///
    /// No retry is made if relaxation would not change the problem.
    pub fn solve_with_relaxation(
        &mut self,
        inputs: &HorizonInputs,
        relax_on_failure: bool,
    ) -> Result<Solution> {
        let err = match self.solve(inputs, &HorizonOptions::default()) {
            Ok(solution) => return Ok(solution),
            Err(err) => err,
        };

        let relaxable = err
            .downcast_ref::<HorizonSolveError>()
            .is_some_and(HorizonSolveError::is_relaxable);
        if !(relax_on_failure && relaxable && inputs.has_storage()) {
            return Err(err);
        }

        warn!("{err}. Retrying without the end-of-horizon storage target.");
        self.reset();
        let options = HorizonOptions {
            enforce_end_charge: false,
        };
        self.solve(inputs, &options)
    }

    fn formulate_and_solve(
        &mut self,
        inputs: &HorizonInputs,
        options: &HorizonOptions,
    ) -> Result<Solution> {
        let mut problem = Problem::default();
        let variables = add_variables(&mut problem, self.model, inputs, options);
        let constraint_keys = add_constraints(&mut problem, &variables, self.model, inputs)?;
        debug!(
            "Horizon starting at {}: {} periods, {} variables, {} constraints",
            inputs.start(),
            inputs.len(),
            variables.len(),
            problem.num_rows()
        );

        self.phase = CemsPhase::Solving;
        let mut highs_model = problem.optimise(Sense::Minimise);
        self.configure(&mut highs_model);

        let solved = highs_model.try_solve().map_err(|status| {
            HorizonSolveError::SolverFailure {
                horizon_start: inputs.start(),
                status: format!("{status:?}"),
            }
        })?;
        check_status(solved.status(), inputs, self.options.time_limit)?;

        let solution = Solution {
            solution: solved.get_solution(),
            variables,
            constraint_keys,
        };
        debug!(
            "Horizon starting at {} solved with objective value {:.6}",
            inputs.start(),
            solution.objective_value()
        );

        Ok(solution)
    }

    /// Apply solver options which keep solutions reproducible
    fn configure(&self, model: &mut highs::Model) {
        model.set_option("output_flag", self.options.solver_output);
        model.set_option("log_to_console", self.options.solver_output);
        model.set_option("time_limit", self.options.time_limit);
        model.set_option("parallel", "off");
        model.set_option(
            "random_seed",
            i32::try_from(self.options.random_seed).unwrap_or(i32::MAX),
        );
    }
}
