//! Decision variables for the horizon optimisation.
use super::{HorizonInputs, HorizonOptions};
use crate::agent::{AgentID, PeriodContribution, Store};
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::horizon::HeatPumpMode;
use crate::model::Model;
use highs::RowProblem as Problem;
use indexmap::IndexMap;
use std::ops::RangeBounds;
use strum::IntoEnumIterator;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
pub type Variable = highs::Col;

/// Who exchanges energy with the external grid
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The community as a whole (local market enabled)
    Community,
    /// A single agent (local market disabled)
    Agent(AgentID),
}

/// Identifies a variable by what it represents.
///
/// `period` is the offset of the period within the horizon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Energy bought from the local market
    Buy {
        /// The buyer
        agent_id: AgentID,
        /// The carrier bought
        carrier: Carrier,
        /// Period offset within the horizon
        period: usize,
    },
    /// Energy sold to the local market, before transfer losses
    Sell {
        /// The seller
        agent_id: AgentID,
        /// The carrier sold
        carrier: Carrier,
        /// Period offset within the horizon
        period: usize,
    },
    /// Energy imported from the external grid
    Import {
        /// The importer
        owner: Owner,
        /// The carrier imported
        carrier: Carrier,
        /// Period offset within the horizon
        period: usize,
    },
    /// Energy exported to the external grid
    Export {
        /// The exporter
        owner: Owner,
        /// The carrier exported
        carrier: Carrier,
        /// Period offset within the horizon
        period: usize,
    },
    /// Surplus low-temperature heat or cooling discarded by an agent
    Dump {
        /// The agent
        agent_id: AgentID,
        /// The carrier discarded
        carrier: Carrier,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat pump electricity input
    HeatPumpInput {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat pump heat output
    HeatPumpOutput {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Cooling delivered by the cold side of a heat pump
    HeatPumpCooling {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Booster pump electricity input
    BoosterInput {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Booster pump high-temperature heat output
    BoosterOutput {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// High-temperature heat used to cover low-temperature demand
    HeatExchange {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Energy drawn from the agent's balance to charge one of its stores
    Charge {
        /// The agent
        agent_id: AgentID,
        /// The store
        store: Store,
        /// Period offset within the horizon
        period: usize,
    },
    /// Energy delivered to the agent's balance by discharging one of its stores
    Discharge {
        /// The agent
        agent_id: AgentID,
        /// The store
        store: Store,
        /// Period offset within the horizon
        period: usize,
    },
    /// Store level at the end of the period
    StorageLevel {
        /// The agent
        agent_id: AgentID,
        /// The store
        store: Store,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat pushed into a building's structure (negative when drawn out)
    ThermalMassCharge {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat moving from the shallow to the deep layer of a building's structure
    ThermalMassFlow {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat in the shallow layer at the end of the period
    ShallowLevel {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Heat in the deep layer at the end of the period
    DeepLevel {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Output of a dispatchable heat producer
    HeatProduction {
        /// The agent
        agent_id: AgentID,
        /// Period offset within the horizon
        period: usize,
    },
    /// Community compression chiller electricity input
    ChillerInput {
        /// Period offset within the horizon
        period: usize,
    },
    /// Low-temperature heat recovered from the community chiller (summer only)
    ChillerHeat {
        /// Period offset within the horizon
        period: usize,
    },
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered (see [`IndexMap`]) and the order matches the order of columns in the
/// problem.
#[derive(Default, Debug)]
pub struct VariableMap {
    variables: IndexMap<VariableKey, Variable>,
    costs: Vec<f64>,
}

impl VariableMap {
    /// Add a column to the problem along with its key
    fn add<B: RangeBounds<f64>>(
        &mut self,
        problem: &mut Problem,
        key: VariableKey,
        cost: f64,
        bounds: B,
    ) -> Variable {
        let var = problem.add_column(cost, bounds);
        let existing = self.variables.insert(key, var).is_some();
        assert!(!existing, "Duplicate entry for var");
        self.costs.push(cost);

        var
    }

    /// Get the [`Variable`] for a key, if there is one
    pub fn get(&self, key: &VariableKey) -> Option<Variable> {
        self.variables.get(key).copied()
    }

    /// Get the column index for a key, if there is one
    pub fn index_of(&self, key: &VariableKey) -> Option<usize> {
        self.variables.get_index_of(key)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Evaluate the objective function for the given column values
    pub fn objective_value(&self, columns: &[f64]) -> f64 {
        self.costs.iter().zip(columns).map(|(c, x)| c * x).sum()
    }
}

/// Add variables to the optimisation problem.
///
/// # Arguments
///
/// * `problem` - The optimisation problem
/// * `model` - The model
/// * `inputs` - Agent contributions and prices for each period of the horizon
/// * `options` - Options for this solve
///
/// # Returns
///
/// A [`VariableMap`] with the problem's variables as values.
pub fn add_variables(
    problem: &mut Problem,
    model: &Model,
    inputs: &HorizonInputs,
    options: &HorizonOptions,
) -> VariableMap {
    let mut variables = VariableMap::default();
    let last = inputs.len().saturating_sub(1);

    for (t, contributions) in inputs.contributions.iter().enumerate() {
        for (agent_id, contribution) in contributions {
            add_trade_variables(&mut variables, problem, model, inputs, agent_id, contribution, t);
            add_device_variables(
                &mut variables,
                problem,
                &model.area,
                agent_id,
                contribution,
                t,
                options.enforce_end_charge && t == last,
            );
        }

        if model.area.local_market_enabled {
            add_community_variables(&mut variables, problem, model, inputs, t);
        }
    }

    variables
}

fn add_trade_variables(
    variables: &mut VariableMap,
    problem: &mut Problem,
    model: &Model,
    inputs: &HorizonInputs,
    agent_id: &AgentID,
    contribution: &PeriodContribution,
    t: usize,
) {
    let area = &model.area;
    let prices = &inputs.prices[t];
    let (tax, fee) = area.internal_electricity_charges();

    for carrier in Carrier::iter().filter(|c| contribution.uses_carrier(*c)) {
        if area.local_market_enabled {
            let capacity = area.transfer_capacity(carrier);
            let sell_cost = if carrier == Carrier::Electricity {
                tax + fee
            } else {
                0.0
            };
            let key = VariableKey::Buy {
                agent_id: agent_id.clone(),
                carrier,
                period: t,
            };
            variables.add(problem, key, 0.0, 0.0..=capacity);
            let key = VariableKey::Sell {
                agent_id: agent_id.clone(),
                carrier,
                period: t,
            };
            variables.add(problem, key, sell_cost, 0.0..=capacity);
        } else if let Some(rate) = model.grid_transfer_rate(carrier) {
            let owner = Owner::Agent(agent_id.clone());
            if let Some(price) = prices.import_price(carrier) {
                let key = VariableKey::Import {
                    owner: owner.clone(),
                    carrier,
                    period: t,
                };
                variables.add(problem, key, price, 0.0..=rate);
            }
            if let Some(price) = prices.export_price(carrier) {
                let key = VariableKey::Export {
                    owner,
                    carrier,
                    period: t,
                };
                variables.add(problem, key, -price, 0.0..=rate);
            }
        }

        if carrier.can_be_dumped() {
            let key = VariableKey::Dump {
                agent_id: agent_id.clone(),
                carrier,
                period: t,
            };
            variables.add(problem, key, 0.0, 0.0..);
        }
    }
}

fn add_device_variables(
    variables: &mut VariableMap,
    problem: &mut Problem,
    area: &AreaInfo,
    agent_id: &AgentID,
    contribution: &PeriodContribution,
    t: usize,
    is_end_of_horizon: bool,
) {
    let id = || agent_id.clone();

    if let Some(hp) = contribution.heat_pump {
        let key = VariableKey::HeatPumpInput {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=hp.max_input);
        let key = VariableKey::HeatPumpOutput {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=hp.max_output);
        if hp.cooling_per_input.is_some() {
            let key = VariableKey::HeatPumpCooling {
                agent_id: id(),
                period: t,
            };
            variables.add(problem, key, 0.0, 0.0..);
        }
    }

    if let Some(booster) = contribution.booster_pump {
        let key = VariableKey::BoosterInput {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=booster.max_input);
        let key = VariableKey::BoosterOutput {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=booster.max_output);
    }

    if contribution.heat_exchange {
        let key = VariableKey::HeatExchange {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..);
    }

    for (&store, storage) in &contribution.storage {
        let key = VariableKey::Charge {
            agent_id: id(),
            store,
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=storage.max_charge);
        let key = VariableKey::Discharge {
            agent_id: id(),
            store,
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=storage.max_discharge);

        let (lower, upper) = if is_end_of_horizon {
            let (lo, hi) = area.end_charge_bounds();
            (lo * storage.capacity, hi * storage.capacity)
        } else {
            (0.0, storage.capacity)
        };
        let key = VariableKey::StorageLevel {
            agent_id: id(),
            store,
            period: t,
        };
        variables.add(problem, key, 0.0, lower..=upper);
    }

    // The structure has no end-of-horizon target
    if let Some(mass) = contribution.thermal_mass {
        let key = VariableKey::ThermalMassCharge {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, -mass.max_discharge..=mass.max_charge);
        let key = VariableKey::ThermalMassFlow {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, ..);
        let key = VariableKey::ShallowLevel {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=mass.shallow_capacity);
        let key = VariableKey::DeepLevel {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, 0.0, 0.0..=mass.deep_capacity);
    }

    if let Some(production) = contribution.heat_production {
        let key = VariableKey::HeatProduction {
            agent_id: id(),
            period: t,
        };
        variables.add(problem, key, production.cost, 0.0..=production.max_output);
    }
}

fn add_community_variables(
    variables: &mut VariableMap,
    problem: &mut Problem,
    model: &Model,
    inputs: &HorizonInputs,
    t: usize,
) {
    let prices = &inputs.prices[t];
    for carrier in Carrier::iter() {
        let Some(rate) = model.grid_transfer_rate(carrier) else {
            continue;
        };

        if let Some(price) = prices.import_price(carrier) {
            let key = VariableKey::Import {
                owner: Owner::Community,
                carrier,
                period: t,
            };
            variables.add(problem, key, price, 0.0..=rate);
        }
        if let Some(price) = prices.export_price(carrier) {
            let key = VariableKey::Export {
                owner: Owner::Community,
                carrier,
                period: t,
            };
            variables.add(problem, key, -price, 0.0..=rate);
        }
    }

    let area = &model.area;
    if area.comp_chiller_max_input > 0.0 {
        let key = VariableKey::ChillerInput { period: t };
        variables.add(problem, key, 0.0, 0.0..=area.comp_chiller_max_input);
        if inputs.periods[t].heat_pump_mode() == HeatPumpMode::LowTemp {
            variables.add(problem, VariableKey::ChillerHeat { period: t }, 0.0, 0.0..);
        }
    }
}
