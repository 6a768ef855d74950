//! The leading period's dispatch, extracted from a horizon solution.
use super::optimisation::balance::{BalanceKey, evaluate_terms, period_balances};
use super::optimisation::variables::{Owner, VariableKey};
use super::optimisation::{HorizonInputs, Solution};
use super::prices::external::ExternalPrices;
use crate::agent::{AgentID, Store, ThermalMassLevels};
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::horizon::TradingPeriod;
use indexmap::IndexMap;
use strum::IntoEnumIterator;

/// An agent's exchanges of one carrier in a period (kWh)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarrierFlows {
    /// Bought from the local market
    pub bought: f64,
    /// Sold to the local market, before losses
    pub sold: f64,
    /// Imported directly from the external grid
    pub imported: f64,
    /// Exported directly to the external grid
    pub exported: f64,
    /// Discarded surplus
    pub dumped: f64,
}

/// Input and output of a conversion device (kWh)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conversion {
    /// Electricity consumed
    pub input: f64,
    /// Heat delivered
    pub output: f64,
}

/// What a storage unit did in a period (kWh)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageDispatch {
    /// Energy drawn from the agent's balance
    pub charge: f64,
    /// Energy delivered to the agent's balance
    pub discharge: f64,
    /// Level at the end of the period
    pub level: f64,
}

/// What a building's structure did in a period (kWh)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalMassDispatch {
    /// Heat pushed into the structure (negative when drawn out)
    pub charge: f64,
    /// Heat moving from the shallow to the deep layer
    pub flow: f64,
    /// Heat in each layer at the end of the period
    pub levels: ThermalMassLevels,
}

/// An agent's committed decisions for a period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentDispatch {
    /// Exchanges per carrier
    pub flows: IndexMap<Carrier, CarrierFlows>,
    /// Heat pump operation
    pub heat_pump: Option<Conversion>,
    /// Cooling delivered by the heat pump
    pub heat_pump_cooling: f64,
    /// Booster pump operation
    pub booster_pump: Option<Conversion>,
    /// High-temperature heat used to cover low-temperature demand
    pub heat_exchange: f64,
    /// Operation of each store
    pub storage: IndexMap<Store, StorageDispatch>,
    /// Operation of the building's structure as a heat store
    pub thermal_mass: Option<ThermalMassDispatch>,
    /// Heat produced
    pub heat_production: f64,
}

impl AgentDispatch {
    /// Exchanges for a carrier (zero if the agent doesn't use it)
    pub fn flows(&self, carrier: Carrier) -> CarrierFlows {
        self.flows.get(&carrier).copied().unwrap_or_default()
    }
}

/// The community's exchanges with the external grid for one carrier (kWh)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridFlows {
    /// Imported from the grid
    pub imported: f64,
    /// Exported to the grid
    pub exported: f64,
}

/// The decisions committed for the leading period of a horizon
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDispatch {
    /// The committed period
    pub period: TradingPeriod,
    /// Whether agents traded with each other
    pub local_market: bool,
    /// Decisions of each participating agent
    pub agents: IndexMap<AgentID, AgentDispatch>,
    /// Community-level exchanges with the external grid
    pub community: IndexMap<Carrier, GridFlows>,
    /// Compression chiller electricity input
    pub chiller_input: f64,
    /// Low-temperature heat recovered from the chiller
    pub chiller_heat: f64,
    /// External prices in this period
    pub external_prices: ExternalPrices,
    /// Shadow prices of the community balances
    pub community_duals: IndexMap<Carrier, f64>,
    /// Shadow prices of agents' balances
    pub agent_duals: Vec<(BalanceKey, f64)>,
    /// How far each balance is from holding (kWh)
    pub balance_residuals: Vec<(BalanceKey, f64)>,
    /// Objective value for the whole horizon
    pub objective_value: f64,
}

impl CommittedDispatch {
    /// Extract the leading period from a horizon solution
    pub fn from_solution(area: &AreaInfo, inputs: &HorizonInputs, solution: &Solution) -> Self {
        let period = 0;
        let agents = inputs.contributions[period]
            .iter()
            .map(|(agent_id, contribution)| {
                let id = || agent_id.clone();
                let flows = Carrier::iter()
                    .filter(|c| contribution.uses_carrier(*c))
                    .map(|carrier| {
                        let owner = Owner::Agent(id());
                        let flows = CarrierFlows {
                            bought: solution.value(&VariableKey::Buy {
                                agent_id: id(),
                                carrier,
                                period,
                            }),
                            sold: solution.value(&VariableKey::Sell {
                                agent_id: id(),
                                carrier,
                                period,
                            }),
                            imported: solution.value(&VariableKey::Import {
                                owner: owner.clone(),
                                carrier,
                                period,
                            }),
                            exported: solution.value(&VariableKey::Export {
                                owner,
                                carrier,
                                period,
                            }),
                            dumped: solution.value(&VariableKey::Dump {
                                agent_id: id(),
                                carrier,
                                period,
                            }),
                        };
                        (carrier, flows)
                    })
                    .collect();

                let dispatch = AgentDispatch {
                    flows,
                    heat_pump: contribution.heat_pump.map(|_| Conversion {
                        input: solution.value(&VariableKey::HeatPumpInput {
                            agent_id: id(),
                            period,
                        }),
                        output: solution.value(&VariableKey::HeatPumpOutput {
                            agent_id: id(),
                            period,
                        }),
                    }),
                    heat_pump_cooling: solution.value(&VariableKey::HeatPumpCooling {
                        agent_id: id(),
                        period,
                    }),
                    booster_pump: contribution.booster_pump.map(|_| Conversion {
                        input: solution.value(&VariableKey::BoosterInput {
                            agent_id: id(),
                            period,
                        }),
                        output: solution.value(&VariableKey::BoosterOutput {
                            agent_id: id(),
                            period,
                        }),
                    }),
                    heat_exchange: solution.value(&VariableKey::HeatExchange {
                        agent_id: id(),
                        period,
                    }),
                    storage: contribution
                        .storage
                        .keys()
                        .map(|&store| {
                            let dispatch = StorageDispatch {
                                charge: solution.value(&VariableKey::Charge {
                                    agent_id: id(),
                                    store,
                                    period,
                                }),
                                discharge: solution.value(&VariableKey::Discharge {
                                    agent_id: id(),
                                    store,
                                    period,
                                }),
                                level: solution.value(&VariableKey::StorageLevel {
                                    agent_id: id(),
                                    store,
                                    period,
                                }),
                            };
                            (store, dispatch)
                        })
                        .collect(),
                    thermal_mass: contribution.thermal_mass.map(|_| ThermalMassDispatch {
                        charge: solution.value(&VariableKey::ThermalMassCharge {
                            agent_id: id(),
                            period,
                        }),
                        flow: solution.value(&VariableKey::ThermalMassFlow {
                            agent_id: id(),
                            period,
                        }),
                        levels: ThermalMassLevels {
                            shallow: solution.value(&VariableKey::ShallowLevel {
                                agent_id: id(),
                                period,
                            }),
                            deep: solution.value(&VariableKey::DeepLevel {
                                agent_id: id(),
                                period,
                            }),
                        },
                    }),
                    heat_production: solution.value(&VariableKey::HeatProduction {
                        agent_id: id(),
                        period,
                    }),
                };
                (id(), dispatch)
            })
            .collect();

        let community = Carrier::iter()
            .map(|carrier| {
                let flows = GridFlows {
                    imported: solution.value(&VariableKey::Import {
                        owner: Owner::Community,
                        carrier,
                        period,
                    }),
                    exported: solution.value(&VariableKey::Export {
                        owner: Owner::Community,
                        carrier,
                        period,
                    }),
                };
                (carrier, flows)
            })
            .collect();

        let balance_residuals = period_balances(area, &inputs.contributions[period], period)
            .into_iter()
            .map(|(key, terms, rhs)| {
                let lhs = evaluate_terms(&terms, solution.variables(), solution.columns());
                (key, lhs - rhs)
            })
            .collect();

        Self {
            period: inputs.periods[period],
            local_market: area.local_market_enabled,
            agents,
            community,
            chiller_input: solution.value(&VariableKey::ChillerInput { period }),
            chiller_heat: solution.value(&VariableKey::ChillerHeat { period }),
            external_prices: inputs.prices[period],
            community_duals: solution
                .iter_community_duals()
                .filter(|(key, _)| key.period == period)
                .map(|(key, dual)| (key.carrier, dual))
                .collect(),
            agent_duals: solution
                .iter_agent_duals()
                .filter(|(key, _)| key.period == period)
                .map(|(key, dual)| (key.clone(), dual))
                .collect(),
            balance_residuals,
            objective_value: solution.objective_value(),
        }
    }

    /// Iterate over the level of every store at the end of the period
    pub fn iter_storage_levels(&self) -> impl Iterator<Item = (&AgentID, Store, f64)> {
        self.agents.iter().flat_map(|(id, dispatch)| {
            dispatch
                .storage
                .iter()
                .map(move |(&store, s)| (id, store, s.level))
        })
    }

    /// Iterate over the heat held in each building's structure at the end of the period
    pub fn iter_thermal_mass_levels(&self) -> impl Iterator<Item = (&AgentID, ThermalMassLevels)> {
        self.agents
            .iter()
            .filter_map(|(id, dispatch)| dispatch.thermal_mass.map(|m| (id, m.levels)))
    }

    /// Total import of `carrier` from the external grid by the community and all agents
    pub fn total_import(&self, carrier: Carrier) -> f64 {
        let community = self.community.get(&carrier).map_or(0.0, |f| f.imported);
        community
            + self
                .agents
                .values()
                .map(|a| a.flows(carrier).imported)
                .sum::<f64>()
    }

    /// Total export of `carrier` to the external grid by the community and all agents
    pub fn total_export(&self, carrier: Carrier) -> f64 {
        let community = self.community.get(&carrier).map_or(0.0, |f| f.exported);
        community
            + self
                .agents
                .values()
                .map(|a| a.flows(carrier).exported)
                .sum::<f64>()
    }

    /// Energy of `carrier` delivered from one agent to another (kWh)
    pub fn internal_exchange(&self, area: &AreaInfo, carrier: Carrier) -> f64 {
        let delivered: f64 = self
            .agents
            .values()
            .map(|a| a.flows(carrier).sold * (1.0 - area.transfer_loss(carrier)))
            .sum();
        let bought: f64 = self.agents.values().map(|a| a.flows(carrier).bought).sum();

        delivered.min(bought)
    }

    /// The largest violation of any carrier balance (kWh)
    pub fn max_balance_residual(&self) -> f64 {
        self.balance_residuals
            .iter()
            .map(|(_, residual)| residual.abs())
            .fold(0.0, f64::max)
    }
}
