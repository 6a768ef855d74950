//! Code for adding constraints to the horizon optimisation problem.
use super::balance::{BalanceKey, period_balances, resolve_terms};
use super::variables::{Owner, VariableKey, VariableMap};
use super::HorizonInputs;
use crate::carrier::Carrier;
use crate::error::HorizonSolveError;
use crate::model::Model;
use anyhow::Result;
use highs::RowProblem as Problem;
use strum::IntoEnumIterator;

/// Right-hand sides smaller than this are treated as zero when a row has no variables
const EMPTY_ROW_TOLERANCE: f64 = 1e-9;

/// Corresponding variables for a constraint along with the row offset in the solution
#[derive(Debug)]
pub struct KeysWithOffset<T> {
    offset: usize,
    keys: Vec<T>,
}

impl<T> KeysWithOffset<T> {
    /// Zip the keys with the corresponding dual values in the solution, accounting for the offset
    pub fn zip_duals<'a>(&'a self, duals: &'a [f64]) -> impl Iterator<Item = (&'a T, f64)> {
        assert!(
            self.offset + self.keys.len() <= duals.len(),
            "Bad constraint keys: dual rows out of range"
        );

        self.keys.iter().zip(duals[self.offset..].iter().copied())
    }
}

/// Indicates the agent (if any), carrier and period covered by each carrier balance constraint
pub type BalanceKeys = KeysWithOffset<BalanceKey>;

/// The keys for different constraints
#[derive(Debug)]
pub struct ConstraintKeys {
    /// Keys for community-wide carrier balances
    pub community_balance_keys: BalanceKeys,
    /// Keys for per-agent carrier balances
    pub agent_balance_keys: BalanceKeys,
}

/// Add all constraints for the horizon.
///
/// Note: the ordering of constraints is important, as the dual values of the balance constraints
/// must later be retrieved to calculate clearing prices.
///
/// # Returns
///
/// Keys for the balance constraints, or [`HorizonSolveError::Infeasible`] if some agent's fixed
/// demand has no variable which could possibly meet it.
pub fn add_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    model: &Model,
    inputs: &HorizonInputs,
) -> Result<ConstraintKeys> {
    let (community, agents): (Vec<_>, Vec<_>) = inputs
        .contributions
        .iter()
        .enumerate()
        .flat_map(|(t, contributions)| period_balances(&model.area, contributions, t))
        .partition(|(key, _, _)| key.agent_id.is_none());

    // Row offset in problem. This line **must** come before we add more constraints.
    let offset = problem.num_rows();
    let mut keys = Vec::new();
    for (key, terms, _) in community {
        let row = resolve_terms(&terms, variables);
        if row.is_empty() {
            continue;
        }

        problem.add_row(0.0..=0.0, row);
        keys.push(key);
    }
    let community_balance_keys = BalanceKeys { offset, keys };

    let offset = problem.num_rows();
    let mut keys = Vec::new();
    for (key, terms, demand) in agents {
        let row = resolve_terms(&terms, variables);
        if row.is_empty() {
            if demand.abs() > EMPTY_ROW_TOLERANCE {
                let period = &inputs.periods[key.period];
                return Err(HorizonSolveError::Infeasible {
                    horizon_start: inputs.periods[0].start,
                    reason: format!(
                        "{} demand of agent {} cannot be met at {}",
                        key.carrier,
                        key.agent_id.unwrap_or_else(|| "community".into()),
                        period.start
                    ),
                }
                .into());
            }
            continue;
        }

        problem.add_row(demand..=demand, row);
        keys.push(key);
    }
    let agent_balance_keys = BalanceKeys { offset, keys };

    add_conversion_constraints(problem, variables, inputs);
    add_storage_constraints(problem, variables, inputs);
    add_thermal_mass_constraints(problem, variables, inputs);
    add_chiller_constraints(problem, variables, model, inputs);
    if !model.area.local_market_enabled {
        add_grid_capacity_constraints(problem, variables, model, inputs);
    }

    Ok(ConstraintKeys {
        community_balance_keys,
        agent_balance_keys,
    })
}

/// Look up variables which must exist because the corresponding bounds were given
fn vars<const N: usize>(variables: &VariableMap, keys: [VariableKey; N]) -> Option<[highs::Col; N]> {
    let mut cols = Vec::with_capacity(N);
    for key in &keys {
        cols.push(variables.get(key)?);
    }
    cols.try_into().ok()
}

/// Link heat pump and booster pump outputs to their electricity input via the COP
fn add_conversion_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    inputs: &HorizonInputs,
) {
    for (t, contributions) in inputs.contributions.iter().enumerate() {
        for (agent_id, contribution) in contributions {
            let id = || agent_id.clone();
            if let Some(hp) = contribution.heat_pump {
                let keys = [
                    VariableKey::HeatPumpInput {
                        agent_id: id(),
                        period: t,
                    },
                    VariableKey::HeatPumpOutput {
                        agent_id: id(),
                        period: t,
                    },
                ];
                if let Some([input, output]) = vars(variables, keys) {
                    problem.add_row(0.0..=0.0, [(output, 1.0), (input, -hp.cop)]);

                    let cooling = VariableKey::HeatPumpCooling {
                        agent_id: id(),
                        period: t,
                    };
                    if let (Some(per_input), Some(cooling)) =
                        (hp.cooling_per_input, variables.get(&cooling))
                    {
                        problem.add_row(..=0.0, [(cooling, 1.0), (input, -per_input)]);
                    }
                }
            }

            if let Some(booster) = contribution.booster_pump {
                let keys = [
                    VariableKey::BoosterInput {
                        agent_id: id(),
                        period: t,
                    },
                    VariableKey::BoosterOutput {
                        agent_id: id(),
                        period: t,
                    },
                ];
                if let Some([input, output]) = vars(variables, keys) {
                    problem.add_row(0.0..=0.0, [(output, 1.0), (input, -booster.cop)]);
                }
            }
        }
    }
}

/// Add state-of-charge dynamics and the simultaneous charge/discharge limit.
///
/// `level[t] - level[t-1] - sqrt(eff) * charge[t] + discharge[t] / sqrt(eff) = 0`, with the
/// initial level moved to the right-hand side for the leading period.
fn add_storage_constraints(problem: &mut Problem, variables: &VariableMap, inputs: &HorizonInputs) {
    for (t, contributions) in inputs.contributions.iter().enumerate() {
        for (agent_id, contribution) in contributions {
            for (&store, storage) in &contribution.storage {
                let id = || agent_id.clone();
                let keys = [
                    VariableKey::Charge {
                        agent_id: id(),
                        store,
                        period: t,
                    },
                    VariableKey::Discharge {
                        agent_id: id(),
                        store,
                        period: t,
                    },
                    VariableKey::StorageLevel {
                        agent_id: id(),
                        store,
                        period: t,
                    },
                ];
                let Some([charge, discharge, level]) = vars(variables, keys) else {
                    continue;
                };

                let leg = storage.leg_efficiency();
                let mut row = vec![(level, 1.0), (charge, -leg), (discharge, 1.0 / leg)];
                let rhs = if t == 0 {
                    inputs.initial_level(agent_id, store)
                } else {
                    let previous = VariableKey::StorageLevel {
                        agent_id: id(),
                        store,
                        period: t - 1,
                    };
                    if let Some(previous) = variables.get(&previous) {
                        row.push((previous, -1.0));
                    }
                    0.0
                };
                problem.add_row(rhs..=rhs, row);

                if storage.max_charge > 0.0 && storage.max_discharge > 0.0 {
                    problem.add_row(
                        ..=1.0,
                        [
                            (charge, 1.0 / storage.max_charge),
                            (discharge, 1.0 / storage.max_discharge),
                        ],
                    );
                }
            }
        }
    }
}

/// Add the two-layer dynamics of heat stored in building structures.
///
/// Each layer keeps a fixed fraction of its previous content:
///
/// * `shallow[t] - k_s * shallow[t-1] - charge[t] + flow[t] = 0`
/// * `deep[t] - k_d * deep[t-1] - flow[t] = 0`
/// * `flow[t] - a * shallow[t] + b * deep[t] = 0`
///
/// where `a` and `b` are the conductance over each layer's capacity.
fn add_thermal_mass_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    inputs: &HorizonInputs,
) {
    for (t, contributions) in inputs.contributions.iter().enumerate() {
        for (agent_id, contribution) in contributions {
            let Some(mass) = contribution.thermal_mass else {
                continue;
            };

            let id = || agent_id.clone();
            let keys = [
                VariableKey::ThermalMassCharge {
                    agent_id: id(),
                    period: t,
                },
                VariableKey::ThermalMassFlow {
                    agent_id: id(),
                    period: t,
                },
                VariableKey::ShallowLevel {
                    agent_id: id(),
                    period: t,
                },
                VariableKey::DeepLevel {
                    agent_id: id(),
                    period: t,
                },
            ];
            let Some([charge, flow, shallow, deep]) = vars(variables, keys) else {
                continue;
            };

            let mut shallow_row = vec![(shallow, 1.0), (charge, -1.0), (flow, 1.0)];
            let mut deep_row = vec![(deep, 1.0), (flow, -1.0)];
            let (shallow_rhs, deep_rhs) = if t == 0 {
                let initial = inputs
                    .initial_thermal_mass
                    .get(agent_id)
                    .copied()
                    .unwrap_or_default();
                (
                    mass.shallow_retention * initial.shallow,
                    mass.deep_retention * initial.deep,
                )
            } else {
                let previous = [
                    VariableKey::ShallowLevel {
                        agent_id: id(),
                        period: t - 1,
                    },
                    VariableKey::DeepLevel {
                        agent_id: id(),
                        period: t - 1,
                    },
                ];
                if let Some([prev_shallow, prev_deep]) = vars(variables, previous) {
                    shallow_row.push((prev_shallow, -mass.shallow_retention));
                    deep_row.push((prev_deep, -mass.deep_retention));
                }
                (0.0, 0.0)
            };
            problem.add_row(shallow_rhs..=shallow_rhs, shallow_row);
            problem.add_row(deep_rhs..=deep_rhs, deep_row);

            let mut flow_row = vec![(flow, 1.0)];
            if let Some((a, b)) = mass.flow_coefficients() {
                flow_row.extend([(shallow, -a), (deep, b)]);
            }
            problem.add_row(0.0..=0.0, flow_row);
        }
    }
}

/// Limit the chiller's recovered heat to what it rejects
fn add_chiller_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    model: &Model,
    inputs: &HorizonInputs,
) {
    let rejected_per_input = 1.0 + model.area.comp_chiller_cop;
    for t in 0..inputs.len() {
        let keys = [
            VariableKey::ChillerInput { period: t },
            VariableKey::ChillerHeat { period: t },
        ];
        if let Some([input, heat]) = vars(variables, keys) {
            problem.add_row(..=0.0, [(heat, 1.0), (input, -rejected_per_input)]);
        }
    }
}

/// With no local market, agents share the grid connection's transfer rate
fn add_grid_capacity_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    model: &Model,
    inputs: &HorizonInputs,
) {
    for (t, contributions) in inputs.contributions.iter().enumerate() {
        for carrier in Carrier::iter() {
            let Some(rate) = model.grid_transfer_rate(carrier) else {
                continue;
            };

            let imports: Vec<_> = contributions
                .keys()
                .filter_map(|agent_id| {
                    variables.get(&VariableKey::Import {
                        owner: Owner::Agent(agent_id.clone()),
                        carrier,
                        period: t,
                    })
                })
                .map(|var| (var, 1.0))
                .collect();
            let exports: Vec<_> = contributions
                .keys()
                .filter_map(|agent_id| {
                    variables.get(&VariableKey::Export {
                        owner: Owner::Agent(agent_id.clone()),
                        carrier,
                        period: t,
                    })
                })
                .map(|var| (var, 1.0))
                .collect();

            for row in [imports, exports] {
                if row.len() > 1 {
                    problem.add_row(..=rate, row);
                }
            }
        }
    }
}
