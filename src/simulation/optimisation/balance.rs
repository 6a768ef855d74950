//! Terms of the carrier balance rows.
//!
//! The same terms are used to build the rows and to check the committed dispatch afterwards, so
//! they are expressed in terms of [`VariableKey`]s rather than columns. Terms whose variable was
//! never added to the problem (e.g. an import with no grid connection) are dropped on resolution.
use super::variables::{Owner, VariableKey, VariableMap};
use crate::agent::{AgentID, PeriodContribution};
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use indexmap::IndexMap;
use strum::IntoEnumIterator;

/// Linear terms of a row, as (variable, coefficient) pairs
pub type BalanceTerms = Vec<(VariableKey, f64)>;

/// Identifies a carrier balance row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    /// The agent, or `None` for the community-wide balance
    pub agent_id: Option<AgentID>,
    /// The carrier balanced
    pub carrier: Carrier,
    /// Period offset within the horizon
    pub period: usize,
}

/// Terms of an agent's balance for `carrier`.
///
/// The row reads `terms = net demand`: energy the agent obtains (bought, imported, converted or
/// discharged) minus energy it gives up must cover its fixed demand.
pub fn agent_balance_terms(
    agent_id: &AgentID,
    carrier: Carrier,
    contribution: &PeriodContribution,
    period: usize,
) -> BalanceTerms {
    let agent_id = agent_id.clone();
    let owner = Owner::Agent(agent_id.clone());
    let mut terms = vec![
        (
            VariableKey::Buy {
                agent_id: agent_id.clone(),
                carrier,
                period,
            },
            1.0,
        ),
        (
            VariableKey::Sell {
                agent_id: agent_id.clone(),
                carrier,
                period,
            },
            -1.0,
        ),
        (
            VariableKey::Import {
                owner: owner.clone(),
                carrier,
                period,
            },
            1.0,
        ),
        (
            VariableKey::Export {
                owner,
                carrier,
                period,
            },
            -1.0,
        ),
        (
            VariableKey::Dump {
                agent_id: agent_id.clone(),
                carrier,
                period,
            },
            -1.0,
        ),
    ];

    if let Some(hp) = contribution.heat_pump {
        if carrier == Carrier::Electricity {
            terms.push((
                VariableKey::HeatPumpInput {
                    agent_id: agent_id.clone(),
                    period,
                },
                -1.0,
            ));
        }
        if carrier == hp.output {
            terms.push((
                VariableKey::HeatPumpOutput {
                    agent_id: agent_id.clone(),
                    period,
                },
                1.0,
            ));
        }
        if carrier == Carrier::Cooling {
            terms.push((
                VariableKey::HeatPumpCooling {
                    agent_id: agent_id.clone(),
                    period,
                },
                1.0,
            ));
        }
    }

    if contribution.booster_pump.is_some() {
        let input = VariableKey::BoosterInput {
            agent_id: agent_id.clone(),
            period,
        };
        let output = VariableKey::BoosterOutput {
            agent_id: agent_id.clone(),
            period,
        };
        match carrier {
            Carrier::Electricity => terms.push((input, -1.0)),
            Carrier::HighTempHeat => terms.push((output, 1.0)),
            // The booster lifts (output - input) of low-temperature heat
            Carrier::LowTempHeat => terms.extend([(output, -1.0), (input, 1.0)]),
            Carrier::Cooling => {}
        }
    }

    if contribution.heat_exchange {
        let exchange = VariableKey::HeatExchange {
            agent_id: agent_id.clone(),
            period,
        };
        match carrier {
            Carrier::HighTempHeat => terms.push((exchange, -1.0)),
            Carrier::LowTempHeat => terms.push((exchange, 1.0)),
            _ => {}
        }
    }

    for (&store, _) in contribution
        .storage
        .iter()
        .filter(|(_, s)| s.carrier == carrier)
    {
        terms.push((
            VariableKey::Charge {
                agent_id: agent_id.clone(),
                store,
                period,
            },
            -1.0,
        ));
        terms.push((
            VariableKey::Discharge {
                agent_id: agent_id.clone(),
                store,
                period,
            },
            1.0,
        ));
    }

    if contribution.thermal_mass.is_some() && carrier == Carrier::LowTempHeat {
        terms.push((
            VariableKey::ThermalMassCharge {
                agent_id: agent_id.clone(),
                period,
            },
            -1.0,
        ));
    }

    if contribution
        .heat_production
        .is_some_and(|p| p.carrier == carrier)
    {
        terms.push((VariableKey::HeatProduction { agent_id, period }, 1.0));
    }

    terms
}

/// Terms of the community balance for `carrier`.
///
/// The row reads `terms = 0`: energy sold to the network (after transfer losses) plus external
/// imports and chiller output must equal what agents buy plus exports and chiller input.
pub fn community_balance_terms<'a, I>(
    area: &AreaInfo,
    agent_ids: I,
    carrier: Carrier,
    period: usize,
) -> BalanceTerms
where
    I: IntoIterator<Item = &'a AgentID>,
{
    let delivered = 1.0 - area.transfer_loss(carrier);
    let mut terms = BalanceTerms::new();
    for agent_id in agent_ids {
        terms.push((
            VariableKey::Sell {
                agent_id: agent_id.clone(),
                carrier,
                period,
            },
            delivered,
        ));
        terms.push((
            VariableKey::Buy {
                agent_id: agent_id.clone(),
                carrier,
                period,
            },
            -1.0,
        ));
    }

    terms.push((
        VariableKey::Import {
            owner: Owner::Community,
            carrier,
            period,
        },
        1.0,
    ));
    terms.push((
        VariableKey::Export {
            owner: Owner::Community,
            carrier,
            period,
        },
        -1.0,
    ));

    match carrier {
        Carrier::Electricity => terms.push((VariableKey::ChillerInput { period }, -1.0)),
        Carrier::Cooling => {
            terms.push((VariableKey::ChillerInput { period }, area.comp_chiller_cop));
        }
        Carrier::LowTempHeat => terms.push((VariableKey::ChillerHeat { period }, 1.0)),
        Carrier::HighTempHeat => {}
    }

    terms
}

/// Map terms onto the problem's columns, dropping variables which don't exist
pub fn resolve_terms(terms: &BalanceTerms, variables: &VariableMap) -> Vec<(highs::Col, f64)> {
    terms
        .iter()
        .filter_map(|(key, coeff)| variables.get(key).map(|var| (var, *coeff)))
        .collect()
}

/// Evaluate terms given the solved column values.
///
/// Variables which don't exist count as zero.
pub fn evaluate_terms(terms: &BalanceTerms, variables: &VariableMap, columns: &[f64]) -> f64 {
    terms
        .iter()
        .filter_map(|(key, coeff)| variables.index_of(key).map(|idx| coeff * columns[idx]))
        .sum()
}

/// All balance rows for one period of the horizon, with their right-hand sides.
///
/// Community rows come first, followed by one row per agent and carrier used.
pub fn period_balances(
    area: &AreaInfo,
    contributions: &IndexMap<AgentID, PeriodContribution>,
    period: usize,
) -> Vec<(BalanceKey, BalanceTerms, f64)> {
    let mut balances = Vec::new();
    if area.local_market_enabled {
        for carrier in Carrier::iter() {
            let terms = community_balance_terms(area, contributions.keys(), carrier, period);
            let key = BalanceKey {
                agent_id: None,
                carrier,
                period,
            };
            balances.push((key, terms, 0.0));
        }
    }

    for (agent_id, contribution) in contributions {
        for carrier in Carrier::iter() {
            if !contribution.uses_carrier(carrier) {
                continue;
            }

            let terms = agent_balance_terms(agent_id, carrier, contribution, period);
            let key = BalanceKey {
                agent_id: Some(agent_id.clone()),
                carrier,
                period,
            };
            balances.push((key, terms, contribution.net_demand(carrier)));
        }
    }

    balances
}
