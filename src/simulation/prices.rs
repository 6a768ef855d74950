//! Clearing prices and settlement of the committed period.
use super::dispatch::CommittedDispatch;
use crate::carrier::Carrier;
use crate::model::Model;
use crate::trade::{MIN_TRADE_QUANTITY, Market, TradeContext, TradeRecord};
use log::warn;
use serde::Serialize;
use strum::IntoEnumIterator;

pub mod external;

/// The price of a carrier inside the community for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearingPrice {
    /// Index of the trading period
    pub period: usize,
    /// Start of the trading period
    pub datetime: chrono::NaiveDateTime,
    /// The carrier
    pub carrier: Carrier,
    /// Price (SEK/kWh)
    pub price: f64,
    /// Energy delivered between agents (kWh)
    pub internal_exchange: f64,
}

/// Derive the clearing price of each carrier for the committed period.
///
/// With a local market these are the shadow prices of the community balances. Without one,
/// agents only face external prices, so those are reported for the importable carriers.
pub fn clearing_prices(model: &Model, dispatch: &CommittedDispatch) -> Vec<ClearingPrice> {
    let period = &dispatch.period;
    let price = |carrier, price, internal_exchange| ClearingPrice {
        period: period.index,
        datetime: period.start,
        carrier,
        price,
        internal_exchange,
    };

    if !dispatch.local_market {
        return [Carrier::Electricity, Carrier::HighTempHeat]
            .into_iter()
            .filter_map(|c| {
                let import = dispatch.external_prices.import_price(c)?;
                Some(price(c, import, 0.0))
            })
            .collect();
    }

    dispatch
        .community_duals
        .iter()
        .map(|(&carrier, &dual)| {
            price(
                carrier,
                dual,
                dispatch.internal_exchange(&model.area, carrier),
            )
        })
        .collect()
}

/// Write one trade record per agent per carrier traded in the committed period.
///
/// Local trades are netted per agent and priced at the clearing price. The external grid agent
/// receives a mirror record for the community's net exchange with the grid.
pub fn settle(
    model: &Model,
    dispatch: &CommittedDispatch,
    clearing: &[ClearingPrice],
) -> Vec<TradeRecord> {
    let period = &dispatch.period;
    let area = &model.area;
    let (tax, fee) = area.internal_electricity_charges();
    let mut trades = Vec::new();

    for (agent_id, agent) in &dispatch.agents {
        for (&carrier, flows) in &agent.flows {
            let market = if dispatch.local_market {
                Market::Local
            } else {
                Market::External
            };
            let context = TradeContext {
                period: period.index,
                datetime: period.start,
                agent_id,
                carrier,
                market,
            };

            let trade = if dispatch.local_market {
                let Some(price) = clearing.iter().find(|p| p.carrier == carrier) else {
                    continue;
                };
                let net = flows.bought - flows.sold;
                let loss = area.transfer_loss(carrier);
                if net >= 0.0 {
                    TradeRecord::buy(&context, net, loss, price.price)
                } else {
                    let charges = if carrier == Carrier::Electricity {
                        (tax, fee)
                    } else {
                        (0.0, 0.0)
                    };
                    TradeRecord::sell(&context, -net, loss, price.price, charges)
                }
            } else {
                let prices = &dispatch.external_prices;
                let net = flows.imported - flows.exported;
                if net >= 0.0 {
                    prices
                        .import_price(carrier)
                        .and_then(|price| TradeRecord::buy(&context, net, 0.0, price))
                } else {
                    prices
                        .export_price(carrier)
                        .and_then(|price| TradeRecord::sell(&context, -net, 0.0, price, (0.0, 0.0)))
                }
            };
            trades.extend(trade);
        }
    }

    trades.extend(grid_trades(model, dispatch));
    trades
}

/// Mirror records for the grid agents
fn grid_trades<'a>(
    model: &'a Model,
    dispatch: &'a CommittedDispatch,
) -> impl Iterator<Item = TradeRecord> + 'a {
    let period = dispatch.period;
    Carrier::iter().filter_map(move |carrier| {
        let grid = model.grid_agent(carrier)?;
        let context = TradeContext {
            period: period.index,
            datetime: period.start,
            agent_id: &grid.id,
            carrier,
            market: Market::External,
        };

        // The grid sells what the community imports
        let prices = &dispatch.external_prices;
        let net = dispatch.total_export(carrier) - dispatch.total_import(carrier);
        if net.abs() < MIN_TRADE_QUANTITY {
            return None;
        }

        if net > 0.0 {
            let Some(price) = prices.export_price(carrier) else {
                warn!("Grid agent {} received {carrier} it cannot pay for", grid.id);
                return None;
            };
            TradeRecord::buy(&context, net, 0.0, price)
        } else {
            let price = prices.import_price(carrier)?;
            TradeRecord::sell(&context, -net, 0.0, price, (0.0, 0.0))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentID;
    use crate::fixture::{datetime, grid_model};
    use crate::horizon::TradingPeriod;
    use crate::simulation::dispatch::{AgentDispatch, CarrierFlows, GridFlows};
    use crate::simulation::prices::external::ExternalPrices;
    use crate::simulation::state::EffectFeeTracker;
    use float_cmp::assert_approx_eq;
    use indexmap::IndexMap;
    use rstest::rstest;

    fn dispatch(model: &Model, agents: IndexMap<AgentID, AgentDispatch>) -> CommittedDispatch {
        let period = TradingPeriod::new(datetime(3, 1, 0), 0);
        let prices =
            ExternalPrices::calculate(&model.area, period.start, 0.4, &EffectFeeTracker::default());
        CommittedDispatch {
            period,
            local_market: model.area.local_market_enabled,
            agents,
            community: IndexMap::new(),
            chiller_input: 0.0,
            chiller_heat: 0.0,
            external_prices: prices,
            community_duals: IndexMap::from([(Carrier::Electricity, 0.9)]),
            agent_duals: Vec::new(),
            balance_residuals: Vec::new(),
            objective_value: 0.0,
        }
    }

    fn flows(carrier: Carrier, flows: CarrierFlows) -> AgentDispatch {
        AgentDispatch {
            flows: IndexMap::from([(carrier, flows)]),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_local_trades_are_netted(grid_model: Model) {
        let agents = IndexMap::from([
            (
                "Seller".into(),
                flows(
                    Carrier::Electricity,
                    CarrierFlows {
                        sold: 6.0,
                        bought: 1.0,
                        ..Default::default()
                    },
                ),
            ),
            (
                "Buyer".into(),
                flows(
                    Carrier::Electricity,
                    CarrierFlows {
                        bought: 5.0,
                        ..Default::default()
                    },
                ),
            ),
        ]);
        let mut dispatch = dispatch(&grid_model, agents);
        dispatch.community.insert(Carrier::Electricity, GridFlows::default());

        let clearing = clearing_prices(&grid_model, &dispatch);
        assert_eq!(clearing.len(), 1);
        assert_approx_eq!(f64, clearing[0].price, 0.9);
        assert_approx_eq!(f64, clearing[0].internal_exchange, 6.0);

        let trades = settle(&grid_model, &dispatch, &clearing);
        assert_eq!(trades.len(), 2);
        let seller = &trades[0];
        assert_eq!(seller.market, Market::Local);
        assert_approx_eq!(f64, seller.quantity.value(), -5.0);
        let expected_tax = 5.0 * grid_model.area.electricity_tax_internal;
        assert_approx_eq!(f64, seller.tax_paid.value(), expected_tax, epsilon = 1e-6);
        assert_approx_eq!(f64, trades[1].quantity.value(), 5.0);
    }

    #[rstest]
    fn test_heat_buyer_pays_for_transfer_loss(mut grid_model: Model) {
        grid_model.area.heat_transfer_loss = 0.05;
        let agents = IndexMap::from([
            (
                "Seller".into(),
                flows(
                    Carrier::HighTempHeat,
                    CarrierFlows {
                        sold: 10.0,
                        ..Default::default()
                    },
                ),
            ),
            (
                "Buyer".into(),
                flows(
                    Carrier::HighTempHeat,
                    CarrierFlows {
                        bought: 9.5,
                        ..Default::default()
                    },
                ),
            ),
        ]);
        let mut dispatch = dispatch(&grid_model, agents);
        dispatch.community_duals = IndexMap::from([(Carrier::HighTempHeat, 0.6)]);

        let clearing = clearing_prices(&grid_model, &dispatch);
        let trades = settle(&grid_model, &dispatch, &clearing);
        let seller = &trades[0];
        assert_approx_eq!(f64, seller.quantity_pre_loss.value(), 10.0);
        assert_approx_eq!(f64, seller.quantity_post_loss.value(), 9.5);
        assert_approx_eq!(f64, seller.net_cost().value(), -0.6 * 9.5, epsilon = 1e-9);

        let buyer = &trades[1];
        assert!(buyer.is_buy());
        assert_approx_eq!(f64, buyer.quantity.value(), 9.5);
        assert_approx_eq!(f64, buyer.quantity_pre_loss.value(), 10.0);
        assert_approx_eq!(f64, buyer.quantity_post_loss.value(), 9.5);
        assert_approx_eq!(f64, buyer.net_cost().value(), 0.6 * 10.0, epsilon = 1e-9);
    }

    #[rstest]
    fn test_grid_mirrors_community_import(grid_model: Model) {
        let agents = IndexMap::from([(
            "Building".into(),
            flows(
                Carrier::Electricity,
                CarrierFlows {
                    bought: 4.0,
                    ..Default::default()
                },
            ),
        )]);
        let mut dispatch = dispatch(&grid_model, agents);
        dispatch.community.insert(
            Carrier::Electricity,
            GridFlows {
                imported: 4.0,
                exported: 0.0,
            },
        );

        let clearing = clearing_prices(&grid_model, &dispatch);
        let trades = settle(&grid_model, &dispatch, &clearing);
        let grid = trades
            .iter()
            .find(|t| t.agent_id == AgentID::from("ElectricityGrid"))
            .unwrap();
        assert_eq!(grid.market, Market::External);
        assert_approx_eq!(f64, grid.quantity.value(), -4.0);
        assert_approx_eq!(
            f64,
            grid.price.value(),
            dispatch.external_prices.electricity_import,
            epsilon = 1e-6
        );
    }

    #[rstest]
    fn test_disabled_market_uses_external_prices(mut grid_model: Model) {
        grid_model.area.local_market_enabled = false;
        let agents = IndexMap::from([(
            "Building".into(),
            flows(
                Carrier::HighTempHeat,
                CarrierFlows {
                    imported: 3.0,
                    ..Default::default()
                },
            ),
        )]);
        let dispatch = dispatch(&grid_model, agents);

        let clearing = clearing_prices(&grid_model, &dispatch);
        assert!(clearing.iter().all(|p| p.internal_exchange == 0.0));
        let heat = clearing
            .iter()
            .find(|p| p.carrier == Carrier::HighTempHeat)
            .unwrap();
        assert_approx_eq!(f64, heat.price, dispatch.external_prices.heat_import);

        let trades = settle(&grid_model, &dispatch, &clearing);
        assert_eq!(trades[0].market, Market::External);
        assert_approx_eq!(f64, trades[0].quantity.value(), 3.0);
        assert_approx_eq!(f64, trades[1].quantity.value(), -3.0);
    }
}
