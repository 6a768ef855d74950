//! Trade records: the settled outcome of a committed period.
use crate::agent::AgentID;
use crate::carrier::Carrier;
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Quantities smaller than this (kWh) are not recorded
pub const MIN_TRADE_QUANTITY: f64 = 1e-6;

/// Number of decimal places kept in trade records
const DECIMAL_PLACES: i32 = 6;

/// Round a value to the precision kept in trade records
pub fn round_value(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES);
    let rounded = (value * scale).round() / scale;

    // Avoid writing "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Where a trade took place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// Between agents of the community
    Local,
    /// With the external grid
    External,
}

/// One agent's net trade of one carrier in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Index of the trading period
    pub period: usize,
    /// Start of the trading period
    pub datetime: NaiveDateTime,
    /// The trading agent
    pub agent_id: AgentID,
    /// The carrier traded
    pub carrier: Carrier,
    /// Net quantity: positive when buying, negative when selling
    pub quantity: Energy,
    /// Quantity before transfer losses (for buys, what had to leave the sellers)
    pub quantity_pre_loss: Energy,
    /// Quantity after transfer losses (for buys, the quantity received)
    pub quantity_post_loss: Energy,
    /// Price per kWh
    pub price: MoneyPerEnergy,
    /// The market traded on
    pub market: Market,
    /// Tax paid by the agent on this trade
    pub tax_paid: Money,
    /// Grid fee paid by the agent on this trade
    pub grid_fee_paid: Money,
}

/// The fixed part of a trade record
pub struct TradeContext<'a> {
    /// Index of the trading period
    pub period: usize,
    /// Start of the trading period
    pub datetime: NaiveDateTime,
    /// The trading agent
    pub agent_id: &'a AgentID,
    /// The carrier traded
    pub carrier: Carrier,
    /// The market traded on
    pub market: Market,
}

impl TradeRecord {
    /// Create a record for a purchase which delivers `quantity` at `price`.
    ///
    /// A fraction `loss` of what leaves the sellers is lost in transfer, so the buyer pays for
    /// `quantity / (1 - loss)`. Returns `None` if the quantity is too small to record.
    pub fn buy(context: &TradeContext, quantity: f64, loss: f64, price: f64) -> Option<Self> {
        (quantity >= MIN_TRADE_QUANTITY).then(|| {
            let received = Energy::new(quantity);
            let sent = received / Dimensionless(1.0 - loss);
            Self::new(
                context,
                quantity,
                sent.value(),
                quantity,
                price,
                (Money::new(0.0), Money::new(0.0)),
            )
        })
    }

    /// Create a record for a sale of `quantity`, of which `1 - loss` arrives at the buyer.
    ///
    /// `charges` are the tax and grid fee per kWh sold.
    pub fn sell(
        context: &TradeContext,
        quantity: f64,
        loss: f64,
        price: f64,
        charges: (f64, f64),
    ) -> Option<Self> {
        if quantity < MIN_TRADE_QUANTITY {
            return None;
        }

        let sold = Energy::new(quantity);
        let delivered = sold * Dimensionless(1.0 - loss);
        let (tax, fee) = charges;
        Some(Self::new(
            context,
            -quantity,
            quantity,
            delivered.value(),
            price,
            (
                MoneyPerEnergy::new(tax) * sold,
                MoneyPerEnergy::new(fee) * sold,
            ),
        ))
    }

    fn new(
        context: &TradeContext,
        quantity: f64,
        pre_loss: f64,
        post_loss: f64,
        price: f64,
        (tax_paid, grid_fee_paid): (Money, Money),
    ) -> Self {
        let energy = |value| Energy::new(round_value(value));
        let money = |value: Money| Money::new(round_value(value.value()));
        Self {
            period: context.period,
            datetime: context.datetime,
            agent_id: context.agent_id.clone(),
            carrier: context.carrier,
            quantity: energy(quantity),
            quantity_pre_loss: energy(pre_loss),
            quantity_post_loss: energy(post_loss),
            price: MoneyPerEnergy::new(round_value(price)),
            market: context.market,
            tax_paid: money(tax_paid),
            grid_fee_paid: money(grid_fee_paid),
        }
    }

    /// Whether the agent bought energy
    pub fn is_buy(&self) -> bool {
        self.quantity.value() > 0.0
    }

    /// What the agent pays for this trade, including tax and fees (negative for income).
    ///
    /// Buyers pay for the quantity before losses and sellers are paid for what arrives.
    pub fn net_cost(&self) -> Money {
        let charges = self.tax_paid + self.grid_fee_paid;
        if self.is_buy() {
            self.price * self.quantity_pre_loss + charges
        } else {
            charges - self.price * self.quantity_post_loss
        }
    }
}
