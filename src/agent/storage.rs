//! Storage units and their state-of-charge dynamics.
use crate::carrier::Carrier;
use indexmap::IndexMap;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// Volumetric heat capacity of water (kWh per m3 per degree)
const WATER_KWH_PER_M3_K: f64 = 4182.0 * 998.0 / 3_600_000.0;

/// Usable temperature lift of an accumulator tank (degrees)
pub const ACCUMULATOR_TANK_TEMPERATURE_LIFT: f64 = 65.0;

/// Which of an agent's stores a level or decision refers to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum Store {
    /// A storage agent's unit or a building's battery
    #[string = "unit"]
    Unit,
    /// A building's hot-water accumulator tank
    #[string = "accumulator_tank"]
    AccumulatorTank,
}

/// Known levels (kWh) of an agent's stores
pub type StoreLevels = IndexMap<Store, f64>;

/// The capacity (kWh) of an accumulator tank of the given volume (m3)
pub fn accumulator_tank_capacity(volume: f64) -> f64 {
    volume * WATER_KWH_PER_M3_K * ACCUMULATOR_TANK_TEMPERATURE_LIFT
}

/// A battery or heat accumulator tank
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    /// The carrier stored
    pub carrier: Carrier,
    /// Capacity (kWh)
    pub capacity: f64,
    /// Max charge per hour as a fraction of capacity
    pub charge_rate: f64,
    /// Max discharge per hour as a fraction of capacity
    pub discharge_rate: f64,
    /// Fraction of energy recovered over a full charge/discharge cycle
    pub round_trip_efficiency: f64,
    /// Charge level (fraction of capacity) at the start of the simulation
    pub initial_charge_level: f64,
    /// Only charge when the spot price is at or below this percentile of the horizon's prices
    pub buy_price_percentile: Option<f64>,
    /// Only discharge when the spot price is at or above this percentile of the horizon's prices
    pub sell_price_percentile: Option<f64>,
}

/// Bounds on a storage unit's decisions for a single period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageBounds {
    /// The carrier stored
    pub carrier: Carrier,
    /// Capacity (kWh)
    pub capacity: f64,
    /// Max energy drawn from the agent's balance for charging (kWh)
    pub max_charge: f64,
    /// Max energy delivered to the agent's balance by discharging (kWh)
    pub max_discharge: f64,
    /// Round-trip efficiency
    pub efficiency: f64,
}

impl StorageBounds {
    /// Efficiency applied on each leg, so that a full cycle loses `1 - efficiency` exactly once
    pub fn leg_efficiency(&self) -> f64 {
        self.efficiency.sqrt()
    }
}

impl StorageUnit {
    /// The charge level at the start of the simulation (kWh)
    pub fn initial_level(&self) -> f64 {
        self.initial_charge_level * self.capacity
    }

    /// Max charge per hour (kWh)
    pub fn max_charge(&self) -> f64 {
        self.charge_rate * self.capacity
    }

    /// Max discharge per hour (kWh)
    pub fn max_discharge(&self) -> f64 {
        self.discharge_rate * self.capacity
    }

    /// The decision bounds for a period.
    ///
    /// # Arguments
    ///
    /// * `level` - The current level (kWh), if known. It is only known for the leading period of a
    ///   horizon, in which case the bounds are limited by the remaining headroom.
    /// * `spot_price` - The spot price in this period
    /// * `horizon_spot_prices` - The spot prices for every period in the horizon
    pub fn bounds(
        &self,
        level: Option<f64>,
        spot_price: f64,
        horizon_spot_prices: &[f64],
    ) -> StorageBounds {
        let leg = self.round_trip_efficiency.sqrt();
        let mut max_charge = self.max_charge();
        let mut max_discharge = self.max_discharge();

        if let Some(level) = level {
            max_charge = max_charge.min((self.capacity - level).max(0.0) / leg);
            max_discharge = max_discharge.min(level.max(0.0) * leg);
        }

        if self
            .buy_price_percentile
            .is_some_and(|pct| spot_price > percentile(horizon_spot_prices, pct))
        {
            max_charge = 0.0;
        }
        if self
            .sell_price_percentile
            .is_some_and(|pct| spot_price < percentile(horizon_spot_prices, pct))
        {
            max_discharge = 0.0;
        }

        StorageBounds {
            carrier: self.carrier,
            capacity: self.capacity,
            max_charge,
            max_discharge,
            efficiency: self.round_trip_efficiency,
        }
    }
}

/// Compute the `pct`th percentile of `values`, interpolating linearly between ranks
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::storage_unit;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(50.0, 3.0)]
    #[case(100.0, 5.0)]
    #[case(25.0, 2.0)]
    #[case(90.0, 4.6)]
    fn test_percentile(#[case] pct: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, percentile(&[5.0, 1.0, 4.0, 2.0, 3.0], pct), expected);
    }

    #[test]
    fn test_accumulator_tank_capacity() {
        // One cubic metre of water over 65 degrees
        assert_approx_eq!(f64, accumulator_tank_capacity(1.0), 75.357_3, epsilon = 1e-4);
        assert_approx_eq!(f64, accumulator_tank_capacity(0.0), 0.0);
    }

    #[rstest]
    fn test_bounds_without_level(storage_unit: StorageUnit) {
        let bounds = storage_unit.bounds(None, 1.0, &[1.0]);
        assert_approx_eq!(f64, bounds.max_charge, 400.0);
        assert_approx_eq!(f64, bounds.max_discharge, 400.0);
    }

    #[rstest]
    fn test_bounds_limited_by_headroom(storage_unit: StorageUnit) {
        let leg = storage_unit.round_trip_efficiency.sqrt();

        // Nearly full: can't charge all the way
        let bounds = storage_unit.bounds(Some(900.0), 1.0, &[1.0]);
        assert_approx_eq!(f64, bounds.max_charge, 100.0 / leg);
        assert_approx_eq!(f64, bounds.max_discharge, 400.0);

        // Nearly empty: can only deliver what is stored, net of losses
        let bounds = storage_unit.bounds(Some(100.0), 1.0, &[1.0]);
        assert_approx_eq!(f64, bounds.max_charge, 400.0);
        assert_approx_eq!(f64, bounds.max_discharge, 100.0 * leg);
    }

    #[rstest]
    fn test_bounds_price_percentiles(mut storage_unit: StorageUnit) {
        storage_unit.buy_price_percentile = Some(25.0);
        storage_unit.sell_price_percentile = Some(75.0);
        let prices = [0.1, 0.2, 0.3, 0.4, 0.5];

        // Cheap hour: charging allowed, discharging not
        let bounds = storage_unit.bounds(None, 0.1, &prices);
        assert!(bounds.max_charge > 0.0);
        assert_approx_eq!(f64, bounds.max_discharge, 0.0);

        // Expensive hour: vice versa
        let bounds = storage_unit.bounds(None, 0.5, &prices);
        assert_approx_eq!(f64, bounds.max_charge, 0.0);
        assert!(bounds.max_discharge > 0.0);

        // In between: neither
        let bounds = storage_unit.bounds(None, 0.3, &prices);
        assert_approx_eq!(f64, bounds.max_charge, 0.0);
        assert_approx_eq!(f64, bounds.max_discharge, 0.0);
    }
}
