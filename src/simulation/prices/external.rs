//! Prices for trading with the external electricity and district heating grids.
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::horizon::{hours_in_jan_feb, is_summer_month};
use crate::simulation::state::EffectFeeTracker;
use chrono::{Datelike, NaiveDateTime};

/// External grid prices for one hour (SEK/kWh)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalPrices {
    /// The wholesale spot price
    pub spot: f64,
    /// Price paid for imported electricity
    pub electricity_import: f64,
    /// Price received for exported electricity
    pub electricity_export: f64,
    /// Price paid for imported heat
    pub heat_import: f64,
    /// Price received for exported heat, if heat can be exported
    pub heat_export: Option<f64>,
}

impl ExternalPrices {
    /// Calculate the external prices for an hour.
    ///
    /// # Arguments
    ///
    /// * `area` - Community-wide parameters
    /// * `datetime` - The hour
    /// * `spot` - The spot price for the hour
    /// * `effect_fees` - Committed imports so far this month, from which effect fees are amortised
    pub fn calculate(
        area: &AreaInfo,
        datetime: NaiveDateTime,
        spot: f64,
        effect_fees: &EffectFeeTracker,
    ) -> Self {
        let electricity_import = spot
            + area.electricity_tax
            + area.electricity_transmission_fee
            + effect_fees.amortised_electricity_fee(area.electricity_effect_fee, datetime);
        let electricity_export = spot + area.external_electricity_wholesale_price_offset;
        let heat_import = heat_marginal_price(area, datetime)
            + jan_feb_grid_fee(area, datetime)
            + effect_fees.amortised_heat_fee(area.heating_effect_fee, datetime);
        let heat_export = area
            .external_heat_export_enabled
            .then(|| heat_import * area.external_heating_wholesale_price_fraction);

        Self {
            spot,
            electricity_import,
            electricity_export,
            heat_import,
            heat_export,
        }
    }

    /// The import price for a carrier, if it can be imported
    pub fn import_price(&self, carrier: Carrier) -> Option<f64> {
        match carrier {
            Carrier::Electricity => Some(self.electricity_import),
            Carrier::HighTempHeat => Some(self.heat_import),
            Carrier::LowTempHeat | Carrier::Cooling => None,
        }
    }

    /// The export price for a carrier, if it can be exported
    pub fn export_price(&self, carrier: Carrier) -> Option<f64> {
        match carrier {
            Carrier::Electricity => Some(self.electricity_export),
            Carrier::HighTempHeat => self.heat_export,
            Carrier::LowTempHeat | Carrier::Cooling => None,
        }
    }
}

fn heat_marginal_price(area: &AreaInfo, datetime: NaiveDateTime) -> f64 {
    if is_summer_month(datetime.month()) {
        area.heating_marginal_price_summer
    } else {
        area.heating_marginal_price_winter
    }
}

/// The yearly Jan-Feb grid fee, spread over the hours of January and February
fn jan_feb_grid_fee(area: &AreaInfo, datetime: NaiveDateTime) -> f64 {
    if datetime.month() <= 2 {
        area.heating_jan_feb_grid_fee / hours_in_jan_feb(datetime.year())
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{area_info, datetime};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_electricity_prices_without_history(area_info: AreaInfo) {
        let prices =
            ExternalPrices::calculate(&area_info, datetime(3, 1, 0), 0.4, &EffectFeeTracker::default());
        assert_approx_eq!(f64, prices.electricity_import, 0.4 + 0.392 + 0.148);
        assert_approx_eq!(f64, prices.electricity_export, 0.45);
        assert_approx_eq!(f64, prices.heat_import, 0.5);
        assert_eq!(prices.heat_export, None);
        assert_eq!(prices.import_price(Carrier::Cooling), None);
    }

    #[rstest]
    fn test_heat_prices_by_season(mut area_info: AreaInfo) {
        area_info.external_heat_export_enabled = true;
        let tracker = EffectFeeTracker::default();

        let january = ExternalPrices::calculate(&area_info, datetime(1, 10, 0), 0.0, &tracker);
        assert_approx_eq!(f64, january.heat_import, 0.5 + 936.0 / 1416.0);

        let july = ExternalPrices::calculate(&area_info, datetime(7, 10, 0), 0.0, &tracker);
        assert_approx_eq!(f64, july.heat_import, 0.3);
        assert_approx_eq!(f64, july.export_price(Carrier::HighTempHeat).unwrap(), 0.15);
    }

    #[rstest]
    fn test_prices_include_effect_fee(area_info: AreaInfo) {
        let mut tracker = EffectFeeTracker::default();
        tracker.record(datetime(3, 1, 0), 10.0, 0.0);
        let fee = tracker.amortised_electricity_fee(area_info.electricity_effect_fee, datetime(3, 1, 1));
        assert!(fee > 0.0);

        let prices = ExternalPrices::calculate(&area_info, datetime(3, 1, 1), 0.4, &tracker);
        assert_approx_eq!(f64, prices.electricity_import, 0.4 + 0.392 + 0.148 + fee);
    }
}
