//! Code for reading the `[AreaInfo]` table of `model.toml`.
use super::schema::definitions::AREA_PARAMS;
use super::schema::resolve_params;
use crate::area::AreaInfo;
use anyhow::{Context, Result};
use toml::{Table, Value};

/// Resolve the raw `[AreaInfo]` table and convert it into an [`AreaInfo`].
///
/// Missing parameters take their default values.
pub fn read_area_info(mut table: Table) -> Result<AreaInfo> {
    resolve_params(AREA_PARAMS, &mut table).context("Invalid AreaInfo")?;
    let area: AreaInfo = Value::Table(table)
        .try_into()
        .context("Invalid AreaInfo")?;
    area.validate()?;

    Ok(area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_read_area_info_defaults() {
        let area = read_area_info(Table::new()).unwrap();
        assert_eq!(area.trading_horizon, 24);
        assert!(area.local_market_enabled);
        assert_eq!(area.electricity_price_year, 2019);
        assert_approx_eq!(f64, area.electricity_tax, 0.392);
        assert_approx_eq!(f64, area.cop_booster_pumps, 4.5);
        assert_approx_eq!(f64, area.default_pv_efficiency, 0.165);
    }

    #[test]
    fn test_read_area_info_overrides() {
        let table: Table = toml::from_str(
            "TradingHorizon = 12\nHeatTransferLoss = 0\nCompChillerMaxInput = 50.0",
        )
        .unwrap();
        let area = read_area_info(table).unwrap();
        assert_eq!(area.trading_horizon, 12);
        assert_approx_eq!(f64, area.heat_transfer_loss, 0.0);
        assert_approx_eq!(f64, area.comp_chiller_max_input, 50.0);
    }

    #[test]
    fn test_read_area_info_chiller_disabled_without_market() {
        let table: Table =
            toml::from_str("LocalMarketEnabled = false\nCompChillerMaxInput = 50.0").unwrap();
        let area = read_area_info(table).unwrap();
        assert_approx_eq!(f64, area.comp_chiller_max_input, 0.0);
    }

    #[test]
    fn test_read_area_info_horizon_out_of_range() {
        let table: Table = toml::from_str("TradingHorizon = 49").unwrap();
        assert_error!(read_area_info(table), "Invalid AreaInfo");
    }
}
