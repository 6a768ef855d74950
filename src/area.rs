//! Community-wide parameters (the `[AreaInfo]` table of `model.toml`).
use crate::carrier::Carrier;
use crate::horizon::HeatPumpMode;
use anyhow::{Result, ensure};
use serde::Deserialize;

/// Parameters which apply to the whole local energy community.
///
/// Values are resolved against [`crate::input::schema::definitions::AREA_PARAMS`] before being
/// deserialised into this struct, so bounds and defaults are already applied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AreaInfo {
    /// Number of hours optimised jointly in each solve
    pub trading_horizon: usize,
    /// Whether agents may trade with each other
    pub local_market_enabled: bool,
    /// Target charge level (fraction of capacity) for storage at the end of each horizon
    pub storage_end_charge_level: f64,
    /// Allowed deviation (fraction of capacity) from the end charge level
    pub storage_end_charge_band: f64,
    /// The year from which spot prices are taken
    pub electricity_price_year: i32,
    /// Tax on imported electricity (SEK/kWh)
    pub electricity_tax: f64,
    /// Transmission fee on imported electricity (SEK/kWh)
    pub electricity_transmission_fee: f64,
    /// Tax paid by sellers on internally traded electricity (SEK/kWh)
    pub electricity_tax_internal: f64,
    /// Grid fee paid by sellers on internally traded electricity (SEK/kWh)
    pub electricity_grid_fee_internal: f64,
    /// Monthly electricity effect fee (SEK per kW of peak import)
    pub electricity_effect_fee: f64,
    /// Offset added to the spot price when exporting electricity (SEK/kWh)
    pub external_electricity_wholesale_price_offset: f64,
    /// Marginal district heating price outside May-September (SEK/kWh)
    pub heating_marginal_price_winter: f64,
    /// Marginal district heating price in May-September (SEK/kWh)
    pub heating_marginal_price_summer: f64,
    /// Yearly heating grid fee per kW of average January-February use
    pub heating_jan_feb_grid_fee: f64,
    /// Monthly heating effect fee (SEK per kW of peak-day average import)
    pub heating_effect_fee: f64,
    /// Fraction of the heat import price paid for exported heat
    pub external_heating_wholesale_price_fraction: f64,
    /// Whether heat may be sold to the district heating grid
    pub external_heat_export_enabled: bool,
    /// Fraction of heat lost when crossing agent boundaries
    pub heat_transfer_loss: f64,
    /// Fraction of cooling lost when crossing agent boundaries
    pub cooling_transfer_loss: f64,
    /// Max electricity an agent can exchange with the local network per hour (kWh)
    pub inter_agent_electricity_transfer_capacity: f64,
    /// Max heat or cooling an agent can exchange with the local network per hour (kWh)
    pub inter_agent_heat_transfer_capacity: f64,
    /// Heat pump COP when producing high-temperature heat
    #[serde(rename = "COPHeatPumpsHighTemp")]
    pub cop_heat_pumps_high_temp: f64,
    /// Heat pump COP when producing low-temperature heat
    #[serde(rename = "COPHeatPumpsLowTemp")]
    pub cop_heat_pumps_low_temp: f64,
    /// Booster pump COP
    #[serde(rename = "COPBoosterPumps")]
    pub cop_booster_pumps: f64,
    /// Community compression chiller COP
    #[serde(rename = "CompChillerCOP")]
    pub comp_chiller_cop: f64,
    /// Community compression chiller max electricity input (kW)
    pub comp_chiller_max_input: f64,
    /// PV efficiency used when an agent doesn't specify one
    #[serde(rename = "DefaultPVEfficiency")]
    pub default_pv_efficiency: f64,
    /// Round-trip efficiency of building batteries
    pub battery_efficiency: f64,
    /// Efficiency of each of charging and discharging an accumulator tank
    pub acc_tank_efficiency: f64,
}

impl AreaInfo {
    /// Check combinations of parameters which are invalid together
    pub fn validate(&self) -> Result<()> {
        // Importing and exporting in the same hour must never pay
        ensure!(
            self.external_electricity_wholesale_price_offset
                < self.electricity_tax + self.electricity_transmission_fee,
            "ExternalElectricityWholesalePriceOffset ({}) must be less than ElectricityTax + \
            ElectricityTransmissionFee ({})",
            self.external_electricity_wholesale_price_offset,
            self.electricity_tax + self.electricity_transmission_fee
        );

        Ok(())
    }

    /// The fraction of energy lost when `carrier` crosses an agent boundary
    pub fn transfer_loss(&self, carrier: Carrier) -> f64 {
        match carrier {
            Carrier::Electricity => 0.0,
            Carrier::HighTempHeat | Carrier::LowTempHeat => self.heat_transfer_loss,
            Carrier::Cooling => self.cooling_transfer_loss,
        }
    }

    /// The max energy per hour an agent can exchange with the local network.
    ///
    /// This is zero for every carrier when the local market is disabled.
    pub fn transfer_capacity(&self, carrier: Carrier) -> f64 {
        if !self.local_market_enabled {
            return 0.0;
        }

        if carrier.is_thermal() {
            self.inter_agent_heat_transfer_capacity
        } else {
            self.inter_agent_electricity_transfer_capacity
        }
    }

    /// The tax and grid fee paid per kWh of electricity sold to the local market
    pub fn internal_electricity_charges(&self) -> (f64, f64) {
        (
            self.electricity_tax_internal,
            self.electricity_grid_fee_internal,
        )
    }

    /// Heat pump COP for the given mode
    pub fn heat_pump_cop(&self, mode: HeatPumpMode) -> f64 {
        match mode {
            HeatPumpMode::HighTemp => self.cop_heat_pumps_high_temp,
            HeatPumpMode::LowTemp => self.cop_heat_pumps_low_temp,
        }
    }

    /// The bounds on storage level (fractions of capacity) at the end of the horizon
    pub fn end_charge_bounds(&self) -> (f64, f64) {
        let level = self.storage_end_charge_level;
        let band = self.storage_end_charge_band;
        ((level - band).max(0.0), (level + band).min(1.0))
    }
}
