//! Parameter definitions for the area and for each agent type.
use super::ParamSpec;
use super::ParamValue::{Bool, Float, Int};

/// Resources a grid connection can supply
pub const GRID_RESOURCES: &[&str] = &["ELECTRICITY", "HIGH_TEMP_HEAT"];

/// Resources a storage agent can hold
pub const STORAGE_RESOURCES: &[&str] = &["ELECTRICITY", "HIGH_TEMP_HEAT"];

/// Resources a heat producer can supply
pub const HEAT_PRODUCER_RESOURCES: &[&str] = &["HIGH_TEMP_HEAT", "LOW_TEMP_HEAT"];

/// Parameters describing the whole local energy community (the `[AreaInfo]` table)
pub const AREA_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("TradingHorizon", "Trading horizon (hours)")
        .min(1.0)
        .max(48.0)
        .default(Int(24)),
    ParamSpec::boolean("LocalMarketEnabled", "Enable local market").default(Bool(true)),
    ParamSpec::float("StorageEndChargeLevel", "Storage end charge level")
        .min(0.0)
        .max(1.0)
        .default(Float(0.5)),
    ParamSpec::float("StorageEndChargeBand", "Storage end charge tolerance band")
        .min(0.0)
        .max(1.0)
        .default(Float(0.0)),
    ParamSpec::int("ElectricityPriceYear", "Year of spot price data")
        .min(1990.0)
        .max(2100.0)
        .default(Int(2019)),
    ParamSpec::float("ElectricityTax", "Electricity tax (SEK/kWh)")
        .min(0.0)
        .default(Float(0.392)),
    ParamSpec::float("ElectricityTransmissionFee", "Electricity transmission fee (SEK/kWh)")
        .min(0.0)
        .default(Float(0.148)),
    ParamSpec::float("ElectricityTaxInternal", "Electricity tax for internal trades (SEK/kWh)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float(
        "ElectricityGridFeeInternal",
        "Electricity grid fee for internal trades (SEK/kWh)",
    )
    .min(0.0)
    .default(Float(0.0)),
    ParamSpec::float("ElectricityEffectFee", "Electricity effect fee (SEK/kW per month)")
        .min(0.0)
        .default(Float(35.0)),
    ParamSpec::float(
        "ExternalElectricityWholesalePriceOffset",
        "External electricity wholesale price offset (SEK/kWh)",
    )
    .min(-1.0)
    .max(1.0)
    .default(Float(0.05)),
    ParamSpec::float("HeatingMarginalPriceWinter", "Heating price October-April (SEK/kWh)")
        .min(0.0)
        .default(Float(0.5)),
    ParamSpec::float("HeatingMarginalPriceSummer", "Heating price May-September (SEK/kWh)")
        .min(0.0)
        .default(Float(0.3)),
    ParamSpec::float("HeatingJanFebGridFee", "Heating grid fee based on Jan-Feb use (SEK/kW)")
        .min(0.0)
        .default(Float(936.0)),
    ParamSpec::float("HeatingEffectFee", "Heating effect fee (SEK/kW per month)")
        .min(0.0)
        .default(Float(68.0)),
    ParamSpec::float(
        "ExternalHeatingWholesalePriceFraction",
        "External heating wholesale price fraction",
    )
    .min(0.0)
    .max(1.0)
    .default(Float(0.5)),
    ParamSpec::boolean("ExternalHeatExportEnabled", "Allow selling heat to the external grid")
        .default(Bool(false)),
    ParamSpec::float("HeatTransferLoss", "Heat transfer loss")
        .min(0.0)
        .max(0.99)
        .default(Float(0.05)),
    ParamSpec::float("CoolingTransferLoss", "Cooling transfer loss")
        .min(0.0)
        .max(0.99)
        .default(Float(0.05)),
    ParamSpec::float(
        "InterAgentElectricityTransferCapacity",
        "Internal electricity transfer capacity (kW)",
    )
    .min(0.0)
    .default(Float(1000.0)),
    ParamSpec::float("InterAgentHeatTransferCapacity", "Internal heat transfer capacity (kW)")
        .min(0.0)
        .default(Float(1000.0)),
    ParamSpec::float("COPHeatPumpsHighTemp", "Heat pump COP, high-temperature mode")
        .min(1.0)
        .max(10.0)
        .default(Float(3.0)),
    ParamSpec::float("COPHeatPumpsLowTemp", "Heat pump COP, low-temperature mode")
        .min(1.0)
        .max(10.0)
        .default(Float(4.0)),
    ParamSpec::float("COPBoosterPumps", "Booster pump COP")
        .min(1.0)
        .max(10.0)
        .default(Float(4.5)),
    ParamSpec::float("CompChillerCOP", "Compression chiller COP")
        .min(0.0)
        .max(10.0)
        .default(Float(1.5)),
    ParamSpec::float("CompChillerMaxInput", "Compression chiller max input (kW)")
        .min(0.0)
        .default(Float(0.0))
        .disabled_when("LocalMarketEnabled", Bool(false), Float(0.0)),
    ParamSpec::float("DefaultPVEfficiency", "Default PV efficiency")
        .min(0.01)
        .max(0.99)
        .default(Float(0.165)),
    ParamSpec::float("BatteryEfficiency", "Building battery round-trip efficiency")
        .min(0.01)
        .max(1.0)
        .default(Float(0.93)),
    ParamSpec::float("AccTankEfficiency", "Accumulator tank charge and discharge efficiency")
        .min(0.01)
        .max(1.0)
        .default(Float(0.97)),
];

/// Parameters for a residential or commercial building
pub const BUILDING_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("Atemp", "Heated floor area (m2)").min(0.0),
    ParamSpec::float("PVArea", "PV area (m2)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float("PVEfficiency", "PV efficiency")
        .min(0.01)
        .max(0.99)
        .optional(),
    ParamSpec::int("NumberHeatPumps", "Number of heat pumps")
        .min(0.0)
        .default(Int(0)),
    ParamSpec::float("HeatPumpMaxInput", "Heat pump max electricity input (kW)")
        .min(0.0)
        .default(Float(0.0))
        .disabled_when("NumberHeatPumps", Int(0), Float(0.0)),
    ParamSpec::float("HeatPumpMaxOutput", "Heat pump max heat output (kW)")
        .min(0.0)
        .default(Float(0.0))
        .disabled_when("NumberHeatPumps", Int(0), Float(0.0)),
    ParamSpec::boolean("HeatPumpForCooling", "Use heat pumps for cooling")
        .default(Bool(false))
        .disabled_when("NumberHeatPumps", Int(0), Bool(false)),
    ParamSpec::float("BoosterPumpMaxInput", "Booster pump max electricity input (kW)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float("BoosterPumpMaxOutput", "Booster pump max heat output (kW)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float("BatteryCapacity", "Battery capacity (kWh)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float("BatteryChargeRate", "Battery charge rate (fraction of capacity per hour)")
        .min(0.01)
        .max(1.0)
        .optional(),
    ParamSpec::float(
        "BatteryDischargeRate",
        "Battery discharge rate (fraction of capacity per hour)",
    )
    .min(0.01)
    .max(1.0)
    .optional(),
    ParamSpec::float("FractionUsedForBITES", "Fraction of floor area used for thermal storage")
        .min(0.0)
        .max(1.0)
        .default(Float(0.0)),
    ParamSpec::float("AccumulatorTankCapacity", "Accumulator tank volume (m3)")
        .min(0.0)
        .default(Float(0.0)),
];

/// Parameters for a grocery store
pub const GROCERY_STORE_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("Atemp", "Heated floor area (m2)").min(0.0),
    ParamSpec::float("PVArea", "PV area (m2)")
        .min(0.0)
        .default(Float(0.0)),
    ParamSpec::float("PVEfficiency", "PV efficiency")
        .min(0.01)
        .max(0.99)
        .optional(),
];

/// Parameters for a dispatchable heat producer
pub const HEAT_PRODUCER_PARAMS: &[ParamSpec] = &[
    ParamSpec::options("Resource", "Resource", HEAT_PRODUCER_RESOURCES),
    ParamSpec::float("MaxOutput", "Max heat output (kW)").min(0.0),
    ParamSpec::float("ProductionCost", "Production cost (SEK/kWh)")
        .min(0.0)
        .default(Float(0.0)),
];

/// Parameters for a storage unit
pub const STORAGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::options("Resource", "Resource", STORAGE_RESOURCES),
    ParamSpec::float("Capacity", "Capacity (kWh)").min(0.0),
    ParamSpec::float("ChargeRate", "Charge rate (fraction of capacity per hour)")
        .min(0.01)
        .max(1.0)
        .optional(),
    ParamSpec::float("DischargeRate", "Discharge rate (fraction of capacity per hour)")
        .min(0.01)
        .max(1.0)
        .optional(),
    ParamSpec::float("RoundTripEfficiency", "Round-trip efficiency")
        .min(0.01)
        .max(1.0)
        .default(Float(0.93)),
    ParamSpec::float("InitialChargeLevel", "Initial charge level")
        .min(0.0)
        .max(1.0)
        .optional(),
    ParamSpec::float("BuyPricePercentile", "Charge only below this spot price percentile")
        .min(0.0)
        .max(100.0)
        .optional(),
    ParamSpec::float("SellPricePercentile", "Discharge only above this spot price percentile")
        .min(0.0)
        .max(100.0)
        .optional(),
];

/// Parameters for a standalone PV installation
pub const PV_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("PVArea", "PV area (m2)").min(0.0),
    ParamSpec::float("PVEfficiency", "PV efficiency")
        .min(0.01)
        .max(0.99)
        .optional(),
];

/// Parameters for the connection to the external grid
pub const GRID_PARAMS: &[ParamSpec] = &[
    ParamSpec::options("Resource", "Resource", GRID_RESOURCES),
    ParamSpec::float("TransferRate", "Max transfer rate (kW)")
        .min(0.0)
        .default(Float(10000.0)),
];
