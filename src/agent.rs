//! Agents of the local energy community.
//!
//! Each agent type contributes to every trading period of a horizon in the same way: a fixed net
//! demand per carrier (derived from forecasts) plus bounds on the decisions it controls. This is a
//! pure projection of the agent's configuration; storage levels are only ever changed when a
//! period is committed by the scheduler.
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::horizon::{HeatPumpMode, TradingPeriod};
use crate::id::define_id_type;
use indexmap::IndexMap;

pub mod storage;
pub use storage::{Store, StoreLevels, StorageBounds, StorageUnit};
pub mod thermal_mass;
pub use thermal_mass::{ThermalMass, ThermalMassBounds, ThermalMassLevels};

define_id_type!(AgentID);

/// A map of [`Agent`]s, keyed by agent ID
pub type AgentMap = IndexMap<AgentID, Agent>;

/// A participant in the local energy community
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// A unique identifier for the agent
    pub id: AgentID,
    /// The type of agent and its parameters
    pub kind: AgentKind,
}

/// The role an agent plays, along with its role-specific parameters
#[derive(Debug, Clone, PartialEq)]
pub enum AgentKind {
    /// A residential or commercial building
    Building(Building),
    /// A grocery store, typically a source of waste heat
    GroceryStore(GroceryStore),
    /// A dispatchable heat producer
    HeatProducer(HeatProducer),
    /// A standalone storage unit
    Storage(StorageUnit),
    /// A standalone PV installation
    PV(PhotovoltaicArray),
    /// The connection to an external grid
    Grid(GridConnection),
}

/// Solar panels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotovoltaicArray {
    /// Panel area (m2)
    pub area: f64,
    /// Fraction of irradiation converted into electricity
    pub efficiency: f64,
}

impl PhotovoltaicArray {
    /// Electricity produced in an hour (kWh) given irradiation in kW/m2
    pub fn production(&self, irradiation: f64) -> f64 {
        irradiation * self.area * self.efficiency
    }
}

/// A building's heat pumps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPump {
    /// Max electricity input (kWh per hour)
    pub max_input: f64,
    /// Max heat output (kWh per hour)
    pub max_output: f64,
    /// Whether the cold side of the heat pump can cover the building's cooling demand
    pub provides_cooling: bool,
}

/// A building's booster pumps, which lift low-temperature heat to hot-water temperature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoosterPump {
    /// Max electricity input (kWh per hour)
    pub max_input: f64,
    /// Max heat output (kWh per hour)
    pub max_output: f64,
}

/// A residential or commercial building
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    /// Heated floor area (m2)
    pub floor_area: f64,
    /// Rooftop PV, if any
    pub pv: Option<PhotovoltaicArray>,
    /// Heat pumps, if any
    pub heat_pump: Option<HeatPump>,
    /// Booster pumps, if any
    pub booster_pump: Option<BoosterPump>,
    /// A battery, if any
    pub battery: Option<StorageUnit>,
    /// Heat stored in the building's structure, if any is used for storage
    pub thermal_mass: Option<ThermalMass>,
    /// A hot-water accumulator tank, if any
    pub accumulator_tank: Option<StorageUnit>,
}

/// A grocery store
#[derive(Debug, Clone, PartialEq)]
pub struct GroceryStore {
    /// Heated floor area (m2)
    pub floor_area: f64,
    /// Rooftop PV, if any
    pub pv: Option<PhotovoltaicArray>,
}

/// A dispatchable heat producer
#[derive(Debug, Clone, PartialEq)]
pub struct HeatProducer {
    /// The heat carrier produced
    pub carrier: Carrier,
    /// Max output (kWh per hour)
    pub max_output: f64,
    /// Cost per kWh produced (SEK/kWh)
    pub production_cost: f64,
}

/// The connection to an external grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridConnection {
    /// The carrier supplied by the grid
    pub carrier: Carrier,
    /// Max import or export per hour (kWh)
    pub transfer_rate: f64,
}

/// Bounds on heat pump operation for a period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPumpBounds {
    /// Max electricity input (kWh)
    pub max_input: f64,
    /// Max heat output (kWh)
    pub max_output: f64,
    /// Heat output per unit of electricity input
    pub cop: f64,
    /// The heat carrier produced in this period's mode
    pub output: Carrier,
    /// Max cooling delivered per unit of electricity input, if the heat pump provides cooling
    pub cooling_per_input: Option<f64>,
}

/// Bounds on booster pump operation for a period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoosterBounds {
    /// Max electricity input (kWh)
    pub max_input: f64,
    /// Max high-temperature heat output (kWh)
    pub max_output: f64,
    /// Heat output per unit of electricity input
    pub cop: f64,
}

/// Bounds on dispatchable heat production for a period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionBounds {
    /// The heat carrier produced
    pub carrier: Carrier,
    /// Max output (kWh)
    pub max_output: f64,
    /// Cost per kWh produced
    pub cost: f64,
}

/// Exogenous inputs for one agent in one period
#[derive(Debug, Clone, Copy)]
pub struct PeriodInputs<'a> {
    /// Consumption per carrier (kWh, negative for supply)
    pub usage: &'a IndexMap<Carrier, f64>,
    /// Solar irradiation (kW/m2)
    pub irradiation: f64,
    /// Spot price in this period (SEK/kWh)
    pub spot_price: f64,
    /// Spot prices for every period of the horizon
    pub horizon_spot_prices: &'a [f64],
}

/// What an agent contributes to a single period of the horizon problem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodContribution {
    /// Fixed net demand per carrier (kWh; positive for consumption, negative for supply)
    pub net_demand: IndexMap<Carrier, f64>,
    /// Heat pump bounds, if the agent has working heat pumps
    pub heat_pump: Option<HeatPumpBounds>,
    /// Booster pump bounds, if the agent's booster pumps are active in this period
    pub booster_pump: Option<BoosterBounds>,
    /// Bounds of each of the agent's stores
    pub storage: IndexMap<Store, StorageBounds>,
    /// Thermal mass bounds, if the building stores heat in its structure
    pub thermal_mass: Option<ThermalMassBounds>,
    /// Heat production bounds, if the agent produces heat
    pub heat_production: Option<ProductionBounds>,
    /// Whether the agent can use high-temperature heat to cover low-temperature demand
    pub heat_exchange: bool,
}

impl PeriodContribution {
    /// Fixed net demand for a carrier (zero if none)
    pub fn net_demand(&self, carrier: Carrier) -> f64 {
        self.net_demand.get(&carrier).copied().unwrap_or(0.0)
    }

    /// Whether the contribution involves `carrier` at all
    pub fn uses_carrier(&self, carrier: Carrier) -> bool {
        self.net_demand(carrier) != 0.0
            || self.storage.values().any(|s| s.carrier == carrier)
            || (self.thermal_mass.is_some() && carrier == Carrier::LowTempHeat)
            || self.heat_production.is_some_and(|p| p.carrier == carrier)
            || self.heat_pump.is_some_and(|hp| {
                carrier == Carrier::Electricity
                    || hp.output == carrier
                    || (carrier == Carrier::Cooling && hp.cooling_per_input.is_some())
            })
            || (self.booster_pump.is_some() && carrier != Carrier::Cooling)
            || (self.heat_exchange && matches!(carrier, Carrier::HighTempHeat | Carrier::LowTempHeat))
    }

    fn subtract_pv(&mut self, pv: Option<&PhotovoltaicArray>, irradiation: f64) {
        if let Some(pv) = pv {
            *self.net_demand.entry(Carrier::Electricity).or_default() -= pv.production(irradiation);
        }
    }
}

impl Agent {
    /// Whether this agent is a connection to an external grid
    pub fn is_grid(&self) -> bool {
        matches!(self.kind, AgentKind::Grid(_))
    }

    /// The agent's storage unit or battery, if any
    pub fn storage(&self) -> Option<&StorageUnit> {
        match &self.kind {
            AgentKind::Storage(storage) => Some(storage),
            AgentKind::Building(building) => building.battery.as_ref(),
            _ => None,
        }
    }

    /// Iterate over all of the agent's stores
    pub fn stores(&self) -> impl Iterator<Item = (Store, &StorageUnit)> {
        let tank = match &self.kind {
            AgentKind::Building(building) => building.accumulator_tank.as_ref(),
            _ => None,
        };

        self.storage()
            .map(|unit| (Store::Unit, unit))
            .into_iter()
            .chain(tank.map(|tank| (Store::AccumulatorTank, tank)))
    }

    /// The building's thermal mass, if it is used for storage
    pub fn thermal_mass(&self) -> Option<&ThermalMass> {
        match &self.kind {
            AgentKind::Building(building) => building.thermal_mass.as_ref(),
            _ => None,
        }
    }

    /// The agent's PV array, if any
    pub fn pv(&self) -> Option<&PhotovoltaicArray> {
        match &self.kind {
            AgentKind::Building(building) => building.pv.as_ref(),
            AgentKind::GroceryStore(store) => store.pv.as_ref(),
            AgentKind::PV(pv) => Some(pv),
            _ => None,
        }
    }

    /// Project the agent's configuration and forecasts into a single period of the horizon.
    ///
    /// # Arguments
    ///
    /// * `area` - Community-wide parameters
    /// * `period` - The trading period
    /// * `inputs` - Exogenous inputs for this agent and period
    /// * `levels` - The current levels of the agent's stores, given only for the leading period
    pub fn contribution(
        &self,
        area: &AreaInfo,
        period: &TradingPeriod,
        inputs: &PeriodInputs,
        levels: Option<&StoreLevels>,
    ) -> PeriodContribution {
        let mut contribution = PeriodContribution {
            net_demand: inputs.usage.clone(),
            ..Default::default()
        };
        contribution.subtract_pv(self.pv(), inputs.irradiation);
        contribution.storage = self
            .stores()
            .map(|(store, unit)| {
                let level = levels.and_then(|levels| levels.get(&store).copied());
                let bounds =
                    unit.bounds(level, inputs.spot_price, inputs.horizon_spot_prices);
                (store, bounds)
            })
            .collect();
        contribution.thermal_mass = self
            .thermal_mass()
            .map(|mass| mass.bounds(contribution.net_demand(Carrier::LowTempHeat)));

        match &self.kind {
            AgentKind::Building(building) => {
                let mode = period.heat_pump_mode();
                contribution.heat_exchange = true;
                contribution.heat_pump = building
                    .heat_pump
                    .filter(|hp| hp.max_input > 0.0 && hp.max_output > 0.0)
                    .map(|hp| {
                        let cop = area.heat_pump_cop(mode);
                        HeatPumpBounds {
                            max_input: hp.max_input,
                            max_output: hp.max_output,
                            cop,
                            output: match mode {
                                HeatPumpMode::HighTemp => Carrier::HighTempHeat,
                                HeatPumpMode::LowTemp => Carrier::LowTempHeat,
                            },
                            cooling_per_input: hp.provides_cooling.then_some(cop - 1.0),
                        }
                    });

                // Booster pumps are only needed when heat pumps deliver low-temperature heat
                if mode == HeatPumpMode::LowTemp {
                    contribution.booster_pump = building
                        .booster_pump
                        .filter(|bp| bp.max_input > 0.0 && bp.max_output > 0.0)
                        .map(|bp| BoosterBounds {
                            max_input: bp.max_input,
                            max_output: bp.max_output,
                            cop: area.cop_booster_pumps,
                        });
                }
            }
            AgentKind::GroceryStore(_) => contribution.heat_exchange = true,
            AgentKind::HeatProducer(producer) => {
                contribution.heat_production = Some(ProductionBounds {
                    carrier: producer.carrier,
                    max_output: producer.max_output,
                    cost: producer.production_cost,
                });
            }
            AgentKind::Storage(_) | AgentKind::PV(_) | AgentKind::Grid(_) => {}
        }

        contribution
    }
}
