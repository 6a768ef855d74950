//! Building inertia thermal energy storage: heat stored in a building's own structure.
//!
//! The structure is modelled as two layers. Heat can be pushed into (or drawn from) the shallow
//! layer, which exchanges heat with the deep layer in proportion to the difference in how full
//! each layer is. Both layers lose a fixed fraction of their content every hour.
use serde::{Deserialize, Serialize};

/// Shallow layer capacity per m2 of floor area used for storage (kWh)
const SHALLOW_CAPACITY_PER_M2: f64 = 0.046;
/// Deep layer capacity per m2 (kWh)
const DEEP_CAPACITY_PER_M2: f64 = 0.291;
/// Max heat into or out of the shallow layer per m2 per hour (kWh)
const MAX_RATE_PER_M2: f64 = 0.023;
/// Heat flow between the layers per m2 when their relative levels differ by one (kWh)
const CONDUCTANCE_PER_M2: f64 = 0.03;
/// Fraction of the shallow layer's content kept from one hour to the next
const SHALLOW_RETENTION: f64 = 0.9913;
/// Fraction of the deep layer's content kept from one hour to the next
const DEEP_RETENTION: f64 = 0.9963;

/// The part of a building's structure used to store space heating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalMass {
    /// Floor area used for storage (m2)
    pub area: f64,
}

/// Heat held in each layer (kWh)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermalMassLevels {
    /// Heat in the shallow layer
    pub shallow: f64,
    /// Heat in the deep layer
    pub deep: f64,
}

/// Bounds and coefficients of a building's thermal mass for one period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalMassBounds {
    /// Shallow layer capacity (kWh)
    pub shallow_capacity: f64,
    /// Deep layer capacity (kWh)
    pub deep_capacity: f64,
    /// Max heat pushed into the shallow layer (kWh)
    pub max_charge: f64,
    /// Max heat drawn from the shallow layer (kWh)
    pub max_discharge: f64,
    /// Layer-to-layer conductance (kWh per unit of relative level difference)
    pub conductance: f64,
    /// Fraction of shallow content retained over the period
    pub shallow_retention: f64,
    /// Fraction of deep content retained over the period
    pub deep_retention: f64,
}

impl ThermalMass {
    /// Shallow layer capacity (kWh)
    pub fn shallow_capacity(&self) -> f64 {
        SHALLOW_CAPACITY_PER_M2 * self.area
    }

    /// Deep layer capacity (kWh)
    pub fn deep_capacity(&self) -> f64 {
        DEEP_CAPACITY_PER_M2 * self.area
    }

    /// The bounds for a period.
    ///
    /// Heat drawn from the structure can only replace space heating, so discharge is limited by
    /// `space_heating_demand`.
    pub fn bounds(&self, space_heating_demand: f64) -> ThermalMassBounds {
        let max_rate = MAX_RATE_PER_M2 * self.area;
        ThermalMassBounds {
            shallow_capacity: self.shallow_capacity(),
            deep_capacity: self.deep_capacity(),
            max_charge: max_rate,
            max_discharge: max_rate.min(space_heating_demand.max(0.0)),
            conductance: CONDUCTANCE_PER_M2 * self.area,
            shallow_retention: SHALLOW_RETENTION,
            deep_retention: DEEP_RETENTION,
        }
    }
}

impl ThermalMassBounds {
    /// Coefficients `(a, b)` such that the flow from the shallow to the deep layer is
    /// `a * shallow - b * deep`, or `None` if either layer has no capacity
    pub fn flow_coefficients(&self) -> Option<(f64, f64)> {
        (self.shallow_capacity > 0.0 && self.deep_capacity > 0.0).then(|| {
            (
                self.conductance / self.shallow_capacity,
                self.conductance / self.deep_capacity,
            )
        })
    }

    /// Heat moving from the shallow to the deep layer given the layers' levels
    pub fn flow(&self, levels: ThermalMassLevels) -> f64 {
        self.flow_coefficients()
            .map_or(0.0, |(a, b)| a * levels.shallow - b * levels.deep)
    }
}
