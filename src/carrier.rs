//! Energy carriers traded within the local energy community.
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use strum::EnumIter;

/// A form of energy which is balanced separately in every trading period
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
#[strum(serialize_all = "snake_case")]
pub enum Carrier {
    /// Electrical energy
    #[string = "electricity"]
    Electricity,
    /// Heat at a temperature high enough for hot tap water (district heating level)
    #[string = "high_temp_heat"]
    HighTempHeat,
    /// Heat suitable only for space heating
    #[string = "low_temp_heat"]
    LowTempHeat,
    /// Cooling energy
    #[string = "cooling"]
    Cooling,
}

impl Carrier {
    /// Whether the carrier is a thermal one (heat or cooling).
    ///
    /// Thermal carriers share the heat network's transfer capacity and suffer transfer losses.
    pub fn is_thermal(self) -> bool {
        !matches!(self, Self::Electricity)
    }

    /// Whether surplus energy of this carrier can be discarded at no cost
    pub fn can_be_dumped(self) -> bool {
        matches!(self, Self::LowTempHeat | Self::Cooling)
    }
}

/// An energy resource which an agent can store or which the external grid can supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
pub enum Resource {
    /// Electricity
    #[string = "ELECTRICITY"]
    Electricity,
    /// High-temperature heat
    #[string = "HIGH_TEMP_HEAT"]
    HighTempHeat,
    /// Low-temperature heat
    #[string = "LOW_TEMP_HEAT"]
    LowTempHeat,
}

impl From<Resource> for Carrier {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Electricity => Carrier::Electricity,
            Resource::HighTempHeat => Carrier::HighTempHeat,
            Resource::LowTempHeat => Carrier::LowTempHeat,
        }
    }
}
