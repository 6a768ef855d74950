//! Declarative parameter definitions for agents and the area.
//!
//! Each configurable parameter is described by a [`ParamSpec`]: its type, bounds, default value and
//! an optional disabled condition. Raw TOML tables are resolved against these definitions before
//! being deserialised into strongly-typed structs, so nothing downstream consults the raw tables.
//!
//! Resolution happens in a fixed order:
//!
//! 1. Unknown keys are rejected
//! 2. Defaults are filled in for missing parameters
//! 3. Disabled conditions force dependent parameters to fixed values
//! 4. Required parameters, types, enum options and bounds are checked
use anyhow::{Context, Result, bail, ensure};
use toml::{Table, Value};

pub mod definitions;

/// The type of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamType {
    /// A floating-point number (integers are accepted and converted)
    Float,
    /// An integer
    Int,
    /// A boolean flag
    Bool,
    /// A string which must be one of the listed options
    Enum(&'static [&'static str]),
}

/// A constant parameter value, used for defaults and disabled conditions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// A floating-point number
    Float(f64),
    /// An integer
    Int(i64),
    /// A boolean
    Bool(bool),
    /// A string
    Text(&'static str),
}

impl ParamValue {
    /// Convert to a TOML value
    fn to_toml(self) -> Value {
        match self {
            Self::Float(value) => Value::Float(value),
            Self::Int(value) => Value::Integer(value),
            Self::Bool(value) => Value::Boolean(value),
            Self::Text(value) => Value::String(value.to_string()),
        }
    }

    /// Whether the TOML value is equal to this one
    #[allow(clippy::float_cmp)]
    fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Float(a), Value::Float(b)) => a == *b,
            (Self::Float(a), Value::Integer(b)) => a == *b as f64,
            (Self::Int(a), Value::Float(b)) => a as f64 == *b,
            (Self::Int(a), Value::Integer(b)) => a == *b,
            (Self::Bool(a), Value::Boolean(b)) => a == *b,
            (Self::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Forces a parameter to a fixed value when another parameter has a given value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisabledCond {
    /// The parameter the condition is keyed on
    pub param: &'static str,
    /// The value of `param` which disables the parameter
    pub equals: ParamValue,
    /// The value the disabled parameter is forced to
    pub forced: ParamValue,
}

/// The definition of a single configurable parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// The key used in configuration files
    pub name: &'static str,
    /// Human-readable label
    pub display: &'static str,
    /// The parameter's type
    pub kind: ParamType,
    /// Inclusive lower bound
    pub min_value: Option<f64>,
    /// Inclusive upper bound
    pub max_value: Option<f64>,
    /// Value used if the parameter is absent
    pub default: Option<ParamValue>,
    /// Whether the parameter may be left unset (with no default)
    pub optional: bool,
    /// Condition under which the parameter is forced to a fixed value
    pub disabled_cond: Option<DisabledCond>,
}

impl ParamSpec {
    const fn new(name: &'static str, display: &'static str, kind: ParamType) -> Self {
        Self {
            name,
            display,
            kind,
            min_value: None,
            max_value: None,
            default: None,
            optional: false,
            disabled_cond: None,
        }
    }

    /// A float parameter
    pub const fn float(name: &'static str, display: &'static str) -> Self {
        Self::new(name, display, ParamType::Float)
    }

    /// An integer parameter
    pub const fn int(name: &'static str, display: &'static str) -> Self {
        Self::new(name, display, ParamType::Int)
    }

    /// A boolean parameter
    pub const fn boolean(name: &'static str, display: &'static str) -> Self {
        Self::new(name, display, ParamType::Bool)
    }

    /// An enum parameter with the given options
    pub const fn options(
        name: &'static str,
        display: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self::new(name, display, ParamType::Enum(options))
    }

    /// Set an inclusive lower bound
    pub const fn min(mut self, value: f64) -> Self {
        self.min_value = Some(value);
        self
    }

    /// Set an inclusive upper bound
    pub const fn max(mut self, value: f64) -> Self {
        self.max_value = Some(value);
        self
    }

    /// Set the default value
    pub const fn default(mut self, value: ParamValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Allow the parameter to be omitted
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Force the parameter to `forced` whenever `param` equals `equals`
    pub const fn disabled_when(
        mut self,
        param: &'static str,
        equals: ParamValue,
        forced: ParamValue,
    ) -> Self {
        self.disabled_cond = Some(DisabledCond {
            param,
            equals,
            forced,
        });
        self
    }

    /// Check that a (present) value is valid for this parameter, normalising integers to floats
    fn check_value(&self, value: &mut Value) -> Result<()> {
        let number = match (self.kind, &*value) {
            (ParamType::Float, Value::Float(x)) => Some(*x),
            (ParamType::Float, Value::Integer(x)) => {
                let x = *x as f64;
                *value = Value::Float(x);
                Some(x)
            }
            (ParamType::Int, Value::Integer(x)) => Some(*x as f64),
            (ParamType::Bool, Value::Boolean(_)) => None,
            (ParamType::Enum(options), Value::String(s)) => {
                ensure!(
                    options.contains(&s.as_str()),
                    "{} ({}) must be one of {options:?}, got \"{s}\"",
                    self.name,
                    self.display
                );
                None
            }
            (kind, value) => bail!(
                "{} ({}) has the wrong type: expected {kind:?}, got {}",
                self.name,
                self.display,
                value.type_str()
            ),
        };

        if let Some(number) = number {
            ensure!(
                number.is_finite(),
                "{} ({}) must be a finite number",
                self.name,
                self.display
            );
            if let Some(min) = self.min_value {
                ensure!(
                    number >= min,
                    "{} ({}) must be at least {min}, got {number}",
                    self.name,
                    self.display
                );
            }
            if let Some(max) = self.max_value {
                ensure!(
                    number <= max,
                    "{} ({}) must be at most {max}, got {number}",
                    self.name,
                    self.display
                );
            }
        }

        Ok(())
    }
}

/// Resolve a raw parameter table in place against the given definitions.
///
/// On success, every parameter in `specs` is present in `table` (except unset optional ones) and
/// holds a valid value.
pub fn resolve_params(specs: &[ParamSpec], table: &mut Table) -> Result<()> {
    for key in table.keys() {
        ensure!(
            specs.iter().any(|spec| spec.name == key),
            "Unknown parameter: {key}"
        );
    }

    for spec in specs {
        if let Some(default) = spec.default {
            table.entry(spec.name).or_insert(default.to_toml());
        }
    }

    // Disabled conditions are keyed on values after defaults have been applied
    for spec in specs {
        let Some(cond) = spec.disabled_cond else {
            continue;
        };

        if table
            .get(cond.param)
            .is_some_and(|value| cond.equals.matches(value))
        {
            table.insert(spec.name.to_string(), cond.forced.to_toml());
        }
    }

    for spec in specs {
        match table.get_mut(spec.name) {
            Some(value) => spec.check_value(value)?,
            None => ensure!(
                spec.optional,
                "Missing required parameter: {} ({})",
                spec.name,
                spec.display
            ),
        }
    }

    Ok(())
}

/// Remove a string-valued key from a raw table
pub fn take_string(table: &mut Table, key: &str) -> Result<String> {
    match table.remove(key).with_context(|| format!("Missing {key}"))? {
        Value::String(s) => Ok(s),
        other => bail!("{key} must be a string, got {}", other.type_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::int("NumberHeatPumps", "Number of heat pumps")
            .min(0.0)
            .default(ParamValue::Int(0)),
        ParamSpec::float("HeatPumpMaxOutput", "Heat pump max output")
            .min(0.0)
            .max(1000.0)
            .default(ParamValue::Float(100.0))
            .disabled_when(
                "NumberHeatPumps",
                ParamValue::Int(0),
                ParamValue::Float(0.0),
            ),
        ParamSpec::options("Resource", "Resource", &["ELECTRICITY", "HIGH_TEMP_HEAT"]),
        ParamSpec::float("DischargeRate", "Discharge rate")
            .min(0.0)
            .max(1.0)
            .optional(),
    ];

    fn table(s: &str) -> Table {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_resolve_params_defaults() {
        let mut params = table("Resource = \"ELECTRICITY\"\nNumberHeatPumps = 2");
        resolve_params(SPECS, &mut params).unwrap();
        assert_eq!(params["HeatPumpMaxOutput"], Value::Float(100.0));
        assert!(!params.contains_key("DischargeRate"));
    }

    #[test]
    fn test_resolve_params_disabled_overrides_before_validation() {
        // The out-of-range value would fail validation, but the disabled condition applies first
        let mut params = table("Resource = \"ELECTRICITY\"\nHeatPumpMaxOutput = 5000.0");
        resolve_params(SPECS, &mut params).unwrap();
        assert_eq!(params["HeatPumpMaxOutput"], Value::Float(0.0));
    }

    #[test]
    fn test_resolve_params_integer_converted_to_float() {
        let mut params = table("Resource = \"ELECTRICITY\"\nNumberHeatPumps = 1\nHeatPumpMaxOutput = 7");
        resolve_params(SPECS, &mut params).unwrap();
        assert_eq!(params["HeatPumpMaxOutput"], Value::Float(7.0));
    }

    #[rstest]
    #[case("Resource = \"COAL\"", "Resource (Resource) must be one of [\"ELECTRICITY\", \"HIGH_TEMP_HEAT\"], got \"COAL\"")]
    #[case("NumberHeatPumps = 1", "Missing required parameter: Resource (Resource)")]
    #[case("Resource = \"ELECTRICITY\"\nColour = 1", "Unknown parameter: Colour")]
    #[case(
        "Resource = \"ELECTRICITY\"\nDischargeRate = 1.5",
        "DischargeRate (Discharge rate) must be at most 1, got 1.5"
    )]
    #[case(
        "Resource = \"ELECTRICITY\"\nNumberHeatPumps = 1.5",
        "NumberHeatPumps (Number of heat pumps) has the wrong type: expected Int, got float"
    )]
    fn test_resolve_params_invalid(#[case] contents: &str, #[case] msg: &str) {
        let mut params = table(contents);
        assert_error!(resolve_params(SPECS, &mut params), msg);
    }

    #[test]
    fn test_take_string() {
        let mut params = table("Name = \"Block1\"\nType = 3");
        assert_eq!(take_string(&mut params, "Name").unwrap(), "Block1");
        assert!(take_string(&mut params, "Type").is_err());
        assert!(!params.contains_key("Name"));
    }
}
