//! Trading periods and the rolling horizon.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// The first and last months (inclusive) in which heat pumps run in low-temperature mode
const SUMMER_MONTHS: std::ops::RangeInclusive<u32> = 5..=9;

/// The temperature level heat pumps deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatPumpMode {
    /// Heat pumps produce high-temperature heat directly
    HighTemp,
    /// Heat pumps produce low-temperature heat; booster pumps lift it for hot water
    LowTemp,
}

/// Whether the month (1-12) falls in the summer season
pub fn is_summer_month(month: u32) -> bool {
    SUMMER_MONTHS.contains(&month)
}

/// The number of hours in January and February of the given year
pub fn hours_in_jan_feb(year: i32) -> f64 {
    let days = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        60
    } else {
        59
    };
    f64::from(days * 24)
}

/// The number of hours in the month containing `datetime`
pub fn hours_in_month(datetime: NaiveDateTime) -> f64 {
    let (year, month) = (datetime.year(), datetime.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let days = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .zip(NaiveDate::from_ymd_opt(year, month, 1))
        .map_or(30, |(next, this)| (next - this).num_days());
    (days * 24) as f64
}

/// An hour-long slot of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradingPeriod {
    /// Number of hours since the start of the simulation
    pub index: usize,
    /// The start of the hour
    pub start: NaiveDateTime,
}

impl TradingPeriod {
    /// Create the period `index` hours after `simulation_start`
    pub fn new(simulation_start: NaiveDateTime, index: usize) -> Self {
        Self {
            index,
            start: simulation_start + Duration::hours(i64::try_from(index).unwrap_or(i64::MAX)),
        }
    }

    /// The heat pump operating mode in this period
    pub fn heat_pump_mode(&self) -> HeatPumpMode {
        if is_summer_month(self.start.month()) {
            HeatPumpMode::LowTemp
        } else {
            HeatPumpMode::HighTemp
        }
    }
}

/// An ordered sequence of trading periods solved jointly.
///
/// Only the first period's decisions are ever committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizon {
    periods: Vec<TradingPeriod>,
}

impl Horizon {
    /// Create the horizon beginning at period `first`.
    ///
    /// The horizon is truncated so that it does not extend past the end of the simulated range.
    ///
    /// # Arguments
    ///
    /// * `simulation_start` - The first hour of the simulation
    /// * `first` - Index of the horizon's leading period
    /// * `length` - The configured trading horizon length
    /// * `simulation_hours` - Total number of simulated hours
    pub fn new(
        simulation_start: NaiveDateTime,
        first: usize,
        length: usize,
        simulation_hours: usize,
    ) -> Self {
        let end = (first + length).min(simulation_hours);
        let periods = (first..end)
            .map(|index| TradingPeriod::new(simulation_start, index))
            .collect();

        Self { periods }
    }

    /// The leading (committed) period
    pub fn first(&self) -> &TradingPeriod {
        &self.periods[0]
    }

    /// Number of periods in the horizon
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the horizon contains no periods
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Iterate over the periods of the horizon in order
    pub fn iter(&self) -> impl Iterator<Item = &TradingPeriod> {
        self.periods.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn datetime(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[rstest]
    #[case(1, HeatPumpMode::HighTemp)]
    #[case(4, HeatPumpMode::HighTemp)]
    #[case(5, HeatPumpMode::LowTemp)]
    #[case(9, HeatPumpMode::LowTemp)]
    #[case(10, HeatPumpMode::HighTemp)]
    fn test_heat_pump_mode(#[case] month: u32, #[case] expected: HeatPumpMode) {
        let period = TradingPeriod::new(datetime(month, 1, 0), 0);
        assert_eq!(period.heat_pump_mode(), expected);
    }

    #[test]
    fn test_horizon_truncated_at_end() {
        let horizon = Horizon::new(datetime(1, 1, 0), 20, 24, 30);
        assert_eq!(horizon.len(), 10);
        assert_eq!(horizon.first().index, 20);
        assert_eq!(horizon.first().start, datetime(1, 1, 20));
        assert_eq!(horizon.iter().last().unwrap().start, datetime(1, 2, 5));
    }

    #[test]
    fn test_hours_in_jan_feb() {
        assert_approx_eq!(f64, hours_in_jan_feb(2019), 1416.0);
        assert_approx_eq!(f64, hours_in_jan_feb(2020), 1440.0);
    }

    #[rstest]
    #[case(datetime(2, 10, 3), 672.0)]
    #[case(datetime(12, 31, 23), 744.0)]
    fn test_hours_in_month(#[case] dt: NaiveDateTime, #[case] expected: f64) {
        assert_approx_eq!(f64, hours_in_month(dt), expected);
    }
}
