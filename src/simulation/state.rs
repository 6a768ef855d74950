//! The explicit, serialisable state threaded through the rolling scheduler.
use super::dispatch::CommittedDispatch;
use crate::agent::{AgentID, Store, StoreLevels, ThermalMassLevels};
use crate::carrier::Carrier;
use crate::horizon::{TradingPeriod, hours_in_month};
use crate::model::Model;
use anyhow::{Result, ensure};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Committed external imports for the current month, from which effect fees are amortised
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectFeeTracker {
    /// The first day of the month being tracked
    pub month: Option<NaiveDate>,
    /// Electricity imported in each committed hour of the month (kWh)
    pub hourly_electricity_imports: Vec<f64>,
    /// Heat imported on each day of the month (kWh), indexed by day of month minus one
    pub daily_heat_imports: Vec<f64>,
    /// Number of hours committed (or skipped) so far in the month
    pub hours_recorded: usize,
}

fn first_of_month(datetime: NaiveDateTime) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(datetime.year(), datetime.month(), 1)
}

impl EffectFeeTracker {
    /// Whether the tracker holds data for the month containing `datetime`
    fn is_current(&self, datetime: NaiveDateTime) -> bool {
        self.month.is_some() && self.month == first_of_month(datetime)
    }

    /// Add an hour's imports, starting a new month if needed
    pub fn record(&mut self, datetime: NaiveDateTime, electricity_import: f64, heat_import: f64) {
        if !self.is_current(datetime) {
            *self = Self {
                month: first_of_month(datetime),
                ..Default::default()
            };
        }

        self.hourly_electricity_imports.push(electricity_import);
        let day = datetime.day0() as usize;
        if self.daily_heat_imports.len() <= day {
            self.daily_heat_imports.resize(day + 1, 0.0);
        }
        self.daily_heat_imports[day] += heat_import;
        self.hours_recorded += 1;
    }

    /// Extrapolate a committed total to the whole month
    fn expected_monthly_total(&self, committed_total: f64, datetime: NaiveDateTime) -> f64 {
        committed_total * hours_in_month(datetime) / self.hours_recorded as f64
    }

    /// The electricity effect fee per kWh imported.
    ///
    /// The fee is charged on the mean of the month's three highest hourly imports, spread over the
    /// month's expected import.
    pub fn amortised_electricity_fee(&self, fee: f64, datetime: NaiveDateTime) -> f64 {
        if !self.is_current(datetime) || self.hours_recorded == 0 {
            return 0.0;
        }

        let total: f64 = self.hourly_electricity_imports.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }

        let mut imports = self.hourly_electricity_imports.clone();
        imports.sort_by(|a, b| b.total_cmp(a));
        let top = &imports[..imports.len().min(3)];
        let peak = top.iter().sum::<f64>() / top.len() as f64;

        fee * peak / self.expected_monthly_total(total, datetime)
    }

    /// The heating effect fee per kWh imported.
    ///
    /// The fee is charged on the average hourly import of the month's highest-import day.
    pub fn amortised_heat_fee(&self, fee: f64, datetime: NaiveDateTime) -> f64 {
        if !self.is_current(datetime) || self.hours_recorded == 0 {
            return 0.0;
        }

        let total: f64 = self.daily_heat_imports.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }

        let peak_day = self
            .daily_heat_imports
            .iter()
            .copied()
            .fold(0.0, f64::max);

        fee * (peak_day / 24.0) / self.expected_monthly_total(total, datetime)
    }
}

/// Everything which carries over from one trading period to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Index of the next period to commit
    pub next_period: usize,
    /// Current level of each storage unit or building battery (kWh)
    pub storage_levels: IndexMap<AgentID, f64>,
    /// Current level of each accumulator tank (kWh)
    #[serde(default)]
    pub tank_levels: IndexMap<AgentID, f64>,
    /// Heat currently held in each building's structure
    #[serde(default)]
    pub thermal_mass_levels: IndexMap<AgentID, ThermalMassLevels>,
    /// Imports this month, for effect fees
    pub effect_fees: EffectFeeTracker,
}

impl SimulationState {
    /// The state at the start of the simulation
    pub fn new(model: &Model) -> Self {
        let mut state = Self {
            next_period: 0,
            storage_levels: IndexMap::new(),
            tank_levels: IndexMap::new(),
            thermal_mass_levels: model
                .iter_thermal_mass()
                .map(|(id, _)| (id.clone(), ThermalMassLevels::default()))
                .collect(),
            effect_fees: EffectFeeTracker::default(),
        };
        for (id, store, storage) in model.iter_storage() {
            state
                .levels_mut(store)
                .insert(id.clone(), storage.initial_level());
        }

        state
    }

    fn levels(&self, store: Store) -> &IndexMap<AgentID, f64> {
        match store {
            Store::Unit => &self.storage_levels,
            Store::AccumulatorTank => &self.tank_levels,
        }
    }

    fn levels_mut(&mut self, store: Store) -> &mut IndexMap<AgentID, f64> {
        match store {
            Store::Unit => &mut self.storage_levels,
            Store::AccumulatorTank => &mut self.tank_levels,
        }
    }

    /// The current level of one of an agent's stores, if it has that store
    pub fn storage_level(&self, agent_id: &AgentID, store: Store) -> Option<f64> {
        self.levels(store).get(agent_id).copied()
    }

    /// The current levels of all of an agent's stores
    pub fn store_levels(&self, agent_id: &AgentID) -> StoreLevels {
        [Store::Unit, Store::AccumulatorTank]
            .into_iter()
            .filter_map(|store| Some((store, self.storage_level(agent_id, store)?)))
            .collect()
    }

    /// Iterate over the level of every store
    pub fn iter_store_levels(&self) -> impl Iterator<Item = (&AgentID, Store, f64)> {
        [Store::Unit, Store::AccumulatorTank]
            .into_iter()
            .flat_map(move |store| {
                self.levels(store)
                    .iter()
                    .map(move |(id, &level)| (id, store, level))
            })
    }

    fn check_next(&self, period: &TradingPeriod) -> Result<()> {
        ensure!(
            period.index == self.next_period,
            "Cannot commit period {} when the next period is {}",
            period.index,
            self.next_period
        );

        Ok(())
    }

    /// Apply a committed dispatch and advance to the next period.
    ///
    /// Each period can only be committed once.
    pub fn commit(&mut self, dispatch: &CommittedDispatch) -> Result<()> {
        self.check_next(&dispatch.period)?;

        for (agent_id, store, level) in dispatch.iter_storage_levels() {
            let Some(current) = self.levels_mut(store).get_mut(agent_id) else {
                continue;
            };
            *current = level;
        }
        for (agent_id, levels) in dispatch.iter_thermal_mass_levels() {
            let Some(current) = self.thermal_mass_levels.get_mut(agent_id) else {
                continue;
            };
            *current = levels;
        }

        self.effect_fees.record(
            dispatch.period.start,
            dispatch.total_import(Carrier::Electricity),
            dispatch.total_import(Carrier::HighTempHeat),
        );
        self.next_period += 1;

        Ok(())
    }

    /// Advance past a period without committing anything.
    ///
    /// Storage levels stay at their last known good values.
    pub fn skip(&mut self, period: &TradingPeriod) -> Result<()> {
        self.check_next(period)?;
        self.effect_fees.record(period.start, 0.0, 0.0);
        self.next_period += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::datetime;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_effect_fee_tracker_resets_each_month() {
        let mut tracker = EffectFeeTracker::default();
        tracker.record(datetime(1, 31, 23), 5.0, 2.0);
        assert_eq!(tracker.hours_recorded, 1);
        assert_eq!(tracker.daily_heat_imports.len(), 31);

        tracker.record(datetime(2, 1, 0), 3.0, 1.0);
        assert_eq!(tracker.month, NaiveDate::from_ymd_opt(2019, 2, 1));
        assert_eq!(tracker.hourly_electricity_imports.len(), 1);
        assert_eq!(tracker.hours_recorded, 1);
    }

    #[test]
    fn test_amortised_electricity_fee() {
        let mut tracker = EffectFeeTracker::default();
        for import in [1.0, 4.0, 2.0, 3.0] {
            tracker.record(datetime(3, 1, 0), import, 0.0);
        }

        // Peak is the mean of 4, 3 and 2; the month's 10 kWh is extrapolated from four hours
        let expected_total = 10.0 * 744.0 / 4.0;
        assert_approx_eq!(
            f64,
            tracker.amortised_electricity_fee(35.0, datetime(3, 1, 4)),
            35.0 * 3.0 / expected_total
        );

        // A new month has no history yet
        assert_approx_eq!(f64, tracker.amortised_electricity_fee(35.0, datetime(4, 1, 0)), 0.0);
    }

    #[test]
    fn test_amortised_heat_fee() {
        let mut tracker = EffectFeeTracker::default();
        tracker.record(datetime(3, 1, 0), 0.0, 24.0);
        tracker.record(datetime(3, 2, 0), 0.0, 48.0);

        let expected_total = 72.0 * 744.0 / 2.0;
        assert_approx_eq!(
            f64,
            tracker.amortised_heat_fee(68.0, datetime(3, 2, 1)),
            68.0 * 2.0 / expected_total
        );
    }

    #[test]
    fn test_no_fee_without_imports() {
        let mut tracker = EffectFeeTracker::default();
        tracker.record(datetime(3, 1, 0), 0.0, 0.0);
        assert_approx_eq!(f64, tracker.amortised_electricity_fee(35.0, datetime(3, 1, 1)), 0.0);
        assert_approx_eq!(f64, tracker.amortised_heat_fee(68.0, datetime(3, 1, 1)), 0.0);
    }
}
