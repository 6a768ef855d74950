//! Exogenous time series: consumption forecasts, spot prices and solar irradiation.
use crate::agent::AgentID;
use crate::carrier::Carrier;
use crate::error::DataGapError;
use anyhow::{Result, ensure};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use std::collections::HashMap;

/// An agent's forecast consumption of one carrier for one hour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumptionSample {
    /// Expected consumption (kWh; negative for supply)
    pub expected: f64,
    /// Relative standard deviation of the realised value around the expected value
    pub relative_std_dev: f64,
}

/// An agent's forecast consumption of every carrier for one hour
pub type Forecast = IndexMap<Carrier, ConsumptionSample>;

/// All the exogenous data the simulation consumes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExogenousData {
    consumption: IndexMap<(AgentID, Carrier), HashMap<NaiveDateTime, ConsumptionSample>>,
    spot_prices: HashMap<NaiveDateTime, f64>,
    irradiation: HashMap<NaiveDateTime, f64>,
    price_year: i32,
}

impl ExogenousData {
    /// Create an empty data set whose spot prices are taken from `price_year`
    pub fn new(price_year: i32) -> Self {
        Self {
            price_year,
            ..Default::default()
        }
    }

    /// Add a consumption value for an agent, carrier and hour
    pub fn insert_consumption(
        &mut self,
        agent_id: AgentID,
        carrier: Carrier,
        datetime: NaiveDateTime,
        sample: ConsumptionSample,
    ) -> Result<()> {
        let series = self.consumption.entry((agent_id.clone(), carrier)).or_default();
        ensure!(
            series.insert(datetime, sample).is_none(),
            "Duplicate {carrier} consumption for agent {agent_id} at {datetime}"
        );

        Ok(())
    }

    /// Add a spot price for an hour
    pub fn insert_spot_price(&mut self, datetime: NaiveDateTime, price: f64) -> Result<()> {
        ensure!(
            self.spot_prices.insert(datetime, price).is_none(),
            "Duplicate spot price for {datetime}"
        );

        Ok(())
    }

    /// Add an irradiation value for an hour
    pub fn insert_irradiation(&mut self, datetime: NaiveDateTime, irradiation: f64) -> Result<()> {
        ensure!(
            self.irradiation.insert(datetime, irradiation).is_none(),
            "Duplicate irradiation for {datetime}"
        );

        Ok(())
    }

    /// Whether any irradiation data was provided
    pub fn has_irradiation(&self) -> bool {
        !self.irradiation.is_empty()
    }

    /// Iterate over the agents and carriers which have consumption series
    pub fn iter_consumption_keys(&self) -> impl Iterator<Item = &(AgentID, Carrier)> {
        self.consumption.keys()
    }

    /// Iterate over an agent's consumption of one carrier, in no particular order
    pub fn iter_consumption(
        &self,
        agent_id: &AgentID,
        carrier: Carrier,
    ) -> impl Iterator<Item = (&NaiveDateTime, &ConsumptionSample)> {
        self.consumption
            .get(&(agent_id.clone(), carrier))
            .into_iter()
            .flatten()
    }

    /// The consumption forecast for an agent in an hour.
    ///
    /// Carriers for which the agent has no series are absent from the forecast. An agent with a
    /// series that lacks this hour is a data gap.
    pub fn forecast(&self, agent_id: &AgentID, datetime: NaiveDateTime) -> Result<Forecast> {
        let mut forecast = Forecast::new();
        for ((id, carrier), series) in &self.consumption {
            if id != agent_id {
                continue;
            }

            let sample = series.get(&datetime).ok_or_else(|| DataGapError {
                what: format!("{carrier} consumption for agent {agent_id}"),
                datetime,
            })?;
            forecast.insert(*carrier, *sample);
        }

        Ok(forecast)
    }

    /// The spot price for an hour.
    ///
    /// Prices are looked up at the same month, day and hour of the configured price year.
    pub fn spot_price(&self, datetime: NaiveDateTime) -> Result<f64> {
        let key = self.price_datetime(datetime);
        let price = self.spot_prices.get(&key).copied().ok_or(DataGapError {
            what: "spot price".into(),
            datetime: key,
        })?;

        Ok(price)
    }

    /// The solar irradiation for an hour
    pub fn irradiation(&self, datetime: NaiveDateTime) -> Result<f64> {
        let irradiation = self.irradiation.get(&datetime).copied().ok_or(DataGapError {
            what: "irradiation".into(),
            datetime,
        })?;

        Ok(irradiation)
    }

    /// Map a simulated hour onto the price year
    fn price_datetime(&self, datetime: NaiveDateTime) -> NaiveDateTime {
        let date = NaiveDate::from_ymd_opt(self.price_year, datetime.month(), datetime.day())
            .or_else(|| NaiveDate::from_ymd_opt(self.price_year, datetime.month(), 28))
            .unwrap_or(datetime.date());

        date.and_time(datetime.time())
            .with_minute(0)
            .unwrap_or(datetime)
    }
}
