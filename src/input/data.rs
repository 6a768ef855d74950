//! Code for reading exogenous time series from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::agent::AgentMap;
use crate::area::AreaInfo;
use crate::carrier::Carrier;
use crate::data::{ConsumptionSample, ExogenousData};
use crate::id::IDCollection;
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

const CONSUMPTION_FILE_NAME: &str = "consumption.csv";
const SPOT_PRICES_FILE_NAME: &str = "spot_prices.csv";
const IRRADIATION_FILE_NAME: &str = "irradiation.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct ConsumptionRaw {
    agent_id: String,
    datetime: NaiveDateTime,
    carrier: Carrier,
    expected: f64,
    #[serde(default)]
    relative_std_dev: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct SpotPriceRaw {
    datetime: NaiveDateTime,
    price: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct IrradiationRaw {
    datetime: NaiveDateTime,
    irradiation: f64,
}

/// Read consumption, spot price and irradiation data.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `agents` - The agents in the model
/// * `area` - Community-wide parameters
pub fn read_exogenous_data(
    model_dir: &Path,
    agents: &AgentMap,
    area: &AreaInfo,
) -> Result<ExogenousData> {
    let mut data = ExogenousData::new(area.electricity_price_year);

    let file_path = model_dir.join(CONSUMPTION_FILE_NAME);
    read_consumption_from_iter(read_csv(&file_path)?, agents, &mut data)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(SPOT_PRICES_FILE_NAME);
    read_spot_prices_from_iter(read_csv(&file_path)?, area, &mut data)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(IRRADIATION_FILE_NAME);
    read_irradiation_from_iter(read_csv_optional(&file_path)?, &mut data)
        .with_context(|| input_err_msg(&file_path))?;
    ensure!(
        data.has_irradiation() || agents.values().all(|agent| agent.pv().is_none()),
        "{IRRADIATION_FILE_NAME} is required when agents have PV"
    );

    Ok(data)
}

fn read_consumption_from_iter<I>(iter: I, agents: &AgentMap, data: &mut ExogenousData) -> Result<()>
where
    I: Iterator<Item = ConsumptionRaw>,
{
    for row in iter {
        let agent_id = agents.get_id_by_str(&row.agent_id)?;
        ensure!(
            !agents[&agent_id].is_grid(),
            "Consumption cannot be given for grid agent {agent_id}"
        );
        ensure!(
            row.expected.is_finite(),
            "Expected consumption must be a finite number"
        );
        ensure!(
            row.relative_std_dev.is_finite() && row.relative_std_dev >= 0.0,
            "relative_std_dev must be a non-negative number"
        );

        let sample = ConsumptionSample {
            expected: row.expected,
            relative_std_dev: row.relative_std_dev,
        };
        data.insert_consumption(agent_id, row.carrier, row.datetime, sample)?;
    }

    Ok(())
}

fn read_spot_prices_from_iter<I>(iter: I, area: &AreaInfo, data: &mut ExogenousData) -> Result<()>
where
    I: Iterator<Item = SpotPriceRaw>,
{
    let mut found_year = false;
    for row in iter {
        ensure!(row.price.is_finite(), "Spot price must be a finite number");
        found_year |= row.datetime.year() == area.electricity_price_year;
        data.insert_spot_price(row.datetime, row.price)?;
    }

    ensure!(
        found_year,
        "No spot prices for ElectricityPriceYear ({})",
        area.electricity_price_year
    );

    Ok(())
}

fn read_irradiation_from_iter<I>(iter: I, data: &mut ExogenousData) -> Result<()>
where
    I: Iterator<Item = IrradiationRaw>,
{
    for row in iter {
        ensure!(
            row.irradiation.is_finite() && row.irradiation >= 0.0,
            "Irradiation must be a non-negative number"
        );
        data.insert_irradiation(row.datetime, row.irradiation)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentKind, GridConnection};
    use crate::fixture::{area_info, assert_error, building, datetime};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::tempdir;

    #[fixture]
    fn agents(building: Agent) -> AgentMap {
        let grid = Agent {
            id: "Grid".into(),
            kind: AgentKind::Grid(GridConnection {
                carrier: Carrier::Electricity,
                transfer_rate: 100.0,
            }),
        };
        [building, grid]
            .into_iter()
            .map(|agent| (agent.id.clone(), agent))
            .collect()
    }

    fn consumption(agent_id: &str, expected: f64, relative_std_dev: f64) -> ConsumptionRaw {
        ConsumptionRaw {
            agent_id: agent_id.into(),
            datetime: datetime(1, 1, 0),
            carrier: Carrier::Electricity,
            expected,
            relative_std_dev,
        }
    }

    #[rstest]
    fn test_read_consumption(agents: AgentMap) {
        let mut data = ExogenousData::new(2019);
        read_consumption_from_iter(
            [consumption("Building", 5.0, 0.1)].into_iter(),
            &agents,
            &mut data,
        )
        .unwrap();
        let forecast = data.forecast(&"Building".into(), datetime(1, 1, 0)).unwrap();
        assert_approx_eq!(f64, forecast[&Carrier::Electricity].expected, 5.0);
    }

    #[rstest]
    #[case(consumption("Nobody", 1.0, 0.0), "Unknown ID Nobody found")]
    #[case(
        consumption("Grid", 1.0, 0.0),
        "Consumption cannot be given for grid agent Grid"
    )]
    #[case(
        consumption("Building", 1.0, -0.1),
        "relative_std_dev must be a non-negative number"
    )]
    fn test_read_consumption_invalid(
        agents: AgentMap,
        #[case] row: ConsumptionRaw,
        #[case] msg: &str,
    ) {
        let mut data = ExogenousData::new(2019);
        assert_error!(
            read_consumption_from_iter([row].into_iter(), &agents, &mut data),
            msg
        );
    }

    #[rstest]
    fn test_spot_prices_must_cover_price_year(area_info: AreaInfo) {
        let mut data = ExogenousData::new(area_info.electricity_price_year);
        let row = SpotPriceRaw {
            datetime: datetime(1, 1, 0).with_year(2018).unwrap(),
            price: 0.5,
        };
        assert_error!(
            read_spot_prices_from_iter([row].into_iter(), &area_info, &mut data),
            "No spot prices for ElectricityPriceYear (2019)"
        );
    }

    #[rstest]
    fn test_read_exogenous_data(agents: AgentMap, area_info: AreaInfo) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONSUMPTION_FILE_NAME),
            "agent_id,datetime,carrier,expected,relative_std_dev\n\
            Building,2019-01-01T00:00:00,electricity,3.5,0.1\n\
            Building,2019-01-01T00:00:00,high_temp_heat,10,0.2\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(SPOT_PRICES_FILE_NAME),
            "datetime,price\n2019-01-01T00:00:00,0.45\n",
        )
        .unwrap();

        // The building has PV, so irradiation is needed
        assert!(read_exogenous_data(dir.path(), &agents, &area_info).is_err());

        fs::write(
            dir.path().join(IRRADIATION_FILE_NAME),
            "datetime,irradiation\n2019-01-01T00:00:00,0\n",
        )
        .unwrap();
        let data = read_exogenous_data(dir.path(), &agents, &area_info).unwrap();
        assert_approx_eq!(f64, data.spot_price(datetime(1, 1, 0)).unwrap(), 0.45);
        assert_approx_eq!(f64, data.irradiation(datetime(1, 1, 0)).unwrap(), 0.0);
        let forecast = data.forecast(&"Building".into(), datetime(1, 1, 0)).unwrap();
        assert_approx_eq!(f64, forecast[&Carrier::HighTempHeat].relative_std_dev, 0.2);
    }
}
