//! Realised consumption for the leading period of each horizon.
use crate::carrier::Carrier;
use crate::data::Forecast;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides how much an agent actually consumes, given a forecast
pub trait DemandObserver {
    /// The realised consumption per carrier (kWh)
    fn observe(&mut self, forecast: &Forecast) -> IndexMap<Carrier, f64>;
}

/// Consumption is exactly as forecast
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedValues;

impl DemandObserver for ExpectedValues {
    fn observe(&mut self, forecast: &Forecast) -> IndexMap<Carrier, f64> {
        forecast
            .iter()
            .map(|(&carrier, sample)| (carrier, sample.expected))
            .collect()
    }
}

/// Consumption deviates from the forecast by normally distributed noise
#[derive(Debug, Clone)]
pub struct NoisyObservations {
    rng: StdRng,
}

impl NoisyObservations {
    /// Create an observer with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw from a standard normal distribution (Box-Muller transform)
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.random::<f64>().clamp(1e-12, 1.0);
        let u2: f64 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl DemandObserver for NoisyObservations {
    fn observe(&mut self, forecast: &Forecast) -> IndexMap<Carrier, f64> {
        forecast
            .iter()
            .map(|(&carrier, sample)| {
                if sample.relative_std_dev <= 0.0 || sample.expected == 0.0 {
                    return (carrier, sample.expected);
                }

                let realised =
                    sample.expected * (1.0 + sample.relative_std_dev * self.standard_normal());

                // Consumption can't turn into supply (or vice versa)
                let realised = if realised * sample.expected < 0.0 {
                    0.0
                } else {
                    realised
                };
                (carrier, realised)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ConsumptionSample;
    use float_cmp::assert_approx_eq;

    fn forecast(relative_std_dev: f64) -> Forecast {
        IndexMap::from([
            (
                Carrier::Electricity,
                ConsumptionSample {
                    expected: 10.0,
                    relative_std_dev,
                },
            ),
            (
                Carrier::LowTempHeat,
                ConsumptionSample {
                    expected: -4.0,
                    relative_std_dev,
                },
            ),
        ])
    }

    #[test]
    fn test_expected_values() {
        let observed = ExpectedValues.observe(&forecast(0.3));
        assert_approx_eq!(f64, observed[&Carrier::Electricity], 10.0);
        assert_approx_eq!(f64, observed[&Carrier::LowTempHeat], -4.0);
    }

    #[test]
    fn test_no_noise_without_std_dev() {
        let observed = NoisyObservations::new(1).observe(&forecast(0.0));
        assert_approx_eq!(f64, observed[&Carrier::Electricity], 10.0);
    }

    #[test]
    fn test_noise_is_seeded() {
        let a = NoisyObservations::new(42).observe(&forecast(0.2));
        let b = NoisyObservations::new(42).observe(&forecast(0.2));
        let c = NoisyObservations::new(43).observe(&forecast(0.2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_noise_keeps_sign() {
        let mut observer = NoisyObservations::new(7);
        for _ in 0..200 {
            let observed = observer.observe(&forecast(2.0));
            assert!(observed[&Carrier::Electricity] >= 0.0);
            assert!(observed[&Carrier::LowTempHeat] <= 0.0);
        }
    }
}
