use chrono::Datelike;

use crate::config::ModelConfig;
use crate::types::ForecastPoint;

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// `years + 1` points: the price itself in `start_year`, then
/// `price * (1 - rate)^k` for each following year. Rates are not bounded;
/// the curve stops early if a year would overflow `i32`.
pub fn project(price: f64, years: u32, rate: f64, start_year: i32) -> Vec<ForecastPoint> {
    let factor = 1.0 - rate;
    (0..=years)
        .map_while(|k| {
            let k = i32::try_from(k).ok()?;
            Some(ForecastPoint {
                year: start_year.checked_add(k)?,
                price: price * factor.powi(k),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepreciationProjector {
    pub default_years: u32,
    pub default_rate: f64,
}

impl DepreciationProjector {
    pub fn new(default_years: u32, default_rate: f64) -> Self {
        Self { default_years, default_rate }
    }

    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self::new(cfg.future_projection_years, cfg.depreciation_rate)
    }

    pub fn calculate_future_value(
        &self,
        price: f64,
        years: Option<u32>,
        rate: Option<f64>,
    ) -> Vec<ForecastPoint> {
        self.calculate_from(price, years, rate, current_year())
    }

    pub fn calculate_from(
        &self,
        price: f64,
        years: Option<u32>,
        rate: Option<f64>,
        start_year: i32,
    ) -> Vec<ForecastPoint> {
        let years = years.unwrap_or(self.default_years);
        let rate = rate.unwrap_or(self.default_rate);
        if !(0.0..=1.0).contains(&rate) {
            tracing::warn!("depreciation rate {} is outside [0, 1]", rate);
        }
        project(price, years, rate, start_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_year_curve() {
        let p = 500_000.0;
        let curve = DepreciationProjector::new(5, 0.10).calculate_future_value(p, Some(5), Some(0.10));
        let year = current_year();

        assert_eq!(curve.len(), 6);
        assert_eq!(curve[0], ForecastPoint { year, price: p });
        for (k, point) in curve.iter().enumerate() {
            assert_eq!(point.year, year + k as i32);
            assert_eq!(point.price, p * (1.0f64 - 0.10).powi(k as i32));
        }
    }

    #[test]
    fn test_defaults_from_config() {
        let projector = DepreciationProjector::from_config(&ModelConfig::default());
        let curve = projector.calculate_from(100.0, None, None, 2024);
        assert_eq!(curve.len(), 6);
        assert_eq!(curve.last().unwrap().year, 2029);
        assert!((curve[1].price - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_horizon_and_unbounded_rates() {
        assert_eq!(project(1000.0, 0, 0.1, 2024), vec![ForecastPoint { year: 2024, price: 1000.0 }]);

        // Rates outside [0, 1] pass through unchanged.
        let growth = project(1000.0, 2, -0.5, 2024);
        assert_eq!(growth[2].price, 2250.0);
        let flip = project(1000.0, 1, 1.5, 2024);
        assert_eq!(flip[1].price, -500.0);
    }

    #[test]
    fn test_year_overflow_ends_curve() {
        let curve = project(1000.0, 3, 0.1, i32::MAX - 1);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[1].year, i32::MAX);
    }
}
