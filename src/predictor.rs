//! Serving-time pipeline: validate, encode, predict, project.

use std::sync::Arc;

use crate::artifacts::{ArtifactPaths, Artifacts};
use crate::config::{AppConfig, InputBounds};
use crate::depreciation::{current_year, DepreciationProjector};
use crate::encoder::{ColumnLookup, InferenceEncoder};
use crate::error::{PriceError, Result};
use crate::model::Regressor;
use crate::schema::{ColumnSchema, Dimension};
use crate::types::{Estimate, ForecastPoint, PredictionQuery};
use crate::validator::MetadataValidator;

const MAX_BRAND_LEN: usize = 20;
const NOISE_MARKERS: [&str; 3] = ["http", "www", ".cz"];

pub struct PricePredictor {
    model: Box<dyn Regressor>,
    encoder: InferenceEncoder,
    validator: MetadataValidator,
    projector: DepreciationProjector,
    bounds: InputBounds,
}

impl PricePredictor {
    pub fn new(artifacts: Artifacts, config: &AppConfig) -> Self {
        let labels = config.model.label_mappings();
        Self {
            encoder: InferenceEncoder::new(Arc::clone(&artifacts.schema), labels.clone()),
            validator: MetadataValidator::new(artifacts.metadata, labels),
            model: artifacts.model,
            projector: DepreciationProjector::from_config(&config.model),
            bounds: config.bounds.clone(),
        }
    }

    /// Loads the artifact bundle named by `config.paths`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let artifacts = Artifacts::load(&ArtifactPaths::from_config(&config.paths))?;
        Ok(Self::new(artifacts, config))
    }

    pub fn schema(&self) -> &ColumnSchema {
        self.encoder.schema()
    }

    pub fn validates(&self) -> bool {
        self.validator.is_enabled()
    }

    /// Brand names fit for a picker: no URL fragments, nothing overlong.
    pub fn get_clean_brands(&self) -> Vec<String> {
        let mut brands: Vec<String> = self
            .schema()
            .values(Dimension::Brand)
            .filter(|b| !NOISE_MARKERS.iter().any(|m| b.contains(m)))
            .filter(|b| b.chars().count() <= MAX_BRAND_LEN)
            .map(str::to_string)
            .collect();
        brands.sort();
        brands.dedup();
        brands
    }

    pub fn check_bounds(&self, query: &PredictionQuery) -> Result<()> {
        // An empty label would match every recorded fuel by substring.
        for (field, value) in [("fuel", &query.fuel), ("transmission", &query.transmission)] {
            if value.trim().is_empty() {
                return Err(PriceError::MalformedInput(format!("{} must be selected", field)));
            }
        }
        let max_year = current_year() + self.bounds.years_ahead;
        if query.year < self.bounds.min_year || query.year > max_year {
            return Err(PriceError::MalformedInput(format!(
                "year must be between {} and {}",
                self.bounds.min_year, max_year
            )));
        }
        if query.mileage < 0 || query.mileage > self.bounds.max_mileage {
            return Err(PriceError::MalformedInput(format!(
                "mileage must be between 0 and {}",
                self.bounds.max_mileage
            )));
        }
        Ok(())
    }

    pub fn predict(&self, query: &PredictionQuery) -> Result<f64> {
        self.check_bounds(query)?;
        let brand = self.validator.validate(query)?;
        let query = PredictionQuery { brand, ..query.clone() };

        let encoding = self.encoder.encode(&query);
        for (dim, lookup) in [
            (Dimension::Brand, &encoding.brand),
            (Dimension::Fuel, &encoding.fuel),
            (Dimension::Transmission, &encoding.transmission),
        ] {
            if let ColumnLookup::Unknown { tried } = lookup {
                tracing::warn!("{:?} not in schema (tried {:?}); encoding as baseline", dim, tried);
            }
        }
        let x = encoding.vector.as_slice();
        tracing::debug!(
            "encoded {} {} {} {}: in_dim={} nonzero={}",
            query.brand,
            query.year,
            query.fuel,
            query.transmission,
            x.len(),
            x.iter().filter(|v| **v != 0.0).count()
        );

        self.model.predict(x)
    }

    pub fn predict_price(
        &self,
        year: i32,
        mileage: i64,
        brand: &str,
        fuel: &str,
        transmission: &str,
    ) -> Result<f64> {
        self.predict(&PredictionQuery::new(year, mileage, brand, fuel, transmission))
    }

    /// Depreciation curve for `price`; horizons past
    /// `bounds.max_projection_years` are malformed input.
    pub fn calculate_future_value(
        &self,
        price: f64,
        years: Option<u32>,
        rate: Option<f64>,
    ) -> Result<Vec<ForecastPoint>> {
        if let Some(years) = years.filter(|y| *y > self.bounds.max_projection_years) {
            return Err(PriceError::MalformedInput(format!(
                "projection horizon {} exceeds {} years",
                years, self.bounds.max_projection_years
            )));
        }
        Ok(self.projector.calculate_future_value(price, years, rate))
    }

    pub fn estimate(
        &self,
        query: &PredictionQuery,
        years: Option<u32>,
        rate: Option<f64>,
    ) -> Result<Estimate> {
        let price = self.predict(query)?;
        let forecast = self.calculate_future_value(price, years, rate)?;
        Ok(Estimate { price, forecast })
    }
}
