use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PriceError, Result};

/// One scraped ad, exactly as the crawler wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawListing {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub raw_price: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Fuel {
    #[serde(rename = "Benzín")]
    Benzin,
    Nafta,
    Elektro,
    #[serde(rename = "LPG")]
    Lpg,
    #[serde(rename = "Hybridní")]
    Hybridni,
    #[serde(rename = "CNG")]
    Cng,
    Other,
}

impl Fuel {
    /// Recognised fuels in match priority order.
    pub const PRIORITY: [Fuel; 6] = [
        Fuel::Benzin,
        Fuel::Nafta,
        Fuel::Elektro,
        Fuel::Lpg,
        Fuel::Hybridni,
        Fuel::Cng,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Fuel::Benzin => "Benzín",
            Fuel::Nafta => "Nafta",
            Fuel::Elektro => "Elektro",
            Fuel::Lpg => "LPG",
            Fuel::Hybridni => "Hybridní",
            Fuel::Cng => "CNG",
            Fuel::Other => "Other",
        }
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Transmission {
    #[serde(rename = "Manuální")]
    Manualni,
    #[serde(rename = "Automatická")]
    Automaticka,
}

impl Transmission {
    pub fn as_str(self) -> &'static str {
        match self {
            Transmission::Manualni => "Manuální",
            Transmission::Automaticka => "Automatická",
        }
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes extracted from a listing. `None` marks an unparseable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeatures {
    pub year: Option<i32>,
    pub mileage: Option<i64>,
    pub fuel: Fuel,
    pub transmission: Transmission,
    pub brand: Option<String>,
}

impl ParsedFeatures {
    /// Joins the features with a cleaned price; any missing field drops the row.
    pub fn into_training_row(self, price: Option<i64>) -> Option<TrainingRow> {
        Some(TrainingRow {
            year: self.year?,
            mileage: self.mileage?,
            fuel: self.fuel,
            transmission: self.transmission,
            brand: self.brand?,
            price: price?,
        })
    }
}

/// A complete row of the training table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub year: i32,
    pub mileage: i64,
    pub fuel: Fuel,
    pub transmission: Transmission,
    pub brand: String,
    pub price: i64,
}

/// A price request phrased in the presentation layer's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictionQuery {
    pub year: i32,
    pub mileage: i64,
    pub brand: String,
    pub fuel: String,
    pub transmission: String,
}

impl PredictionQuery {
    pub fn new(
        year: i32,
        mileage: i64,
        brand: impl Into<String>,
        fuel: impl Into<String>,
        transmission: impl Into<String>,
    ) -> Self {
        Self {
            year,
            mileage,
            brand: brand.into(),
            fuel: fuel.into(),
            transmission: transmission.into(),
        }
    }

    /// Builds a query from raw form text; non-numeric year or mileage is malformed.
    pub fn from_text(
        year: &str,
        mileage: &str,
        brand: &str,
        fuel: &str,
        transmission: &str,
    ) -> Result<Self> {
        let year = year
            .trim()
            .parse::<i32>()
            .map_err(|_| PriceError::MalformedInput(format!("year '{}' is not a number", year.trim())))?;
        let mileage = mileage.trim().parse::<i64>().map_err(|_| {
            PriceError::MalformedInput(format!("mileage '{}' is not a number", mileage.trim()))
        })?;
        for (field, value) in [("brand", brand), ("fuel", fuel), ("transmission", transmission)] {
            if value.trim().is_empty() {
                return Err(PriceError::MalformedInput(format!("{} must be selected", field)));
            }
        }
        Ok(Self::new(year, mileage, brand.trim(), fuel.trim(), transmission.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub price: f64,
}

/// Predicted price together with its depreciation curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub price: f64,
    pub forecast: Vec<ForecastPoint>,
}
