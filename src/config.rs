use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use crate::error::{PriceError, Result};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub paths: PathsConfig,
    pub bounds: InputBounds,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            PriceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let cfg: AppConfig = serde_json::from_str(&data)
            .map_err(|e| PriceError::Config(format!("invalid config JSON {}: {}", path.display(), e)))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("config {} not found; using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn check(&self) -> Result<()> {
        if self.model.top_brands == 0 {
            return Err(PriceError::Config("model.top_brands must be at least 1".into()));
        }
        if !(self.model.ridge_lambda > 0.0) {
            return Err(PriceError::Config("model.ridge_lambda must be positive".into()));
        }
        if self.bounds.max_mileage < 0 {
            return Err(PriceError::Config("bounds.max_mileage must not be negative".into()));
        }
        if self.model.future_projection_years > self.bounds.max_projection_years {
            return Err(PriceError::Config(
                "model.future_projection_years exceeds bounds.max_projection_years".into(),
            ));
        }
        Ok(())
    }
}

/// UI label -> schema column tables shared by the encoder and the validator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LabelMappings {
    pub fuel: BTreeMap<String, String>,
    pub transmission: BTreeMap<String, String>,
}

impl LabelMappings {
    pub fn fuel_column(&self, label: &str) -> Option<&str> {
        self.fuel.get(label).map(String::as_str)
    }

    pub fn transmission_column(&self, label: &str) -> Option<&str> {
        self.transmission.get(label).map(String::as_str)
    }
}

impl Default for LabelMappings {
    fn default() -> Self {
        let fuel = [
            ("Petrol", "fuel_Benzín"),
            ("Diesel", "fuel_Nafta"),
            ("Electric", "fuel_Elektro"),
            ("Hybrid", "fuel_Hybridní"),
            ("LPG", "fuel_LPG"),
            ("CNG", "fuel_CNG"),
        ];
        let transmission = [
            ("Manual", "transmission_Manuální"),
            ("Automatic", "transmission_Automatická"),
        ];
        Self {
            fuel: fuel.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            transmission: transmission
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub fuel_mapping: BTreeMap<String, String>,
    pub transmission_mapping: BTreeMap<String, String>,
    pub depreciation_rate: f64,
    pub future_projection_years: u32,
    /// Number of most frequent brands kept for training.
    pub top_brands: usize,
    /// Listings priced at or below this are placeholders.
    pub min_price: i64,
    pub ridge_lambda: f64,
}

impl ModelConfig {
    pub fn label_mappings(&self) -> LabelMappings {
        LabelMappings {
            fuel: self.fuel_mapping.clone(),
            transmission: self.transmission_mapping.clone(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let labels = LabelMappings::default();
        Self {
            fuel_mapping: labels.fuel,
            transmission_mapping: labels.transmission,
            depreciation_rate: 0.10,
            future_projection_years: 5,
            top_brands: 30,
            min_price: 1000,
            ridge_lambda: 1.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub model_dir: PathBuf,
    pub model_filename: String,
    pub columns_filename: String,
    pub metadata_filename: String,
    pub raw_data: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("artifacts"),
            model_filename: "car_price_model.json".into(),
            columns_filename: "model_columns.json".into(),
            metadata_filename: "model_metadata.json".into(),
            raw_data: PathBuf::from("data/raw/sauto_raw_data.csv"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct InputBounds {
    pub min_year: i32,
    /// How many years past the current one a model year may be.
    pub years_ahead: i32,
    pub max_mileage: i64,
    /// Longest depreciation horizon a caller may request.
    pub max_projection_years: u32,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            min_year: 1980,
            years_ahead: 1,
            max_mileage: 2_000_000,
            max_projection_years: 50,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: [u8; 4],
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: [0, 0, 0, 0],
            port: 8080,
        }
    }
}
