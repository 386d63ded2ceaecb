//! Used-car price estimation.
//!
//! Offline, [`builder::build`] turns scraped listings into a column schema,
//! a per-brand metadata registry and a fitted model, which
//! [`artifacts::save_bundle`] persists as one unit. At serving time
//! [`predictor::PricePredictor`] loads that unit once and runs every query
//! through validation, encoding, prediction and depreciation.

pub mod artifacts;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod depreciation;
pub mod encoder;
pub mod error;
pub mod model;
pub mod parser;
pub mod predictor;
pub mod schema;
pub mod server;
pub mod types;
pub mod validator;

pub use config::AppConfig;
pub use error::{PriceError, Result, ValidationError};
pub use predictor::PricePredictor;
pub use types::{Estimate, ForecastPoint, PredictionQuery};
