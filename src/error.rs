use std::path::PathBuf;

use thiserror::Error;

/// Why a query was refused by the metadata validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Brand '{brand}' not found in database.")]
    UnknownBrand { brand: String },

    #[error("'{brand}' with '{fuel}' engine not found in database.\nAvailable: {}", .available.join(", "))]
    FuelNotObserved {
        brand: String,
        fuel: String,
        available: Vec<String>,
    },

    #[error("'{brand}' with '{transmission}' transmission not found in database.\nAvailable: {}", .available.join(", "))]
    TransmissionNotObserved {
        brand: String,
        transmission: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("artifact not found: {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("artifact {} is unreadable: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error(transparent)]
    ValidationRejected(#[from] ValidationError),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("no usable training rows after cleaning")]
    EmptyTrainingSet,

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PriceError {
    /// Recoverable errors the caller should answer by re-prompting the user.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PriceError::ValidationRejected(_) | PriceError::MalformedInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PriceError>;
