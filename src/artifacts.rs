use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::builder::TrainedBundle;
use crate::config::PathsConfig;
use crate::error::{PriceError, Result};
use crate::model::{ModelArtifact, Regressor};
use crate::schema::{ColumnSchema, Dimension};
use crate::validator::MetadataRegistry;

/// Locations of the three files that make up one schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub columns: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn from_config(cfg: &PathsConfig) -> Self {
        Self {
            model: cfg.model_dir.join(&cfg.model_filename),
            columns: cfg.model_dir.join(&cfg.columns_filename),
            metadata: cfg.model_dir.join(&cfg.metadata_filename),
        }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let cfg = PathsConfig { model_dir: dir.into(), ..PathsConfig::default() };
        Self::from_config(&cfg)
    }

    fn base_dir(&self) -> &Path {
        self.model.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Loaded artifacts; read-only for the lifetime of the process.
pub struct Artifacts {
    pub model: Box<dyn Regressor>,
    pub schema: Arc<ColumnSchema>,
    /// `None` for bundles written before the registry existed.
    pub metadata: Option<Arc<MetadataRegistry>>,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("model", &self.model.name())
            .field("columns", &self.schema.len())
            .field("metadata", &self.metadata.as_ref().map(|m| m.len()))
            .finish()
    }
}

impl Artifacts {
    pub fn from_bundle(bundle: TrainedBundle) -> Result<Self> {
        check_congruent(&ModelArtifact::Ridge(bundle.model.clone()), &bundle.schema, Some(&bundle.metadata))?;
        Ok(Self {
            model: Box::new(bundle.model),
            schema: Arc::new(bundle.schema),
            metadata: Some(Arc::new(bundle.metadata)),
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let model: ModelArtifact = read_json(&paths.model)?;
        let schema: ColumnSchema = read_json(&paths.columns)?;
        let metadata: Option<MetadataRegistry> = if paths.metadata.exists() {
            Some(read_json(&paths.metadata)?)
        } else {
            tracing::warn!("metadata {} not found; validation disabled", paths.metadata.display());
            None
        };

        check_congruent(&model, &schema, metadata.as_ref())?;
        let model = model.into_regressor(paths.base_dir())?;
        tracing::info!(
            "loaded {} model; {} columns; {} brands in registry",
            model.name(),
            schema.len(),
            metadata.as_ref().map_or(0, |m| m.len())
        );

        Ok(Self {
            model,
            schema: Arc::new(schema),
            metadata: metadata.map(Arc::new),
        })
    }
}

/// Writes model, columns and metadata side by side. Each file goes to a
/// temporary name first and all three are renamed only once every write
/// succeeded.
pub fn save_bundle(bundle: &TrainedBundle, paths: &ArtifactPaths) -> Result<()> {
    let model = ModelArtifact::Ridge(bundle.model.clone());
    check_congruent(&model, &bundle.schema, Some(&bundle.metadata))?;

    let staged = [
        (stage(&paths.columns, &bundle.schema)?, &paths.columns),
        (stage(&paths.metadata, &bundle.metadata)?, &paths.metadata),
        (stage(&paths.model, &model)?, &paths.model),
    ];
    for (tmp, dest) in staged {
        fs::rename(&tmp, dest)?;
    }
    tracing::info!("artifacts written to {}", paths.base_dir().display());
    Ok(())
}

fn stage<T: Serialize>(dest: &Path, value: &T) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    let tmp = dest.with_file_name(name);
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    Ok(tmp)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PriceError::ArtifactMissing { path: path.to_path_buf() });
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| PriceError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Refuses model/columns/metadata combinations from different training runs.
fn check_congruent(
    model: &ModelArtifact,
    schema: &ColumnSchema,
    metadata: Option<&MetadataRegistry>,
) -> Result<()> {
    if model.schema_fingerprint() != schema.fingerprint() {
        return Err(PriceError::SchemaMismatch(format!(
            "model was trained on schema {} but columns are {}",
            model.schema_fingerprint(),
            schema.fingerprint()
        )));
    }
    if model.n_features() != schema.len() {
        return Err(PriceError::SchemaMismatch(format!(
            "model expects {} features, schema has {}",
            model.n_features(),
            schema.len()
        )));
    }
    if let Some(meta) = metadata {
        if let Some(stray) = meta.brands().find(|b| !schema.contains(&Dimension::Brand.column(b))) {
            return Err(PriceError::SchemaMismatch(format!(
                "metadata brand '{}' has no column in the schema",
                stray
            )));
        }
    }
    Ok(())
}
