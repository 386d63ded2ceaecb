use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PriceError, Result};

/// A trained price model. Input is always a vector in schema order.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Width of the input vector the model was trained on.
    fn n_features(&self) -> usize;

    fn name(&self) -> &str;
}

/// Serialized model file. `schema_fingerprint` pins the column list it
/// was trained against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Ridge(RidgeModel),
    #[cfg(feature = "torch")]
    Torchscript(TorchScriptSpec),
}

impl ModelArtifact {
    pub fn schema_fingerprint(&self) -> &str {
        match self {
            ModelArtifact::Ridge(m) => &m.schema_fingerprint,
            #[cfg(feature = "torch")]
            ModelArtifact::Torchscript(s) => &s.schema_fingerprint,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            ModelArtifact::Ridge(m) => m.weights.len(),
            #[cfg(feature = "torch")]
            ModelArtifact::Torchscript(s) => s.n_features,
        }
    }

    /// Turns the artifact into a runnable model. Relative paths inside the
    /// artifact resolve against `base_dir`.
    #[cfg_attr(not(feature = "torch"), allow(unused_variables))]
    pub fn into_regressor(self, base_dir: &Path) -> Result<Box<dyn Regressor>> {
        match self {
            ModelArtifact::Ridge(m) => Ok(Box::new(m)),
            #[cfg(feature = "torch")]
            ModelArtifact::Torchscript(spec) => {
                let path = base_dir.join(&spec.path);
                Ok(Box::new(torch::TorchModel::load(&path, spec.n_features)?))
            }
        }
    }
}

/// Ridge regression over standardized features, solved in closed form.
///
/// Indicator columns are collinear (no baseline category is dropped), so the
/// penalty is what keeps the normal equations well posed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    pub schema_fingerprint: String,
    pub lambda: f64,
    pub intercept: f64,
    pub weights: Vec<f64>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl RidgeModel {
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        lambda: f64,
        schema_fingerprint: impl Into<String>,
    ) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(PriceError::EmptyTrainingSet);
        }
        let p = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != p) {
            return Err(PriceError::SchemaMismatch(format!(
                "training row has {} features, expected {}",
                bad.len(),
                p
            )));
        }
        let n = rows.len() as f64;

        let mut means = vec![0.0; p];
        for row in rows {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut scales = vec![0.0; p];
        for row in rows {
            for j in 0..p {
                let d = row[j] - means[j];
                scales[j] += d * d / n;
            }
        }
        for s in scales.iter_mut() {
            *s = s.sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }

        let y_mean = targets.iter().sum::<f64>() / n;

        // Normal equations in standardized space: (Z'Z + λI) w = Z'(y - ȳ)
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        let mut z = vec![0.0; p];
        for (row, y) in rows.iter().zip(targets) {
            for j in 0..p {
                z[j] = (row[j] - means[j]) / scales[j];
            }
            let yc = y - y_mean;
            for i in 0..p {
                rhs[i] += z[i] * yc;
                for k in 0..=i {
                    gram[i][k] += z[i] * z[k];
                }
            }
        }
        for i in 0..p {
            gram[i][i] += lambda;
            for k in 0..i {
                gram[k][i] = gram[i][k];
            }
        }

        let weights = cholesky_solve(gram, rhs)?;
        Ok(Self {
            schema_fingerprint: schema_fingerprint.into(),
            lambda,
            intercept: y_mean,
            weights,
            means,
            scales,
        })
    }
}

impl Regressor for RidgeModel {
    fn predict(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.weights.len() {
            return Err(PriceError::SchemaMismatch(format!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.weights.len()
            )));
        }
        let mut y = self.intercept;
        for j in 0..x.len() {
            y += self.weights[j] * (x[j] - self.means[j]) / self.scales[j];
        }
        Ok(y)
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn name(&self) -> &str {
        "ridge"
    }
}

fn cholesky_solve(a: Vec<Vec<f64>>, b: Vec<f64>) -> Result<Vec<f64>> {
    let p = b.len();
    let mut l = vec![vec![0.0; p]; p];
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(PriceError::Inference(
                        "normal equations are not positive definite".into(),
                    ));
                }
                l[i][i] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L y = b, then L' x = y
    let mut y = vec![0.0; p];
    for i in 0..p {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }
    let mut x = vec![0.0; p];
    for i in (0..p).rev() {
        let mut sum = y[i];
        for k in i + 1..p {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }
    Ok(x)
}

#[cfg(feature = "torch")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorchScriptSpec {
    pub path: std::path::PathBuf,
    pub n_features: usize,
    pub schema_fingerprint: String,
}

#[cfg(feature = "torch")]
mod torch {
    use std::path::Path;
    use tch::{kind::Kind, CModule, Device, Tensor};

    use super::Regressor;
    use crate::error::{PriceError, Result};

    /// TorchScript regressor exported offline; output shape [1, 1] or [1].
    pub struct TorchModel {
        model: CModule,
        device: Device,
        in_dim: usize,
    }

    impl TorchModel {
        pub fn load(path: &Path, in_dim: usize) -> Result<Self> {
            if !path.exists() {
                return Err(PriceError::ArtifactMissing { path: path.to_path_buf() });
            }
            let device = Device::Cpu;
            let model = CModule::load_on_device(path, device).map_err(|e| {
                PriceError::ArtifactCorrupt { path: path.to_path_buf(), reason: e.to_string() }
            })?;

            // Probe output shape with a dummy forward
            let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
            let t = model
                .forward_ts(&[dummy])
                .map_err(|e| PriceError::Inference(e.to_string()))?;
            if t.numel() != 1 {
                return Err(PriceError::ArtifactCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("unexpected model output size: {:?}", t.size()),
                });
            }
            tracing::info!("warmup forward ok ({})", path.display());
            Ok(Self { model, device, in_dim })
        }
    }

    impl Regressor for TorchModel {
        fn predict(&self, x: &[f64]) -> Result<f64> {
            if x.len() != self.in_dim {
                return Err(PriceError::SchemaMismatch(format!(
                    "feature length mismatch: got {}, expected {}",
                    x.len(),
                    self.in_dim
                )));
            }
            let xs: Vec<f32> = x.iter().map(|v| *v as f32).collect();
            let input = Tensor::from_slice(&xs)
                .reshape([1, self.in_dim as i64])
                .to_device(self.device);
            let t = self
                .model
                .forward_ts(&[input])
                .map_err(|e| PriceError::Inference(e.to_string()))?;
            Ok(t.reshape([-1]).double_value(&[0]))
        }

        fn n_features(&self) -> usize {
            self.in_dim
        }

        fn name(&self) -> &str {
            "torchscript"
        }
    }
}
