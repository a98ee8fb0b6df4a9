//! The stateful outlier model: scaler + isolation forest behind a lock.
//!
//! The model starts unfitted, fits itself on the first batch it is asked to
//! score, and stays fitted for the life of the process. `reset` is the only
//! way back to unfitted. Fit, predict and save all run under the same lock.
//! Status reads go through a separate summary so they never wait on a fit.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::detect::forest::{ForestParams, IsolationForest};
use crate::detect::scaler::StandardScaler;
use crate::detect::{DetectError, DetectionResult};

const FOREST_FILE: &str = "outlier_forest.json";
const SCALER_FILE: &str = "feature_scaler.json";

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestBlob {
    trained_at: DateTime<Utc>,
    forest: IsolationForest,
}

/// Directory holding the two persisted model blobs.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self) -> Result<Option<Fitted>, DetectError> {
        let forest_path = self.dir.join(FOREST_FILE);
        let scaler_path = self.dir.join(SCALER_FILE);

        match (forest_path.exists(), scaler_path.exists()) {
            (true, true) => {}
            (false, false) => return Ok(None),
            _ => {
                warn!(dir = %self.dir.display(), "only one model blob present, ignoring both");
                return Ok(None);
            }
        }

        let blob: ForestBlob = serde_json::from_slice(&std::fs::read(&forest_path)?)?;
        let scaler: StandardScaler = serde_json::from_slice(&std::fs::read(&scaler_path)?)?;
        if blob.forest.n_features() != scaler.width() {
            return Err(DetectError::DimensionMismatch {
                expected: blob.forest.n_features(),
                got: scaler.width(),
            });
        }

        Ok(Some(Fitted {
            forest: blob.forest,
            scaler,
            trained_at: blob.trained_at,
        }))
    }

    fn save(&self, fitted: &Fitted) -> Result<(), DetectError> {
        std::fs::create_dir_all(&self.dir)?;
        let blob = ForestBlob {
            trained_at: fitted.trained_at,
            forest: fitted.forest.clone(),
        };
        std::fs::write(self.dir.join(FOREST_FILE), serde_json::to_vec(&blob)?)?;
        std::fs::write(self.dir.join(SCALER_FILE), serde_json::to_vec(&fitted.scaler)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), DetectError> {
        for name in [FOREST_FILE, SCALER_FILE] {
            match std::fs::remove_file(self.dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Fitted {
    forest: IsolationForest,
    scaler: StandardScaler,
    trained_at: DateTime<Utc>,
}

/// Snapshot of the model lifecycle, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub fitted: bool,
    pub trained_samples: Option<usize>,
    pub trained_at: Option<DateTime<Utc>>,
    pub n_estimators: usize,
    pub contamination: f64,
    pub persisted_to: Option<PathBuf>,
}

/// What status reporting needs from a fitted model.
#[derive(Debug, Clone, Copy)]
struct Trained {
    samples: usize,
    at: DateTime<Utc>,
}

impl From<&Fitted> for Trained {
    fn from(fitted: &Fitted) -> Self {
        Self {
            samples: fitted.scaler.sample_count,
            at: fitted.trained_at,
        }
    }
}

pub struct OutlierModel {
    params: ForestParams,
    store: Option<ModelStore>,
    state: Mutex<Option<Fitted>>,
    // Written only while `state` is held; read without it.
    trained: RwLock<Option<Trained>>,
}

impl OutlierModel {
    /// An unfitted model. With a store, the first fit is written to it.
    pub fn new(params: ForestParams, store: Option<ModelStore>) -> Self {
        Self {
            params,
            store,
            state: Mutex::new(None),
            trained: RwLock::new(None),
        }
    }

    /// Build from config, loading persisted blobs when present.
    pub fn open(cfg: &ModelConfig) -> Self {
        let store = cfg.persist.then(|| ModelStore::new(&cfg.dir));
        let model = Self::new(ForestParams::from(cfg), store);

        if let Some(store) = &model.store {
            match store.load() {
                Ok(Some(fitted)) => {
                    info!(
                        dir = %store.dir().display(),
                        samples = fitted.scaler.sample_count,
                        "loaded persisted outlier model"
                    );
                    model.install(fitted);
                }
                Ok(None) => info!("no persisted outlier model, will fit on first batch"),
                Err(e) => {
                    warn!(error = %e, "failed to load persisted outlier model, starting unfitted")
                }
            }
        }
        model
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Fitted>>, DetectError> {
        self.state.lock().map_err(|_| DetectError::LockPoisoned)
    }

    fn install(&self, fitted: Fitted) {
        if let Ok(mut state) = self.lock() {
            self.publish(Some(Trained::from(&fitted)));
            *state = Some(fitted);
        }
    }

    fn publish(&self, trained: Option<Trained>) {
        // A poisoned summary still holds a valid Option; overwrite it.
        let mut slot = self.trained.write().unwrap_or_else(|e| e.into_inner());
        *slot = trained;
    }

    fn trained(&self) -> Option<Trained> {
        *self.trained.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Does not wait on an in-flight fit or predict.
    pub fn is_fitted(&self) -> bool {
        self.trained().is_some()
    }

    /// Does not wait on an in-flight fit or predict.
    pub fn status(&self) -> ModelStatus {
        let trained = self.trained();
        ModelStatus {
            fitted: trained.is_some(),
            trained_samples: trained.map(|t| t.samples),
            trained_at: trained.map(|t| t.at),
            n_estimators: self.params.n_estimators,
            contamination: self.params.contamination,
            persisted_to: self.store.as_ref().map(|s| s.dir().to_path_buf()),
        }
    }

    /// Drop the fitted state and any persisted blobs.
    pub fn reset(&self) -> Result<(), DetectError> {
        let mut state = self.lock()?;
        *state = None;
        self.publish(None);
        if let Some(store) = &self.store {
            store.clear()?;
        }
        info!("outlier model reset to unfitted");
        Ok(())
    }

    /// Score a batch of feature rows. Never fails: on any error every row
    /// gets the all-normal default.
    pub fn score(&self, rows: &[Vec<f64>]) -> Vec<DetectionResult> {
        match self.try_score(rows) {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    error = %e,
                    batch_size = rows.len(),
                    "outlier scoring failed, using defaults"
                );
                vec![DetectionResult::normal(); rows.len()]
            }
        }
    }

    pub fn try_score(&self, rows: &[Vec<f64>]) -> Result<Vec<DetectionResult>, DetectError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.lock()?;
        let fitted = match state.take() {
            Some(fitted) => fitted,
            None => {
                let fitted = self.fit(rows)?;
                if let Some(store) = &self.store {
                    match store.save(&fitted) {
                        Ok(()) => debug!(dir = %store.dir().display(), "persisted outlier model"),
                        Err(e) => warn!(error = %e, "failed to persist outlier model"),
                    }
                }
                self.publish(Some(Trained::from(&fitted)));
                fitted
            }
        };
        let fitted = state.insert(fitted);

        let scaled = fitted.scaler.transform(rows)?;
        let raw = fitted.forest.score_samples(&scaled)?;
        let labels = fitted.forest.label(&raw);

        Ok(labels
            .into_iter()
            .zip(normalize_scores(&raw))
            .map(|(is_anomaly, score)| DetectionResult::new(is_anomaly, score))
            .collect())
    }

    fn fit(&self, rows: &[Vec<f64>]) -> Result<Fitted, DetectError> {
        let scaler = StandardScaler::fit(rows)?;
        let scaled = scaler.transform(rows)?;
        let forest = IsolationForest::fit(&scaled, self.params.clone())?;
        info!(samples = rows.len(), offset = forest.offset(), "outlier model fitted");
        Ok(Fitted {
            forest,
            scaler,
            trained_at: Utc::now(),
        })
    }
}

/// Rescale raw ensemble scores to [0, 1], most anomalous highest.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if raw.is_empty() || max == min {
        return vec![0.0; raw.len()];
    }
    raw.iter()
        .map(|s| ((max - s) / (max - min)).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 50,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }

    fn batch() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![40.0 + (i % 4) as f64, 6.0 + (i % 3) as f64, 2.0])
            .collect();
        rows.push(vec![1500.0, 300.0, 10.0]);
        rows
    }

    #[test]
    fn test_normalize_scores() {
        assert_eq!(normalize_scores(&[]), Vec::<f64>::new());
        assert_eq!(normalize_scores(&[-0.5, -0.5]), vec![0.0, 0.0]);
        let out = normalize_scores(&[-0.4, -0.6, -0.5]);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 1.0);
        assert!((out[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fits_lazily_on_first_batch() {
        let model = OutlierModel::new(params(), None);
        assert!(!model.is_fitted());

        let rows = batch();
        let out = model.score(&rows);
        assert!(model.is_fitted());
        assert_eq!(out.len(), rows.len());

        let last = out.last().unwrap();
        assert!(last.is_anomaly);
        assert_eq!(last.score, 1.0);
        assert!(out.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_single_row_batch_stays_unfitted() {
        let model = OutlierModel::new(params(), None);
        let out = model.score(&[vec![1.0, 2.0, 3.0]]);
        assert_eq!(out, vec![DetectionResult::normal()]);
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_not_refit_after_first_batch() {
        let model = OutlierModel::new(params(), None);
        model.score(&batch());
        let first = model.status().trained_samples;

        model.score(&[vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]]);
        assert_eq!(model.status().trained_samples, first);
    }

    #[test]
    fn test_width_mismatch_degrades_to_defaults() {
        let model = OutlierModel::new(params(), None);
        model.score(&batch());
        let out = model.score(&[vec![1.0], vec![2.0]]);
        assert_eq!(out, vec![DetectionResult::normal(); 2]);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = ModelConfig {
            dir: dir.path().to_path_buf(),
            n_estimators: 20,
            ..ModelConfig::default()
        };

        let model = OutlierModel::open(&cfg);
        assert!(!model.is_fitted());
        let before = model.score(&batch());
        assert!(dir.path().join(FOREST_FILE).exists());
        assert!(dir.path().join(SCALER_FILE).exists());

        let reloaded = OutlierModel::open(&cfg);
        assert!(reloaded.is_fitted());
        assert_eq!(reloaded.score(&batch()), before);

        reloaded.reset().unwrap();
        assert!(!reloaded.is_fitted());
        assert!(!dir.path().join(FOREST_FILE).exists());
        assert!(!OutlierModel::open(&cfg).is_fitted());
    }

    #[test]
    fn test_concurrent_scoring_is_serialized() {
        let model = Arc::new(OutlierModel::new(params(), None));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let model = Arc::clone(&model);
                std::thread::spawn(move || model.score(&batch()))
            })
            .collect();

        let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // Whichever thread fitted, everyone scored against the same model.
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(model.status().trained_samples, Some(31));
    }

    #[test]
    fn test_status_does_not_wait_on_scoring_lock() {
        let model = Arc::new(OutlierModel::new(params(), None));
        model.score(&batch());

        // Stand in for a long fit: hold the scoring lock while status is polled.
        let guard = model.state.lock().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let poller = {
            let model = Arc::clone(&model);
            std::thread::spawn(move || {
                let status = model.status();
                tx.send((status.fitted, status.trained_samples, model.is_fitted()))
                    .unwrap();
            })
        };

        let polled = rx.recv_timeout(std::time::Duration::from_secs(5));
        drop(guard);
        poller.join().unwrap();
        assert_eq!(polled.unwrap(), (true, Some(31), true));
    }

    #[test]
    fn test_reset_clears_status() {
        let model = OutlierModel::new(params(), None);
        model.score(&batch());
        assert!(model.status().trained_at.is_some());

        model.reset().unwrap();
        let status = model.status();
        assert!(!status.fitted);
        assert_eq!(status.trained_samples, None);
        assert_eq!(status.trained_at, None);
    }
}
