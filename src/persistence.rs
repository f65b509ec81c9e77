//! Named model storage on disk
//!
//! Each model lives in `<dir>/<name>.bin` as the bincode encoding
//! produced by [`Forecaster::to_bytes`].

use crate::error::{ForecastError, Result};
use crate::model::Forecaster;
use crate::utils::{ensure_dir, format_size};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Default model name used by the CLI
pub const DEFAULT_MODEL_NAME: &str = "bitcoin-price-model";

/// Directory-backed store of trained forecasters
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File backing `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Writes a trained forecaster under `name`, replacing any previous one
    pub fn save(&self, name: &str, model: &Forecaster) -> Result<PathBuf> {
        validate_name(name)?;
        let bytes = model.to_bytes()?;
        ensure_dir(&self.dir).map_err(|e| ForecastError::Persistence(e.to_string()))?;

        let path = self.path_for(name);
        fs::write(&path, &bytes).map_err(|e| ForecastError::Persistence(format!("{}: {}", path.display(), e)))?;
        info!(
            "Saved model '{}' ({}) to {}",
            name,
            format_size(bytes.len() as u64),
            path.display()
        );
        Ok(path)
    }

    /// Reads the forecaster stored under `name`
    pub fn read(&self, name: &str) -> Result<Forecaster> {
        validate_name(name)?;
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| ForecastError::Persistence(format!("{}: {}", path.display(), e)))?;
        Forecaster::from_bytes(&bytes)
    }

    /// Replaces `model` with the stored one
    ///
    /// Returns false and leaves `model` untouched when nothing usable is
    /// stored under `name`.
    pub fn load(&self, name: &str, model: &mut Forecaster) -> bool {
        match self.read(name) {
            Ok(loaded) => {
                *model = loaded;
                info!("Loaded model '{}' from {}", name, self.dir.display());
                true
            }
            Err(e) => {
                error!("Could not load model '{}': {}", name, e);
                false
            }
        }
    }

    /// Deletes the stored model; returns whether one existed
    pub fn remove(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| ForecastError::Persistence(e.to_string()))?;
        Ok(true)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ForecastError::invalid(format!("invalid model name '{}'", name)))
    }
}
