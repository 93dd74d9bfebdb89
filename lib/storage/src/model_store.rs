use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use estatex_core::{Error, PriceModel, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

/// Default artifact location, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "models/price_model.bin";

/// On-disk price model with its training timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: PriceModel,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Stamp a freshly trained model with the current time
    pub fn new(model: PriceModel) -> Self {
        Self {
            model,
            trained_at: Utc::now(),
        }
    }
}

/// Identifies one version of the artifact file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStamp {
    pub modified: SystemTime,
    pub len: u64,
}

/// Persisted price model at a fixed path.
///
/// A missing file is a normal state (the model has not been trained yet)
/// and is reported as `Ok(None)`, never as an error.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time and size of the artifact, `None` when it is absent.
    /// A save replaces the file, so a changed stamp means a new model.
    pub fn stamp(&self) -> Result<Option<ModelStamp>> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(ModelStamp {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn load(&self) -> Result<Option<ModelArtifact>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let artifact: ModelArtifact =
            bincode::deserialize(&data).map_err(|e| Error::Serialization(format!("Deserialization error: {}", e)))?;
        Ok(Some(artifact))
    }

    /// Write the artifact atomically (temp file + rename), creating the
    /// parent directory when needed
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = bincode::serialize(artifact).map_err(|e| Error::Serialization(format!("Serialization error: {}", e)))?;
        AtomicFile::new(&self.path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&data))
            .map_err(|e| Error::Persistence(e.to_string()))?;

        info!("Model saved to {:?}", self.path);
        Ok(())
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_PATH)
    }
}
