//! JSON persistence for settings and projects

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chordsmith_core::{ArpeggioSettings, Block};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub const SETTINGS_FILE: &str = "arpeggio.json";
pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No data directory on this platform")]
    NoDataDir,
}

/// One JSON document on disk holding a `T`
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

/// `<data_dir>/chordsmith`
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("chordsmith"))
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Store named `file_name` inside `dir`, or the default data directory
    pub fn in_dir(dir: Option<&Path>, file_name: &str) -> Result<Self, StoreError> {
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => default_data_dir().ok_or(StoreError::NoDataDir)?,
        };
        Ok(Self::new(dir.join(file_name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` if nothing has been saved yet
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Nothing stored yet");
                return Ok(None);
            }
            Err(source) => return Err(self.io_error(source)),
        };
        let value = serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Loaded");
        Ok(Some(value))
    }

    /// Write through a temporary file so a crash never leaves half a document
    pub fn save(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), "Saved");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl JsonStore<ArpeggioSettings> {
    pub fn settings(dir: Option<&Path>) -> Result<Self, StoreError> {
        Self::in_dir(dir, SETTINGS_FILE)
    }

    /// Stored settings, normalized, or the defaults if none are stored
    pub fn load_or_default(&self) -> Result<ArpeggioSettings, StoreError> {
        Ok(self.load()?.unwrap_or_default().normalized())
    }
}

impl JsonStore<Vec<Block>> {
    pub fn project(dir: Option<&Path>) -> Result<Self, StoreError> {
        Self::in_dir(dir, PROJECT_FILE)
    }
}
