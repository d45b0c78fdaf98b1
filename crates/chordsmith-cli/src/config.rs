//! `config.toml` persistence

use std::path::PathBuf;

use chordsmith_core::Tempo;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tempo_bpm: u32,
    pub metronome: bool,
    /// Arpeggiate by default; the pattern itself lives in the settings store
    pub arpeggiate: bool,
    /// Overrides the platform data directory for stored projects
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: chordsmith_core::DEFAULT_BPM,
            metronome: false,
            arpeggiate: false,
            data_dir: None,
        }
    }
}

impl AppConfig {
    /// Configured tempo; an out-of-range value falls back to the default
    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.tempo_bpm).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring configured tempo");
            Tempo::default()
        })
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordsmith")
        .join("config.toml")
}

pub fn load_config() -> AppConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| toml::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_config(config: &AppConfig) -> std::io::Result<PathBuf> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = toml::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(&path, s)?;
    Ok(path)
}
