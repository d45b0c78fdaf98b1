//! Error types for chordsmith

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordsmithError {
    #[error("Unknown pitch class: {0:?}")]
    UnknownPitchClass(String),
    #[error("Unknown chord quality: {0:?}")]
    UnknownChordQuality(String),
    #[error("Unknown mode: {0:?}")]
    UnknownMode(String),
    #[error("Invalid tempo: {0} BPM (expected 40..=240)")]
    InvalidTempo(u32),
    #[error("Nothing to play: sequence is empty")]
    EmptySequence,
    #[error("Step index {index} out of range for sequence of length {len}")]
    InvalidStepIndex { index: usize, len: usize },
    #[error("Block not found: {0}")]
    BlockNotFound(u64),
}

pub type Result<T> = std::result::Result<T, ChordsmithError>;
