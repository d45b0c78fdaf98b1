//! Tempo and transport phase

use serde::{Deserialize, Serialize};

use crate::error::{ChordsmithError, Result};

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 240;
pub const DEFAULT_BPM: u32 = 120;

/// Beats (quarter notes) in one whole-note step
pub const BEATS_PER_STEP: f64 = 4.0;

/// Shortest step the scheduler will arm, in whole notes
pub const MIN_STEP_DURATION: f64 = 1.0 / 64.0;

/// Transport playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Playing,
    /// Playing, and the current step is being sounded as an arpeggio
    ArpeggiatingStep,
}

impl PlaybackPhase {
    pub fn is_playing(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Tempo in BPM, always within `MIN_BPM..=MAX_BPM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tempo(u32);

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_BPM)
    }
}

impl Tempo {
    /// Strict constructor: anything outside the range is an error
    pub fn new(bpm: u32) -> Result<Self> {
        if (MIN_BPM..=MAX_BPM).contains(&bpm) {
            Ok(Self(bpm))
        } else {
            Err(ChordsmithError::InvalidTempo(bpm))
        }
    }

    /// Clamp into range. Zero is not a tempo and is rejected.
    pub fn clamped(bpm: u32) -> Result<Self> {
        if bpm == 0 {
            return Err(ChordsmithError::InvalidTempo(bpm));
        }
        Ok(Self(bpm.clamp(MIN_BPM, MAX_BPM)))
    }

    pub fn bpm(&self) -> u32 {
        self.0
    }

    /// Milliseconds per beat
    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.0 as f64
    }

    /// Milliseconds for a step of `duration` whole notes
    pub fn step_ms(&self, duration: f64) -> f64 {
        self.beat_ms() * BEATS_PER_STEP * duration
    }

    /// Like [`step_ms`](Self::step_ms), but never shorter than
    /// `MIN_STEP_DURATION`; non-finite durations count as one whole note
    pub fn playable_step_ms(&self, duration: f64) -> f64 {
        let duration = if duration.is_finite() { duration.max(MIN_STEP_DURATION) } else { 1.0 };
        self.step_ms(duration)
    }

    pub fn beat_secs(&self) -> f64 {
        self.beat_ms() / 1000.0
    }
}

impl TryFrom<u32> for Tempo {
    type Error = ChordsmithError;

    fn try_from(bpm: u32) -> Result<Self> {
        Self::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(t: Tempo) -> Self {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_interval() {
        let t = Tempo::new(120).unwrap();
        assert_eq!(t.beat_ms(), 500.0);
        assert_eq!(t.step_ms(1.0), 2000.0);
        assert_eq!(t.step_ms(0.5), 1000.0);
        assert_eq!(Tempo::new(60).unwrap().step_ms(1.0), 4000.0);
        assert_eq!(t.playable_step_ms(0.0), 2000.0 / 64.0);
        assert_eq!(t.playable_step_ms(f64::NAN), 2000.0);
    }

    #[test]
    fn test_strict_and_clamped() {
        assert_eq!(Tempo::new(39), Err(ChordsmithError::InvalidTempo(39)));
        assert_eq!(Tempo::new(241), Err(ChordsmithError::InvalidTempo(241)));
        assert_eq!(Tempo::clamped(300).unwrap().bpm(), MAX_BPM);
        assert_eq!(Tempo::clamped(1).unwrap().bpm(), MIN_BPM);
        assert_eq!(Tempo::clamped(0), Err(ChordsmithError::InvalidTempo(0)));
    }

    #[test]
    fn test_phase() {
        assert!(!PlaybackPhase::Idle.is_playing());
        assert!(PlaybackPhase::ArpeggiatingStep.is_playing());
    }
}
