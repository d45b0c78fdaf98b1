//! Tonalities: diatonic scales and the chords built on them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, ChordQuality};
use crate::error::{ChordsmithError, Result};
use crate::pitch::PitchClass;

/// Scale mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    /// Scale intervals (semitones from root)
    pub fn intervals(&self) -> &'static [u8; 7] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
        }
    }

    /// Triad quality per scale degree
    fn triad_qualities(&self) -> &'static [ChordQuality; 7] {
        use ChordQuality::*;
        match self {
            Self::Major => &[Maj, Min, Min, Maj, Maj, Min, Dim],
            Self::Minor => &[Min, Dim, Maj, Min, Min, Maj, Maj],
        }
    }

    /// Seventh-chord quality per scale degree
    fn seventh_qualities(&self) -> &'static [ChordQuality; 7] {
        use ChordQuality::*;
        match self {
            Self::Major => &[Maj7, Min7, Min7, Maj7, Dom7, Min7, M7b5],
            Self::Minor => &[Min7, M7b5, Maj7, Min7, Min7, Maj7, Dom7],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl FromStr for Mode {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        // Case matters for the one-letter forms, as in chord symbols
        match s.trim() {
            "M" => return Ok(Self::Major),
            "m" => return Ok(Self::Minor),
            _ => {}
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" | "ionian" => Ok(Self::Major),
            "minor" | "min" | "aeolian" => Ok(Self::Minor),
            _ => Err(ChordsmithError::UnknownMode(s.to_string())),
        }
    }
}

/// Harmonic role of a chord within a tonality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarmonicFunction {
    Tonic,
    Subdominant,
    Dominant,
}

impl HarmonicFunction {
    pub fn short(&self) -> &'static str {
        match self {
            Self::Tonic => "T",
            Self::Subdominant => "S",
            Self::Dominant => "D",
        }
    }
}

/// Function per scale degree, shared by both modes: minor's III stands in
/// for the tonic the way vi does in major.
const DEGREE_FUNCTIONS: [HarmonicFunction; 7] = [
    HarmonicFunction::Tonic,
    HarmonicFunction::Subdominant,
    HarmonicFunction::Tonic,
    HarmonicFunction::Subdominant,
    HarmonicFunction::Dominant,
    HarmonicFunction::Tonic,
    HarmonicFunction::Dominant,
];

/// One of the seven chords built on a tonality's scale degrees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiatonicChord {
    /// Scale degree, 1..=7
    pub degree: u8,
    pub root: PitchClass,
    pub triad: ChordQuality,
    pub seventh: ChordQuality,
    pub roman_numeral: String,
    pub seventh_numeral: String,
    pub function: HarmonicFunction,
}

impl DiatonicChord {
    pub fn chord(&self) -> Chord {
        Chord::new(self.root, self.triad)
    }

    pub fn seventh_chord(&self) -> Chord {
        Chord::new(self.root, self.seventh)
    }
}

/// Root + mode. Two tonalities are equal iff both match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tonality {
    pub root: PitchClass,
    pub mode: Mode,
}

impl Default for Tonality {
    fn default() -> Self {
        Self::new(PitchClass::C, Mode::Major)
    }
}

impl Tonality {
    pub fn new(root: PitchClass, mode: Mode) -> Self {
        Self { root, mode }
    }

    /// Parse a key such as `"C"`, `"Am"`, `"Eb minor"` or `"F#:major"`
    pub fn parse(key: &str) -> Result<Self> {
        let key = key.trim();
        let (root, rest) = PitchClass::parse_prefix(key)?;
        let rest = rest.trim_start_matches([':', ' ', '-', '_']);
        let mode = if rest.is_empty() { Mode::Major } else { rest.parse()? };
        Ok(Self::new(root, mode))
    }

    /// The seven scale notes, starting at the root
    pub fn scale_notes(&self) -> [PitchClass; 7] {
        let intervals = *self.mode.intervals();
        intervals.map(|i| self.root.transpose(i as i32))
    }

    /// The seven diatonic chords, degree 1 first
    pub fn diatonic_chords(&self) -> Vec<DiatonicChord> {
        let scale = self.scale_notes();
        let triads = self.mode.triad_qualities();
        let sevenths = self.mode.seventh_qualities();
        let functions = &DEGREE_FUNCTIONS;

        (0..7)
            .map(|i| {
                let degree = i as u8 + 1;
                DiatonicChord {
                    degree,
                    root: scale[i],
                    triad: triads[i],
                    seventh: sevenths[i],
                    roman_numeral: roman_numeral(degree, triads[i]),
                    seventh_numeral: roman_numeral(degree, sevenths[i]),
                    function: functions[i],
                }
            })
            .collect()
    }

    /// The diatonic chord built on `degree` (1..=7)
    pub fn degree(&self, degree: u8) -> Option<DiatonicChord> {
        if !(1..=7).contains(&degree) {
            return None;
        }
        self.diatonic_chords().into_iter().nth(degree as usize - 1)
    }

    pub fn contains(&self, pitch: PitchClass) -> bool {
        self.scale_notes().contains(&pitch)
    }
}

impl fmt::Display for Tonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.mode.name())
    }
}

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Roman numeral for a chord of `quality` on `degree`.
///
/// Uppercase for major-family qualities, lowercase for minor and
/// diminished, `°` for diminished, `ø` for half-diminished.
pub fn roman_numeral(degree: u8, quality: ChordQuality) -> String {
    use ChordQuality::*;

    let base = NUMERALS[(degree.clamp(1, 7) - 1) as usize];
    let lower = matches!(quality, Min | Dim | Min7 | M7b5 | Dim7 | Min9);
    let mut numeral = if lower { base.to_lowercase() } else { base.to_string() };

    let suffix = match quality {
        Maj | Min => "",
        Sus2 => "sus2",
        Sus4 => "sus4",
        Dim => "°",
        Aug => "+",
        Maj7 => "maj7",
        Min7 | Dom7 => "7",
        M7b5 => "ø7",
        Dim7 => "°7",
        Maj9 => "maj9",
        Min9 | Dom9 => "9",
    };
    numeral.push_str(suffix);
    numeral
}
