//! Pitch classes on the 12-tone chromatic ring, and octave-assigned notes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordsmithError, Result};

/// A pitch class, spelled with sharps.
///
/// Flat and double-accidental spellings are accepted when parsing and
/// normalized onto the same ring position (`Db` is `CSharp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        Self::C,
        Self::CSharp,
        Self::D,
        Self::DSharp,
        Self::E,
        Self::F,
        Self::FSharp,
        Self::G,
        Self::GSharp,
        Self::A,
        Self::ASharp,
        Self::B,
    ];

    /// Position on the chromatic ring (C = 0)
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Move around the ring by `semitones`, wrapping modulo 12
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_index(self.index() as i32 + semitones)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        }
    }

    /// Parse the longest pitch-class prefix of `s`, returning the pitch
    /// class and the unconsumed remainder (used by chord symbols).
    pub(crate) fn parse_prefix(s: &str) -> Result<(Self, &str)> {
        let mut chars = s.char_indices();
        let base = match chars.next().map(|(_, c)| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(ChordsmithError::UnknownPitchClass(s.to_string())),
        };

        let mut offset = 0i32;
        let mut rest = &s[1..];
        for (i, c) in chars {
            match c {
                '#' | '♯' => offset += 1,
                'b' | '♭' => offset -= 1,
                _ => {
                    rest = &s[i..];
                    return Ok((Self::from_index(base + offset), rest));
                }
            }
            rest = &s[i + c.len_utf8()..];
        }
        Ok((Self::from_index(base + offset), rest))
    }
}

impl FromStr for PitchClass {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match Self::parse_prefix(trimmed) {
            Ok((pc, "")) => Ok(pc),
            _ => Err(ChordsmithError::UnknownPitchClass(s.to_string())),
        }
    }
}

impl TryFrom<String> for PitchClass {
    type Error = ChordsmithError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PitchClass> for String {
    fn from(pc: PitchClass) -> Self {
        pc.name().to_string()
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Highest octave a note may be placed in
pub const MAX_OCTAVE: u8 = 8;

/// A pitch class with an octave assigned (C4 = MIDI 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Note {
    pub octave: u8,
    pub pitch: PitchClass,
}

impl Note {
    pub fn new(pitch: PitchClass, octave: u8) -> Self {
        Self { octave: octave.min(MAX_OCTAVE), pitch }
    }

    /// Build from an absolute semitone count (MIDI numbering)
    pub fn from_midi(midi: u8) -> Self {
        let octave = (midi / 12).saturating_sub(1);
        Self::new(PitchClass::from_index(midi as i32), octave)
    }

    pub fn midi(self) -> u8 {
        (self.octave + 1) * 12 + self.pitch.index()
    }

    /// Shift by whole octaves, clamped to `0..=MAX_OCTAVE`
    pub fn shift_octaves(self, octaves: i32) -> Self {
        let octave = (self.octave as i32 + octaves).clamp(0, MAX_OCTAVE as i32) as u8;
        Self { octave, ..self }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}
