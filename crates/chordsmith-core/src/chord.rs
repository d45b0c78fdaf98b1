//! Chords: root + quality, resolved to note sets through an interval table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordsmithError, Result};
use crate::pitch::{Note, PitchClass, MAX_OCTAVE};
use crate::tonality::{roman_numeral, HarmonicFunction, Tonality};

/// Octave chords are voiced from when no other context is given
pub const DEFAULT_CHORD_OCTAVE: u8 = 4;

/// Chord quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChordQuality {
    Maj,
    Min,
    Dim,
    Aug,
    Maj7,
    Min7,
    Dom7,
    M7b5,
    Dim7,
    Maj9,
    Min9,
    Dom9,
    Sus2,
    Sus4,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 14] = [
        Self::Maj,
        Self::Min,
        Self::Dim,
        Self::Aug,
        Self::Maj7,
        Self::Min7,
        Self::Dom7,
        Self::M7b5,
        Self::Dim7,
        Self::Maj9,
        Self::Min9,
        Self::Dom9,
        Self::Sus2,
        Self::Sus4,
    ];

    /// Get chord intervals from root
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Maj => &[0, 4, 7],
            Self::Min => &[0, 3, 7],
            Self::Dim => &[0, 3, 6],
            Self::Aug => &[0, 4, 8],
            Self::Maj7 => &[0, 4, 7, 11],
            Self::Min7 => &[0, 3, 7, 10],
            Self::Dom7 => &[0, 4, 7, 10],
            Self::M7b5 => &[0, 3, 6, 10],
            Self::Dim7 => &[0, 3, 6, 9],
            Self::Maj9 => &[0, 4, 7, 11, 14],
            Self::Min9 => &[0, 3, 7, 10, 14],
            Self::Dom9 => &[0, 4, 7, 10, 14],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
        }
    }

    /// Canonical token, as stored in project files
    pub fn token(&self) -> &'static str {
        match self {
            Self::Maj => "maj",
            Self::Min => "min",
            Self::Dim => "dim",
            Self::Aug => "aug",
            Self::Maj7 => "maj7",
            Self::Min7 => "min7",
            Self::Dom7 => "dom7",
            Self::M7b5 => "m7b5",
            Self::Dim7 => "dim7",
            Self::Maj9 => "maj9",
            Self::Min9 => "min9",
            Self::Dom9 => "dom9",
            Self::Sus2 => "sus2",
            Self::Sus4 => "sus4",
        }
    }

    /// Suffix used when printing a chord symbol (`C`, `Am`, `G7`)
    pub fn symbol_suffix(&self) -> &'static str {
        match self {
            Self::Maj => "",
            Self::Min => "m",
            Self::Dim => "dim",
            Self::Aug => "aug",
            Self::Maj7 => "maj7",
            Self::Min7 => "m7",
            Self::Dom7 => "7",
            Self::M7b5 => "m7b5",
            Self::Dim7 => "dim7",
            Self::Maj9 => "maj9",
            Self::Min9 => "m9",
            Self::Dom9 => "9",
            Self::Sus2 => "sus2",
            Self::Sus4 => "sus4",
        }
    }

    /// Accepts canonical tokens plus the usual lead-sheet spellings
    fn from_suffix(suffix: &str) -> Option<Self> {
        let quality = match suffix {
            "" | "M" => Self::Maj,
            "m" | "-" => Self::Min,
            "°" | "o" => Self::Dim,
            "+" => Self::Aug,
            "M7" | "Δ7" | "Δ" => Self::Maj7,
            "m7" | "-7" => Self::Min7,
            "7" => Self::Dom7,
            "ø" | "ø7" | "min7b5" | "-7b5" => Self::M7b5,
            "°7" | "o7" => Self::Dim7,
            "M9" | "Δ9" => Self::Maj9,
            "m9" | "-9" => Self::Min9,
            "9" => Self::Dom9,
            _ => return Self::ALL.into_iter().find(|q| q.token() == suffix),
        };
        Some(quality)
    }
}

impl FromStr for ChordQuality {
    type Err = ChordsmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.token() == s)
            .ok_or_else(|| ChordsmithError::UnknownChordQuality(s.to_string()))
    }
}

impl TryFrom<String> for ChordQuality {
    type Error = ChordsmithError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChordQuality> for String {
    fn from(q: ChordQuality) -> Self {
        q.token().to_string()
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A chord's place within a tonality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordFunction {
    /// `None` when the root is diatonic but the quality is not
    pub function: Option<HarmonicFunction>,
    pub degree: u8,
    pub roman_numeral: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub root: PitchClass,
    pub quality: ChordQuality,
}

impl Chord {
    pub fn new(root: PitchClass, quality: ChordQuality) -> Self {
        Self { root, quality }
    }

    /// Build from a root name and a quality token, failing closed on either
    pub fn from_parts(root: &str, quality: &str) -> Result<Self> {
        Ok(Self::new(root.parse()?, quality.parse()?))
    }

    /// Parse a chord symbol such as `"C"`, `"F#m7"`, `"Bbmaj9"` or `"G7"`
    pub fn parse_symbol(symbol: &str) -> Result<Self> {
        let symbol = symbol.trim();
        let (root, suffix) = PitchClass::parse_prefix(symbol)?;
        let quality = ChordQuality::from_suffix(suffix)
            .ok_or_else(|| ChordsmithError::UnknownChordQuality(suffix.to_string()))?;
        Ok(Self::new(root, quality))
    }

    /// Octave-less notes in interval-table order
    pub fn notes(&self) -> Vec<PitchClass> {
        self.quality
            .intervals()
            .iter()
            .map(|&i| self.root.transpose(i as i32))
            .collect()
    }

    /// Notes stacked upward from the root in `octave`. The root drops by
    /// whole octaves when the top tone would pass the highest octave.
    pub fn voiced(&self, octave: u8) -> Vec<Note> {
        let intervals = self.quality.intervals();
        let span = intervals.iter().copied().max().unwrap_or(0);
        let ceiling = Note::new(PitchClass::B, MAX_OCTAVE).midi();

        let mut root = Note::new(self.root, octave).midi();
        while root + span > ceiling {
            root -= 12;
        }
        intervals.iter().map(|&i| Note::from_midi(root + i)).collect()
    }

    pub fn symbol(&self) -> String {
        format!("{}{}", self.root, self.quality.symbol_suffix())
    }

    /// Where this chord sits in `tonality`.
    ///
    /// Returns `None` for a chromatic root. A diatonic root with a
    /// non-diatonic quality yields degree and numeral but no function.
    pub fn function_in(&self, tonality: &Tonality) -> Option<ChordFunction> {
        let diatonic = tonality
            .diatonic_chords()
            .into_iter()
            .find(|d| d.root == self.root)?;

        let (function, numeral) = if self.quality == diatonic.triad {
            (Some(diatonic.function), diatonic.roman_numeral)
        } else if self.quality == diatonic.seventh {
            (Some(diatonic.function), diatonic.seventh_numeral)
        } else {
            (None, roman_numeral(diatonic.degree, self.quality))
        };

        Some(ChordFunction {
            function,
            degree: diatonic.degree,
            roman_numeral: numeral,
        })
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Resolve a root name and quality token straight to notes
pub fn chord_notes(root: &str, quality: &str) -> Result<Vec<PitchClass>> {
    Ok(Chord::from_parts(root, quality)?.notes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tonality::Mode;
    use PitchClass::*;

    #[test]
    fn test_maj7_notes_in_order() {
        let chord = Chord::new(C, ChordQuality::Maj7);
        assert_eq!(chord.notes(), vec![C, E, G, B]);
    }

    #[test]
    fn test_notes_wrap_around_ring() {
        assert_eq!(Chord::new(A, ChordQuality::Min).notes(), vec![A, C, E]);
        assert_eq!(Chord::new(D, ChordQuality::Dom9).notes(), vec![D, FSharp, A, C, E]);
    }

    #[test]
    fn test_unknown_quality_fails_closed() {
        assert_eq!(
            chord_notes("C", "maj13"),
            Err(ChordsmithError::UnknownChordQuality("maj13".to_string()))
        );
        assert_eq!(
            chord_notes("X", "maj"),
            Err(ChordsmithError::UnknownPitchClass("X".to_string()))
        );
        assert!(Chord::parse_symbol("Cfoo").is_err());
    }

    #[test]
    fn test_parse_symbol() {
        assert_eq!(Chord::parse_symbol("C").unwrap(), Chord::new(C, ChordQuality::Maj));
        assert_eq!(Chord::parse_symbol("F#m7").unwrap(), Chord::new(FSharp, ChordQuality::Min7));
        assert_eq!(Chord::parse_symbol("Bbmaj9").unwrap(), Chord::new(ASharp, ChordQuality::Maj9));
        assert_eq!(Chord::parse_symbol("G7").unwrap(), Chord::new(G, ChordQuality::Dom7));
        assert_eq!(Chord::parse_symbol("Bø7").unwrap(), Chord::new(B, ChordQuality::M7b5));
        assert_eq!(Chord::parse_symbol("Dsus4").unwrap(), Chord::new(D, ChordQuality::Sus4));
    }

    #[test]
    fn test_symbol_round_trips_through_parser() {
        for quality in ChordQuality::ALL {
            let chord = Chord::new(E, quality);
            assert_eq!(Chord::parse_symbol(&chord.symbol()).unwrap(), chord);
        }
    }

    #[test]
    fn test_voiced_stacks_upward() {
        let notes = Chord::new(G, ChordQuality::Dom9).voiced(DEFAULT_CHORD_OCTAVE);
        let midi: Vec<u8> = notes.iter().map(|n| n.midi()).collect();
        assert_eq!(midi, vec![67, 71, 74, 77, 81]);
    }

    #[test]
    fn test_voiced_stays_ascending_at_top_octave() {
        let notes = Chord::new(C, ChordQuality::Dom9).voiced(MAX_OCTAVE);
        let midi: Vec<u8> = notes.iter().map(|n| n.midi()).collect();
        assert_eq!(midi, vec![96, 100, 103, 106, 110]);

        for root in PitchClass::ALL {
            for quality in ChordQuality::ALL {
                for octave in 0..=MAX_OCTAVE {
                    let midi: Vec<u8> = Chord::new(root, quality)
                        .voiced(octave)
                        .iter()
                        .map(|n| n.midi())
                        .collect();
                    assert!(midi.windows(2).all(|w| w[0] < w[1]), "{root}{quality:?} @ {octave}");
                }
            }
        }
    }

    #[test]
    fn test_function_in_diatonic() {
        let key = Tonality::new(C, Mode::Major);
        let f = Chord::new(G, ChordQuality::Dom7).function_in(&key).unwrap();
        assert_eq!(f.function, Some(HarmonicFunction::Dominant));
        assert_eq!(f.degree, 5);
        assert_eq!(f.roman_numeral, "V7");

        let vi = Chord::new(A, ChordQuality::Min).function_in(&key).unwrap();
        assert_eq!(vi.function, Some(HarmonicFunction::Tonic));
        assert_eq!(vi.roman_numeral, "vi");
    }

    #[test]
    fn test_function_in_chromatic_and_borrowed() {
        let key = Tonality::new(C, Mode::Major);
        assert!(Chord::new(DSharp, ChordQuality::Maj).function_in(&key).is_none());

        let secondary = Chord::new(D, ChordQuality::Maj).function_in(&key).unwrap();
        assert_eq!(secondary.function, None);
        assert_eq!(secondary.degree, 2);
        assert_eq!(secondary.roman_numeral, "II");
    }

    #[test]
    fn test_diatonic_round_trip() {
        for root in PitchClass::ALL {
            for mode in [Mode::Major, Mode::Minor] {
                let key = Tonality::new(root, mode);
                for (i, d) in key.diatonic_chords().iter().enumerate() {
                    let f = d.chord().function_in(&key).unwrap();
                    assert_eq!(f.degree as usize, i + 1);
                    assert_eq!(f.function, Some(d.function));
                    let f7 = d.seventh_chord().function_in(&key).unwrap();
                    assert_eq!(f7.degree as usize, i + 1);
                }
            }
        }
    }

    #[test]
    fn test_function_in_minor() {
        let a_minor = Tonality::new(A, Mode::Minor);
        let function = |root, quality| {
            Chord::new(root, quality)
                .function_in(&a_minor)
                .and_then(|f| f.function)
        };
        assert_eq!(function(A, ChordQuality::Min), Some(HarmonicFunction::Tonic));
        assert_eq!(function(D, ChordQuality::Min7), Some(HarmonicFunction::Subdominant));
        assert_eq!(function(C, ChordQuality::Maj), Some(HarmonicFunction::Tonic));
        assert_eq!(function(E, ChordQuality::Min), Some(HarmonicFunction::Dominant));
        assert_eq!(function(G, ChordQuality::Maj), Some(HarmonicFunction::Dominant));

        // Harmonic-minor V is not diatonic to natural minor
        let e_major = Chord::new(E, ChordQuality::Maj).function_in(&a_minor).unwrap();
        assert_eq!(e_major.function, None);
        assert_eq!(e_major.degree, 5);
        assert_eq!(e_major.roman_numeral, "V");
    }

    #[test]
    fn test_serde_rejects_unknown_quality() {
        let chord: Chord = serde_json::from_str(r#"{"root":"Db","quality":"min7"}"#).unwrap();
        assert_eq!(chord, Chord::new(CSharp, ChordQuality::Min7));
        assert!(serde_json::from_str::<Chord>(r#"{"root":"C","quality":"maj13"}"#).is_err());
    }
}
