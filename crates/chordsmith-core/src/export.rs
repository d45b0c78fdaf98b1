//! Resolved, flattened sequences for MIDI and text exporters

use serde::Serialize;

use crate::chord::{Chord, DEFAULT_CHORD_OCTAVE};
use crate::pitch::Note;
use crate::sequence::SequenceStep;
use crate::tonality::Tonality;
use crate::transport::Tempo;

/// A chord with its voicing spelled out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChord {
    pub chord: Chord,
    pub symbol: String,
    pub notes: Vec<Note>,
    pub midi: Vec<u8>,
    /// `None` for chords whose root is outside the tonality
    pub roman_numeral: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedStep {
    Chord {
        #[serde(flatten)]
        chord: ResolvedChord,
        duration: f64,
        duration_ms: f64,
    },
    Rest {
        duration: f64,
        duration_ms: f64,
    },
    SectionBoundary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSequence {
    pub tempo_bpm: u32,
    pub tonality: Tonality,
    pub steps: Vec<ResolvedStep>,
}

/// Resolve every chord in `steps` to concrete notes
pub fn resolve_sequence(steps: &[SequenceStep], tonality: &Tonality, tempo: Tempo) -> ResolvedSequence {
    let steps = steps
        .iter()
        .map(|step| match step {
            SequenceStep::Chord { chord, duration } => ResolvedStep::Chord {
                chord: resolve_chord(chord, tonality),
                duration: *duration,
                duration_ms: tempo.playable_step_ms(*duration),
            },
            SequenceStep::Rest { duration } => ResolvedStep::Rest {
                duration: *duration,
                duration_ms: tempo.playable_step_ms(*duration),
            },
            SequenceStep::SectionBoundary => ResolvedStep::SectionBoundary,
        })
        .collect();

    ResolvedSequence {
        tempo_bpm: tempo.bpm(),
        tonality: *tonality,
        steps,
    }
}

fn resolve_chord(chord: &Chord, tonality: &Tonality) -> ResolvedChord {
    let notes = chord.voiced(DEFAULT_CHORD_OCTAVE);
    ResolvedChord {
        chord: *chord,
        symbol: chord.symbol(),
        midi: notes.iter().map(|n| n.midi()).collect(),
        notes,
        roman_numeral: chord.function_in(tonality).map(|f| f.roman_numeral),
    }
}

impl ResolvedSequence {
    pub fn total_ms(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| match s {
                ResolvedStep::Chord { duration_ms, .. } | ResolvedStep::Rest { duration_ms, .. } => {
                    *duration_ms
                }
                ResolvedStep::SectionBoundary => 0.0,
            })
            .sum()
    }

    /// Plain chord chart: one bar per step, `%` for rests, a new line per
    /// section
    pub fn to_text(&self) -> String {
        let mut lines: Vec<Vec<String>> = vec![Vec::new()];
        for step in &self.steps {
            match step {
                ResolvedStep::Chord { chord, .. } => push_bar(&mut lines, chord.symbol.clone()),
                ResolvedStep::Rest { .. } => push_bar(&mut lines, "%".to_string()),
                ResolvedStep::SectionBoundary => {
                    if lines.last().is_some_and(|l| !l.is_empty()) {
                        lines.push(Vec::new());
                    }
                }
            }
        }

        let mut out = format!("{} @ {} bpm\n", self.tonality, self.tempo_bpm);
        for bars in lines.iter().filter(|l| !l.is_empty()) {
            out.push_str("| ");
            out.push_str(&bars.join(" | "));
            out.push_str(" |\n");
        }
        out
    }
}

fn push_bar(lines: &mut Vec<Vec<String>>, bar: String) {
    if let Some(line) = lines.last_mut() {
        line.push(bar);
    }
}
