//! chordsmith-core: Music-theory model and chord playback scheduler

pub mod arpeggio;
pub mod chord;
mod error;
pub mod export;
mod pitch;
pub mod scheduler;
pub mod sequence;
pub mod timer;
pub mod tonality;
mod transport;

pub use arpeggio::{arpeggiate, ArpNote, ArpPattern, ArpeggioSettings};
pub use chord::{chord_notes, Chord, ChordFunction, ChordQuality};
pub use error::{ChordsmithError, Result};
pub use export::{resolve_sequence, ResolvedChord, ResolvedSequence, ResolvedStep};
pub use pitch::{Note, PitchClass};
pub use scheduler::{
    Instrument, Metronome, NullMetronome, PlaybackEvent, PlaybackState, Scheduler, SchedulerConfig,
};
pub use sequence::{concatenate_blocks, is_playable, Block, BlockId, SequenceStep, Track};
pub use tonality::{DiatonicChord, HarmonicFunction, Mode, Tonality};
pub use transport::{PlaybackPhase, Tempo, DEFAULT_BPM, MAX_BPM, MIN_BPM};
