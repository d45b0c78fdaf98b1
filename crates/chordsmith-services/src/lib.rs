//! chordsmith-services: Real-time playback engine, instruments, and persistence

pub mod engine;
pub mod instruments;
pub mod store;

pub use engine::{EngineError, PlaybackEngine};
pub use instruments::{ChannelInstrument, InstrumentEvent, LogInstrument, LogMetronome};
pub use store::{default_data_dir, JsonStore, StoreError, PROJECT_FILE, SETTINGS_FILE};
