//! Headless instruments: log output and channel forwarding

use chordsmith_core::{Instrument, Metronome, Note, Tempo};
use crossbeam_channel::Sender;
use tracing::{debug, info};

/// Instrument that renders note triggers as log events
#[derive(Debug, Clone, Default)]
pub struct LogInstrument {
    triggered: u64,
}

impl LogInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triggers seen so far
    pub fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl Instrument for LogInstrument {
    fn trigger_notes(&mut self, notes: &[Note], duration_secs: f64, velocity: f32) {
        self.triggered += 1;
        let names: Vec<String> = notes.iter().map(|n| n.to_string()).collect();
        info!(notes = %names.join(" "), duration_secs, velocity, "Notes");
    }

    fn silence_all(&mut self) {
        debug!("All notes off");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetronome;

impl Metronome for LogMetronome {
    fn start(&mut self, tempo: Tempo) {
        info!(bpm = tempo.bpm(), "Metronome on");
    }

    fn beat(&mut self, index: u64, accent: bool) {
        if accent {
            info!(beat = index, "Tick");
        } else {
            debug!(beat = index, "tock");
        }
    }

    fn stop(&mut self) {
        info!("Metronome off");
    }
}

/// What a [`ChannelInstrument`] was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentEvent {
    Trigger {
        notes: Vec<Note>,
        duration_secs: f64,
        velocity: f32,
    },
    SilenceAll,
}

/// Forwards every call to a channel, for a sound source on another thread.
///
/// Triggers are dropped when the channel is full. `SilenceAll` waits for
/// room, so a stop always reaches the receiver while it is alive.
#[derive(Debug, Clone)]
pub struct ChannelInstrument {
    tx: Sender<InstrumentEvent>,
}

impl ChannelInstrument {
    pub fn new(tx: Sender<InstrumentEvent>) -> Self {
        Self { tx }
    }
}

impl Instrument for ChannelInstrument {
    fn trigger_notes(&mut self, notes: &[Note], duration_secs: f64, velocity: f32) {
        let event = InstrumentEvent::Trigger {
            notes: notes.to_vec(),
            duration_secs,
            velocity,
        };
        if self.tx.try_send(event).is_err() {
            debug!("Trigger dropped");
        }
    }

    fn silence_all(&mut self) {
        if self.tx.send(InstrumentEvent::SilenceAll).is_err() {
            debug!("Instrument receiver gone");
        }
    }
}
