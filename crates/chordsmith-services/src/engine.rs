//! Real-time playback engine.
//!
//! A worker thread owns the [`Scheduler`] and drives its clock from
//! [`Instant`]. Callers talk to it over a command channel and observe it
//! through a shared [`PlaybackState`] snapshot and an event channel.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chordsmith_core::{
    is_playable, ArpeggioSettings, Block, BlockId, Chord, ChordsmithError, Instrument, Metronome,
    PlaybackEvent, PlaybackState, Scheduler, SchedulerConfig, SequenceStep, Tempo, Track,
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Events buffered for observers before new ones are dropped
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] ChordsmithError),
    #[error("Failed to spawn playback thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Playback thread is not running")]
    Disconnected,
}

enum Command {
    Play {
        steps: Vec<SequenceStep>,
        looping: bool,
    },
    Stop,
    SetTempo(u32),
    SetArpeggiatorEnabled(bool),
    SetMetronomeEnabled(bool),
    SetArpeggioSettings(ArpeggioSettings),
    Shutdown,
}

/// Handle to the playback thread. Dropping it shuts the thread down.
pub struct PlaybackEngine {
    commands: Sender<Command>,
    events: Receiver<PlaybackEvent>,
    state: Arc<Mutex<PlaybackState>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn spawn<I, M>(instrument: I, metronome: M, config: SchedulerConfig) -> Result<Self, EngineError>
    where
        I: Instrument + Send + 'static,
        M: Metronome + Send + 'static,
    {
        let scheduler = Scheduler::with_config(instrument, metronome, config);
        let state = Arc::new(Mutex::new(scheduler.state()));
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        let worker_state = state.clone();
        let worker = thread::Builder::new()
            .name("chordsmith-playback".into())
            .spawn(move || run(scheduler, cmd_rx, event_tx, worker_state))?;

        info!("Playback engine started");
        Ok(Self {
            commands: cmd_tx,
            events: event_rx,
            state,
            worker: Some(worker),
        })
    }

    /// Play a copy of `steps`
    pub fn play(&self, steps: &[SequenceStep], looping: bool) -> Result<(), EngineError> {
        if !is_playable(steps) {
            return Err(ChordsmithError::EmptySequence.into());
        }
        self.send(Command::Play {
            steps: steps.to_vec(),
            looping,
        })
    }

    pub fn play_block(&self, block: &Block, looping: bool) -> Result<(), EngineError> {
        self.play(&block.steps, looping)
    }

    /// Play one block of `track` by id
    pub fn play_block_id(&self, track: &Track, id: BlockId, looping: bool) -> Result<(), EngineError> {
        self.play(&track.block_steps(id)?, looping)
    }

    pub fn play_track(&self, track: &Track, looping: bool) -> Result<(), EngineError> {
        self.play(&track.flatten(), looping)
    }

    pub fn preview_chord(&self, chord: Chord) -> Result<(), EngineError> {
        self.play(&[SequenceStep::chord(chord)], false)
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(Command::Stop)
    }

    /// Clamped into range; zero is rejected here, before it reaches the thread
    pub fn set_tempo(&self, bpm: u32) -> Result<(), EngineError> {
        let tempo = Tempo::clamped(bpm)?;
        self.send(Command::SetTempo(tempo.bpm()))
    }

    pub fn set_arpeggiator_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.send(Command::SetArpeggiatorEnabled(enabled))
    }

    pub fn set_metronome_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.send(Command::SetMetronomeEnabled(enabled))
    }

    pub fn set_arpeggio_settings(&self, settings: ArpeggioSettings) -> Result<(), EngineError> {
        self.send(Command::SetArpeggioSettings(settings))
    }

    /// Shared state, refreshed by the playback thread
    pub fn state(&self) -> Arc<Mutex<PlaybackState>> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Step lifecycle events. Lossy if nobody drains them.
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop playback and join the thread
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            warn!("Playback thread panicked");
        }
        info!("Playback engine shut down");
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        if self.worker.is_none() {
            return Err(EngineError::Disconnected);
        }
        self.commands
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<I: Instrument, M: Metronome>(
    mut scheduler: Scheduler<I, M>,
    commands: Receiver<Command>,
    events: Sender<PlaybackEvent>,
    state: Arc<Mutex<PlaybackState>>,
) {
    let origin = Instant::now();
    let now_ms = || origin.elapsed().as_millis() as u64;

    loop {
        scheduler.advance_to(now_ms());
        publish(&mut scheduler, &events, &state);

        let received = match scheduler.next_due() {
            Some(due) => {
                let wait = Duration::from_millis(due.saturating_sub(now_ms()));
                commands.recv_timeout(wait)
            }
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let command = match received {
            Ok(command) => command,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        scheduler.advance_to(now_ms());
        match command {
            Command::Play { steps, looping } => {
                if let Err(e) = scheduler.play(&steps, looping) {
                    warn!(error = %e, "Play rejected");
                }
            }
            Command::Stop => scheduler.stop(),
            Command::SetTempo(bpm) => {
                if let Err(e) = scheduler.set_tempo(bpm) {
                    warn!(error = %e, "Tempo rejected");
                }
            }
            Command::SetArpeggiatorEnabled(enabled) => scheduler.set_arpeggiator_enabled(enabled),
            Command::SetMetronomeEnabled(enabled) => scheduler.set_metronome_enabled(enabled),
            Command::SetArpeggioSettings(settings) => scheduler.set_arpeggio_settings(settings),
            Command::Shutdown => break,
        }
    }

    scheduler.stop();
    publish(&mut scheduler, &events, &state);
    debug!("Playback thread exiting");
}

fn publish<I: Instrument, M: Metronome>(
    scheduler: &mut Scheduler<I, M>,
    events: &Sender<PlaybackEvent>,
    state: &Arc<Mutex<PlaybackState>>,
) {
    // Snapshot first, so an observer never sees an event ahead of the state
    if let Ok(mut s) = state.lock() {
        *s = scheduler.state();
    }
    for event in scheduler.take_events() {
        if events.try_send(event).is_err() {
            debug!("Playback event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{ChannelInstrument, InstrumentEvent, LogMetronome};
    use chordsmith_core::{ChordQuality, NullMetronome, PitchClass, Tonality};

    fn chord(root: PitchClass, quality: ChordQuality) -> SequenceStep {
        SequenceStep::Chord {
            chord: Chord::new(root, quality),
            duration: 1.0 / 16.0,
        }
    }

    fn engine() -> (PlaybackEngine, Receiver<InstrumentEvent>) {
        let (tx, rx) = bounded(64);
        let engine =
            PlaybackEngine::spawn(ChannelInstrument::new(tx), NullMetronome, SchedulerConfig::default())
                .unwrap();
        (engine, rx)
    }

    #[test]
    fn test_plays_to_completion() {
        let (engine, notes) = engine();
        let events = engine.events();
        engine
            .play(
                &[
                    chord(PitchClass::C, ChordQuality::Maj),
                    chord(PitchClass::G, ChordQuality::Maj),
                ],
                false,
            )
            .unwrap();

        let timeout = Duration::from_secs(5);
        let mut started = Vec::new();
        loop {
            match events.recv_timeout(timeout).unwrap() {
                PlaybackEvent::StepStarted { index, .. } => started.push(index),
                PlaybackEvent::PlaybackStopped => break,
            }
        }
        assert_eq!(started, vec![0, 1]);

        let first = notes.recv_timeout(timeout).unwrap();
        assert!(matches!(first, InstrumentEvent::Trigger { ref notes, .. } if notes.len() == 3));
        assert!(!engine.snapshot().is_playing);
    }

    #[test]
    fn test_rejects_empty_and_zero_tempo() {
        let (engine, _notes) = engine();
        assert!(matches!(
            engine.play(&[], false),
            Err(EngineError::Core(ChordsmithError::EmptySequence))
        ));
        assert!(matches!(
            engine.set_tempo(0),
            Err(EngineError::Core(ChordsmithError::InvalidTempo(0)))
        ));

        let track = Track::default();
        assert!(matches!(
            engine.play_block_id(&track, track.current_id(), false),
            Err(EngineError::Core(ChordsmithError::EmptySequence))
        ));
        assert!(matches!(
            engine.play_block_id(&track, BlockId(99), false),
            Err(EngineError::Core(ChordsmithError::BlockNotFound(99)))
        ));
    }

    #[test]
    fn test_stop_and_shutdown() {
        let (tx, _rx) = bounded(64);
        let mut engine =
            PlaybackEngine::spawn(ChannelInstrument::new(tx), LogMetronome, SchedulerConfig::default())
                .unwrap();
        let events = engine.events();
        let mut verse = Block::new(BlockId(1), "Verse", Tonality::default());
        verse.append_degree(6, false);

        engine.set_metronome_enabled(true).unwrap();
        engine.play_block(&verse, true).unwrap();
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(5)),
            Ok(PlaybackEvent::StepStarted { index: 0, .. })
        ));

        engine.stop().unwrap();
        assert_eq!(
            events.recv_timeout(Duration::from_secs(5)),
            Ok(PlaybackEvent::PlaybackStopped)
        );

        engine.shutdown();
        assert!(!engine.is_running());
        assert!(matches!(engine.stop(), Err(EngineError::Disconnected)));
    }

    #[test]
    fn test_snapshot_updated_before_event() {
        let (engine, _notes) = engine();
        let events = engine.events();
        // Long enough that no second step starts during the test
        let step = SequenceStep::Chord {
            chord: Chord::new(PitchClass::A, ChordQuality::Min),
            duration: 8.0,
        };
        engine.play(&[step], true).unwrap();
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(5)),
            Ok(PlaybackEvent::StepStarted { index: 0, .. })
        ));

        let state = engine.state();
        let guard = state.lock().unwrap();
        assert!(guard.is_playing);
        engine.stop().unwrap();
        // The thread cannot publish the stop while the snapshot is held
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);

        assert_eq!(
            events.recv_timeout(Duration::from_secs(5)),
            Ok(PlaybackEvent::PlaybackStopped)
        );
        let snapshot = engine.snapshot();
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.step_index, None);
    }
}
