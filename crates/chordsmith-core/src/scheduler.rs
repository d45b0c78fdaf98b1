//! Tempo-synchronized playback of chord sequences.
//!
//! The scheduler runs on a millisecond clock that its owner advances with
//! [`Scheduler::advance_to`]. All timing (sequence steps, metronome beats,
//! arpeggio notes) goes through one [`TimerQueue`], so `stop` and tempo
//! changes can cancel everything in one place.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::arpeggio::{arpeggiate, ArpNote, ArpeggioSettings};
use crate::chord::{Chord, DEFAULT_CHORD_OCTAVE};
use crate::error::{ChordsmithError, Result};
use crate::pitch::Note;
use crate::sequence::{is_playable, SequenceStep};
use crate::timer::{Timer, TimerKind, TimerQueue};
use crate::transport::{PlaybackPhase, Tempo};

/// Beats per metronome bar; the first of each bar is accented
pub const BEATS_PER_BAR: u64 = 4;

/// Sound source the scheduler plays through
pub trait Instrument {
    fn trigger_notes(&mut self, notes: &[Note], duration_secs: f64, velocity: f32);
    fn silence_all(&mut self);
}

impl<T: Instrument + ?Sized> Instrument for Box<T> {
    fn trigger_notes(&mut self, notes: &[Note], duration_secs: f64, velocity: f32) {
        (**self).trigger_notes(notes, duration_secs, velocity);
    }

    fn silence_all(&mut self) {
        (**self).silence_all();
    }
}

/// Click track, started and stopped in lockstep with playback
pub trait Metronome {
    fn start(&mut self, _tempo: Tempo) {}
    fn beat(&mut self, index: u64, accent: bool);
    fn stop(&mut self);
}

impl<T: Metronome + ?Sized> Metronome for Box<T> {
    fn start(&mut self, tempo: Tempo) {
        (**self).start(tempo);
    }

    fn beat(&mut self, index: u64, accent: bool) {
        (**self).beat(index, accent);
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Metronome that makes no sound
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetronome;

impl Metronome for NullMetronome {
    fn beat(&mut self, _index: u64, _accent: bool) {}
    fn stop(&mut self) {}
}

/// Step lifecycle notifications, for highlighting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    StepStarted { index: usize, step: SequenceStep },
    PlaybackStopped,
}

/// Read-only snapshot of the scheduler's state
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub is_playing: bool,
    pub sequence: Vec<SequenceStep>,
    /// `None` while idle
    pub step_index: Option<usize>,
    pub looping: bool,
    pub tempo_bpm: u32,
    pub arpeggio_enabled: bool,
    pub metronome_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Octave simultaneous chords are voiced from
    pub chord_octave: u8,
    pub chord_velocity: f32,
    /// Seed for the random arpeggio pattern; `None` seeds from entropy
    pub rng_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chord_octave: DEFAULT_CHORD_OCTAVE,
            chord_velocity: 0.7,
            rng_seed: None,
        }
    }
}

/// Timing of the step currently sounding
#[derive(Debug, Clone, Copy)]
struct StepClock {
    started_at: f64,
    length_ms: f64,
    duration: f64,
}

#[derive(Debug)]
struct ArpRun {
    notes: Vec<ArpNote>,
    next: usize,
    note_secs: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BeatClock {
    last_at: f64,
    count: u64,
}

pub struct Scheduler<I, M = NullMetronome> {
    instrument: I,
    metronome: M,
    config: SchedulerConfig,
    arpeggio: ArpeggioSettings,
    rng: fastrand::Rng,
    timers: TimerQueue,
    now_ms: u64,

    sequence: Vec<SequenceStep>,
    step_index: Option<usize>,
    looping: bool,
    tempo: Tempo,
    arpeggio_enabled: bool,
    metronome_enabled: bool,

    metronome_running: bool,
    step_clock: Option<StepClock>,
    arp: Option<ArpRun>,
    beat: BeatClock,
    events: Vec<PlaybackEvent>,
}

impl<I: Instrument> Scheduler<I, NullMetronome> {
    pub fn new(instrument: I) -> Self {
        Self::with_metronome(instrument, NullMetronome)
    }
}

impl<I: Instrument, M: Metronome> Scheduler<I, M> {
    pub fn with_metronome(instrument: I, metronome: M) -> Self {
        Self::with_config(instrument, metronome, SchedulerConfig::default())
    }

    pub fn with_config(instrument: I, metronome: M, config: SchedulerConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            instrument,
            metronome,
            config,
            arpeggio: ArpeggioSettings::default(),
            rng,
            timers: TimerQueue::new(),
            now_ms: 0,
            sequence: Vec::new(),
            step_index: None,
            looping: false,
            tempo: Tempo::default(),
            arpeggio_enabled: false,
            metronome_enabled: false,
            metronome_running: false,
            step_clock: None,
            arp: None,
            beat: BeatClock::default(),
            events: Vec::new(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    pub fn metronome(&self) -> &M {
        &self.metronome
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn arpeggio_settings(&self) -> &ArpeggioSettings {
        &self.arpeggio
    }

    pub fn is_playing(&self) -> bool {
        self.step_index.is_some()
    }

    pub fn step_index(&self) -> Option<usize> {
        self.step_index
    }

    pub fn current_step(&self) -> Option<&SequenceStep> {
        self.step_index.and_then(|i| self.sequence.get(i))
    }

    pub fn phase(&self) -> PlaybackPhase {
        match (self.step_index, &self.arp) {
            (None, _) => PlaybackPhase::Idle,
            (Some(_), Some(_)) => PlaybackPhase::ArpeggiatingStep,
            (Some(_), None) => PlaybackPhase::Playing,
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            phase: self.phase(),
            is_playing: self.is_playing(),
            sequence: self.sequence.clone(),
            step_index: self.step_index,
            looping: self.looping,
            tempo_bpm: self.tempo.bpm(),
            arpeggio_enabled: self.arpeggio_enabled,
            metronome_enabled: self.metronome_enabled,
        }
    }

    /// Number of live timers of any kind
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// When the next timer fires, if any
    pub fn next_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    /// Drain lifecycle events emitted since the last call
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Start playing a copy of `steps`. The first step sounds immediately.
    pub fn play(&mut self, steps: &[SequenceStep], looping: bool) -> Result<()> {
        if !is_playable(steps) {
            warn!("Nothing to play");
            return Err(ChordsmithError::EmptySequence);
        }

        if self.is_playing() {
            self.halt();
        }

        self.sequence = steps.to_vec();
        self.looping = looping;
        self.step_index = Some(0);
        info!(
            steps = self.sequence.len(),
            looping,
            bpm = self.tempo.bpm(),
            "Playback started"
        );

        self.dispatch_from(self.now_ms as f64);
        Ok(())
    }

    /// Audition one chord as a transient, non-looping sequence
    pub fn preview_chord(&mut self, chord: Chord) -> Result<()> {
        self.play(&[SequenceStep::chord(chord)], false)
    }

    /// Cancel every timer, silence everything, and go idle
    pub fn stop(&mut self) {
        if self.is_playing() {
            info!("Playback stopped");
        }
        self.halt();
    }

    /// Change tempo (clamped into range). A step in flight keeps its
    /// progress and is not re-triggered.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<()> {
        let tempo = Tempo::clamped(bpm)?;
        if tempo == self.tempo {
            return Ok(());
        }
        let previous = self.tempo;
        self.tempo = tempo;
        info!(from = previous.bpm(), to = tempo.bpm(), "Tempo changed");

        if self.is_playing() {
            self.rescale_step();
            self.rescale_metronome(previous);
        }
        Ok(())
    }

    /// Takes effect from the next dispatched step
    pub fn set_arpeggiator_enabled(&mut self, enabled: bool) {
        self.arpeggio_enabled = enabled;
    }

    /// Takes effect from the next dispatched step
    pub fn set_metronome_enabled(&mut self, enabled: bool) {
        self.metronome_enabled = enabled;
    }

    /// Takes effect from the next arpeggiated step
    pub fn set_arpeggio_settings(&mut self, settings: ArpeggioSettings) {
        self.arpeggio = settings.normalized();
    }

    /// Advance the clock, firing every timer due on the way
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some(timer) = self.timers.pop_due(now_ms) {
            self.now_ms = self.now_ms.max(timer.due_ms);
            self.fire(timer);
        }
        self.now_ms = self.now_ms.max(now_ms);
    }

    // ── Internals ───────────────────────────────────────────────────

    fn fire(&mut self, timer: Timer) {
        match timer.kind {
            TimerKind::Step => self.on_step_elapsed(),
            TimerKind::Arpeggio => self.play_arp_note(),
            TimerKind::Metronome => self.on_beat(),
        }
    }

    fn due(&self, at_ms: f64) -> u64 {
        at_ms.round().max(self.now_ms as f64) as u64
    }

    fn checked_index(&self, index: usize) -> usize {
        debug_assert!(
            index < self.sequence.len(),
            "step index {index} out of range for {} steps",
            self.sequence.len()
        );
        index.min(self.sequence.len().saturating_sub(1))
    }

    /// Dispatch the step at `step_index`, starting at `started_at`.
    /// Boundaries take no time, so dispatch moves straight past them.
    fn dispatch_from(&mut self, started_at: f64) {
        for _ in 0..=self.sequence.len() {
            let Some(index) = self.step_index else { return };
            let index = self.checked_index(index);
            let Some(step) = self.sequence.get(index).cloned() else {
                self.halt();
                return;
            };
            debug!(index, ?step, "Step started");
            self.events.push(PlaybackEvent::StepStarted { index, step: step.clone() });

            match step {
                SequenceStep::SectionBoundary => {
                    if !self.advance_index() {
                        return;
                    }
                }
                SequenceStep::Rest { duration } => {
                    self.begin_step(started_at, duration);
                    self.instrument.silence_all();
                    return;
                }
                SequenceStep::Chord { chord, duration } => {
                    self.begin_step(started_at, duration);
                    self.sound_chord(chord);
                    return;
                }
            }
        }
        // Only reachable for a sequence of nothing but boundaries, which
        // `play` rejects.
        self.halt();
    }

    /// Move to the next step; false once playback has finished
    fn advance_index(&mut self) -> bool {
        let next = self.step_index.map_or(0, |i| i + 1);
        if next < self.sequence.len() {
            self.step_index = Some(next);
            true
        } else if self.looping {
            self.step_index = Some(0);
            true
        } else {
            info!("Sequence finished");
            self.halt();
            false
        }
    }

    fn begin_step(&mut self, started_at: f64, duration: f64) {
        self.timers.cancel(TimerKind::Arpeggio);
        self.arp = None;
        self.apply_metronome_toggle(started_at);

        let length_ms = self.tempo.playable_step_ms(duration);
        self.step_clock = Some(StepClock {
            started_at,
            length_ms,
            duration,
        });
        self.timers.cancel(TimerKind::Step);
        let due = self.due(started_at + length_ms);
        self.timers.arm(TimerKind::Step, due);
    }

    fn sound_chord(&mut self, chord: Chord) {
        let Some(clock) = self.step_clock else { return };

        if !self.arpeggio_enabled {
            let notes = chord.voiced(self.config.chord_octave);
            self.instrument
                .trigger_notes(&notes, clock.length_ms / 1000.0, self.config.chord_velocity);
            return;
        }

        let notes = arpeggiate(&chord.notes(), &self.arpeggio, &mut self.rng);
        if notes.is_empty() {
            return;
        }
        let note_secs = self.arp_note_secs(clock.length_ms, notes.len());
        self.arp = Some(ArpRun {
            notes,
            next: 0,
            note_secs,
        });
        self.play_arp_note();
    }

    /// Each note gets an even slot of the step and lasts `note_length`
    /// beats, cut short to fit its slot.
    fn arp_note_secs(&self, step_ms: f64, count: usize) -> f64 {
        let slot_secs = step_ms / count as f64 / 1000.0;
        (self.arpeggio.note_length as f64 * self.tempo.beat_secs()).min(slot_secs)
    }

    fn play_arp_note(&mut self) {
        let Some(clock) = self.step_clock else { return };
        let Some(run) = self.arp.as_mut() else { return };
        let Some(arp_note) = run.notes.get(run.next).copied() else { return };

        run.next += 1;
        let (next, count, note_secs) = (run.next, run.notes.len(), run.note_secs);

        self.instrument
            .trigger_notes(&[arp_note.note], note_secs, arp_note.velocity);

        if next < count {
            let at = clock.started_at + clock.length_ms * next as f64 / count as f64;
            let due = self.due(at);
            self.timers.arm(TimerKind::Arpeggio, due);
        }
    }

    fn on_step_elapsed(&mut self) {
        let Some(clock) = self.step_clock.take() else { return };
        let next_start = clock.started_at + clock.length_ms;
        if self.advance_index() {
            self.dispatch_from(next_start);
        }
    }

    fn apply_metronome_toggle(&mut self, started_at: f64) {
        if self.metronome_enabled && !self.metronome_running {
            self.metronome_running = true;
            self.metronome.start(self.tempo);
            self.beat = BeatClock {
                last_at: started_at,
                count: 0,
            };
            self.metronome.beat(0, true);
            self.arm_next_beat();
        } else if !self.metronome_enabled && self.metronome_running {
            self.timers.cancel(TimerKind::Metronome);
            self.metronome.stop();
            self.metronome_running = false;
        }
    }

    fn arm_next_beat(&mut self) {
        let due = self.due(self.beat.last_at + self.tempo.beat_ms());
        self.timers.arm(TimerKind::Metronome, due);
    }

    fn on_beat(&mut self) {
        if !self.metronome_running {
            return;
        }
        self.beat.last_at += self.tempo.beat_ms();
        self.beat.count += 1;
        let accent = self.beat.count % BEATS_PER_BAR == 0;
        self.metronome.beat(self.beat.count, accent);
        self.arm_next_beat();
    }

    /// Re-arm the step (and arpeggio) timers under the new tempo, keeping
    /// the fraction of the step already played.
    fn rescale_step(&mut self) {
        let now = self.now_ms as f64;
        let Some(clock) = self.step_clock.as_mut() else { return };

        let progress = ((now - clock.started_at) / clock.length_ms).clamp(0.0, 1.0);
        let length_ms = self.tempo.playable_step_ms(clock.duration);
        clock.started_at = now - progress * length_ms;
        clock.length_ms = length_ms;
        let clock = *clock;

        self.timers.cancel(TimerKind::Step);
        let due = self.due(clock.started_at + clock.length_ms);
        self.timers.arm(TimerKind::Step, due);

        let Some((next, count)) = self.arp.as_ref().map(|r| (r.next, r.notes.len())) else {
            return;
        };
        let note_secs = self.arp_note_secs(clock.length_ms, count);
        if let Some(run) = self.arp.as_mut() {
            run.note_secs = note_secs;
        }
        self.timers.cancel(TimerKind::Arpeggio);
        if next < count {
            let at = clock.started_at + clock.length_ms * next as f64 / count as f64;
            let due = self.due(at);
            self.timers.arm(TimerKind::Arpeggio, due);
        }
    }

    fn rescale_metronome(&mut self, previous: Tempo) {
        if !self.metronome_running {
            return;
        }
        let now = self.now_ms as f64;
        let progress = ((now - self.beat.last_at) / previous.beat_ms()).clamp(0.0, 1.0);
        self.beat.last_at = now - progress * self.tempo.beat_ms();
        self.timers.cancel(TimerKind::Metronome);
        self.arm_next_beat();
    }

    /// Tear everything down. Emits `PlaybackStopped` if we were playing.
    fn halt(&mut self) {
        let was_playing = self.is_playing();

        self.timers.cancel_all();
        self.instrument.silence_all();
        if self.metronome_running {
            self.metronome.stop();
            self.metronome_running = false;
        }

        self.sequence.clear();
        self.step_index = None;
        self.step_clock = None;
        self.arp = None;

        if was_playing {
            self.events.push(PlaybackEvent::PlaybackStopped);
        }
    }
}
