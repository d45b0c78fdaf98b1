//! Arpeggio pattern generator

use serde::{Deserialize, Serialize};

use crate::pitch::{Note, PitchClass, MAX_OCTAVE};

/// Octave the arpeggio starts from before `octave_offset` is applied
pub const BASE_ARP_OCTAVE: u8 = 4;

/// Velocity multiplier for the first note when `accent_first` is set
pub const ACCENT_MULTIPLIER: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArpPattern {
    #[default]
    Up,
    Down,
    UpDown,
    DownUp,
    Random,
}

impl ArpPattern {
    pub const ALL: [ArpPattern; 5] = [Self::Up, Self::Down, Self::UpDown, Self::DownUp, Self::Random];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::UpDown => "updown",
            Self::DownUp => "downup",
            Self::Random => "random",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Arpeggiator configuration. Missing fields take their defaults when
/// deserialized; `normalized` clamps everything into range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpeggioSettings {
    pub pattern: ArpPattern,
    /// Number of octaves spanned, 1..=3
    pub octave_range: u8,
    /// Shift from the base octave, -2..=1
    pub octave_offset: i8,
    /// Length of each note as a fraction of a beat
    pub note_length: f32,
    /// 0.0..=1.0
    pub velocity: f32,
    pub accent_first: bool,
}

impl Default for ArpeggioSettings {
    fn default() -> Self {
        Self {
            pattern: ArpPattern::Up,
            octave_range: 1,
            octave_offset: 0,
            note_length: 0.5,
            velocity: 0.8,
            accent_first: true,
        }
    }
}

impl ArpeggioSettings {
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let note_length = if self.note_length.is_finite() && self.note_length > 0.0 {
            self.note_length.clamp(1.0 / 16.0, 4.0)
        } else {
            defaults.note_length
        };
        let velocity = if self.velocity.is_finite() {
            self.velocity.clamp(0.0, 1.0)
        } else {
            defaults.velocity
        };

        Self {
            pattern: self.pattern,
            octave_range: self.octave_range.clamp(1, 3),
            octave_offset: self.octave_offset.clamp(-2, 1),
            note_length,
            velocity,
            accent_first: self.accent_first,
        }
    }
}

/// One note of an expanded arpeggio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArpNote {
    pub note: Note,
    pub velocity: f32,
}

/// Expand a chord's octave-less notes into an ordered arpeggio.
///
/// `rng` is only consulted by [`ArpPattern::Random`].
pub fn arpeggiate(
    notes: &[PitchClass],
    settings: &ArpeggioSettings,
    rng: &mut fastrand::Rng,
) -> Vec<ArpNote> {
    let settings = settings.normalized();
    let octave = (BASE_ARP_OCTAVE as i32 + settings.octave_offset as i32)
        .clamp(0, MAX_OCTAVE as i32) as u8;

    let mut sorted: Vec<Note> = notes.iter().map(|&p| Note::new(p, octave)).collect();
    sorted.sort_by_key(|n| (n.pitch, n.octave));

    let range = settings.octave_range as i32;
    let up: Vec<Note> = (0..range)
        .flat_map(|oct| sorted.iter().map(move |n| n.shift_octaves(oct)))
        .collect();
    let down: Vec<Note> = (0..range)
        .rev()
        .flat_map(|oct| sorted.iter().rev().map(move |n| n.shift_octaves(oct)))
        .collect();

    let sequence = match settings.pattern {
        ArpPattern::Up => up,
        ArpPattern::Down => down,
        ArpPattern::UpDown => join_at_turn(up, &down),
        ArpPattern::DownUp => join_at_turn(down, &up),
        ArpPattern::Random => {
            if up.is_empty() {
                up
            } else {
                (0..up.len() * 2).map(|_| up[rng.usize(..up.len())]).collect()
            }
        }
    };

    sequence
        .into_iter()
        .enumerate()
        .map(|(i, note)| {
            let velocity = if i == 0 && settings.accent_first {
                (settings.velocity * ACCENT_MULTIPLIER).min(1.0)
            } else {
                settings.velocity
            };
            ArpNote { note, velocity }
        })
        .collect()
}

/// Append `back` to `front`, dropping the note at the turn and the one that
/// would repeat `front`'s first note when the pattern loops.
fn join_at_turn(mut front: Vec<Note>, back: &[Note]) -> Vec<Note> {
    if back.len() > 2 {
        front.extend_from_slice(&back[1..back.len() - 1]);
    }
    front
}

#[cfg(test)]
mod tests {
    use super::*;
    use PitchClass::*;

    fn settings(pattern: ArpPattern, octave_range: u8) -> ArpeggioSettings {
        ArpeggioSettings {
            pattern,
            octave_range,
            accent_first: false,
            ..Default::default()
        }
    }

    fn midi(notes: &[ArpNote]) -> Vec<u8> {
        notes.iter().map(|n| n.note.midi()).collect()
    }

    #[test]
    fn test_up_two_octaves() {
        let mut rng = fastrand::Rng::with_seed(1);
        let arp = arpeggiate(&[C, E, G], &settings(ArpPattern::Up, 2), &mut rng);
        assert_eq!(arp.len(), 6);
        assert_eq!(midi(&arp), vec![60, 64, 67, 72, 76, 79]);
        assert!(arp.windows(2).all(|w| w[0].note <= w[1].note));
    }

    #[test]
    fn test_sorts_by_ring_position() {
        let mut rng = fastrand::Rng::with_seed(1);
        let arp = arpeggiate(&[G, B, D], &settings(ArpPattern::Up, 1), &mut rng);
        assert_eq!(midi(&arp), vec![62, 67, 71]);
    }

    #[test]
    fn test_down() {
        let mut rng = fastrand::Rng::with_seed(1);
        let arp = arpeggiate(&[C, E, G], &settings(ArpPattern::Down, 2), &mut rng);
        assert_eq!(midi(&arp), vec![79, 76, 72, 67, 64, 60]);
    }

    #[test]
    fn test_up_down_has_no_repeat_at_turn() {
        let mut rng = fastrand::Rng::with_seed(1);
        let arp = arpeggiate(&[C, E, G], &settings(ArpPattern::UpDown, 1), &mut rng);
        assert_eq!(midi(&arp), vec![60, 64, 67, 64]);

        let wide = arpeggiate(&[C, E, G], &settings(ArpPattern::UpDown, 2), &mut rng);
        assert_eq!(midi(&wide), vec![60, 64, 67, 72, 76, 79, 76, 72, 67, 64]);
        assert!(wide.windows(2).all(|w| w[0].note != w[1].note));
        assert_ne!(wide.first().map(|n| n.note), wide.last().map(|n| n.note));
    }

    #[test]
    fn test_down_up_mirrors() {
        let mut rng = fastrand::Rng::with_seed(1);
        let arp = arpeggiate(&[C, E, G], &settings(ArpPattern::DownUp, 1), &mut rng);
        assert_eq!(midi(&arp), vec![67, 64, 60, 64]);
    }

    #[test]
    fn test_random_draws_from_pool() {
        let mut rng = fastrand::Rng::with_seed(42);
        let arp = arpeggiate(&[C, E, G], &settings(ArpPattern::Random, 2), &mut rng);
        assert_eq!(arp.len(), 12);
        let pool = [60, 64, 67, 72, 76, 79];
        assert!(midi(&arp).iter().all(|m| pool.contains(m)));
    }

    #[test]
    fn test_single_note_chord() {
        let mut rng = fastrand::Rng::with_seed(1);
        for pattern in ArpPattern::ALL {
            let arp = arpeggiate(&[A], &settings(pattern, 2), &mut rng);
            assert!(!arp.is_empty());
            assert!(arp.iter().all(|n| n.note.pitch == A));
        }
        let up_down = arpeggiate(&[A], &settings(ArpPattern::UpDown, 2), &mut rng);
        assert_eq!(midi(&up_down), vec![69, 81]);
    }

    #[test]
    fn test_accent_first_is_clamped() {
        let mut rng = fastrand::Rng::with_seed(1);
        let s = ArpeggioSettings { velocity: 0.9, ..Default::default() };
        let arp = arpeggiate(&[C, E, G], &s, &mut rng);
        assert_eq!(arp[0].velocity, 1.0);
        assert_eq!(arp[1].velocity, 0.9);

        let soft = ArpeggioSettings { velocity: 0.5, ..Default::default() };
        let arp = arpeggiate(&[C, E, G], &soft, &mut rng);
        assert!((arp[0].velocity - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_octave_offset_and_clamping() {
        let mut rng = fastrand::Rng::with_seed(1);
        let low = ArpeggioSettings { octave_offset: -2, ..settings(ArpPattern::Up, 1) };
        assert_eq!(arpeggiate(&[C], &low, &mut rng)[0].note.octave, 2);

        let wild = ArpeggioSettings {
            octave_range: 9,
            octave_offset: 5,
            velocity: 3.0,
            note_length: f32::NAN,
            ..Default::default()
        }
        .normalized();
        assert_eq!(wild.octave_range, 3);
        assert_eq!(wild.octave_offset, 1);
        assert_eq!(wild.velocity, 1.0);
        assert_eq!(wild.note_length, 0.5);
    }

    #[test]
    fn test_settings_default_missing_fields() {
        let s: ArpeggioSettings = serde_json::from_str(r#"{"pattern":"UpDown"}"#).unwrap();
        assert_eq!(s.pattern, ArpPattern::UpDown);
        assert_eq!(s.octave_range, 1);
        assert!(s.accent_first);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(ArpPattern::from_name("up-down"), Some(ArpPattern::UpDown));
        assert_eq!(ArpPattern::from_name("RANDOM"), Some(ArpPattern::Random));
        assert_eq!(ArpPattern::from_name("sideways"), None);
    }
}
