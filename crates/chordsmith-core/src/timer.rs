//! Generation-tagged timers on a millisecond clock.
//!
//! Every kind of timer carries a generation counter. Cancelling a kind bumps
//! its generation, so a timer armed before the cancel can never fire even
//! if a copy of it is still held somewhere.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Advances the sequence to its next step
    Step,
    /// Next metronome beat
    Metronome,
    /// Next note of the current step's arpeggio
    Arpeggio,
}

impl TimerKind {
    fn slot(self) -> usize {
        match self {
            Self::Step => 0,
            Self::Metronome => 1,
            Self::Arpeggio => 2,
        }
    }
}

/// An armed timer. Ordered by due time, then by arming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timer {
    pub due_ms: u64,
    seq: u64,
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Timer>>,
    generations: [u64; 3],
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: TimerKind, due_ms: u64) -> Timer {
        let timer = Timer {
            due_ms,
            seq: self.next_seq,
            kind,
            generation: self.generations[kind.slot()],
        };
        self.next_seq += 1;
        self.heap.push(Reverse(timer));
        timer
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.generations[kind.slot()] += 1;
        self.heap.retain(|Reverse(t)| t.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        for generation in &mut self.generations {
            *generation += 1;
        }
        self.heap.clear();
    }

    pub fn is_current(&self, timer: &Timer) -> bool {
        timer.generation == self.generations[timer.kind.slot()]
    }

    /// Pop the earliest live timer due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Timer> {
        while let Some(Reverse(next)) = self.heap.peek().copied() {
            if next.due_ms > now_ms {
                return None;
            }
            self.heap.pop();
            if self.is_current(&next) {
                return Some(next);
            }
        }
        None
    }

    /// Due time of the earliest live timer
    pub fn next_due(&self) -> Option<u64> {
        self.heap
            .iter()
            .filter(|Reverse(t)| self.is_current(t))
            .map(|Reverse(t)| t.due_ms)
            .min()
    }

    pub fn pending(&self) -> usize {
        self.heap.iter().filter(|Reverse(t)| self.is_current(t)).count()
    }

    pub fn pending_of(&self, kind: TimerKind) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(t)| t.kind == kind && self.is_current(t))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_due_order() {
        let mut q = TimerQueue::new();
        q.arm(TimerKind::Step, 2000);
        q.arm(TimerKind::Metronome, 500);
        q.arm(TimerKind::Arpeggio, 500);

        assert_eq!(q.next_due(), Some(500));
        assert_eq!(q.pop_due(499), None);
        assert_eq!(q.pop_due(1000).map(|t| t.kind), Some(TimerKind::Metronome));
        assert_eq!(q.pop_due(1000).map(|t| t.kind), Some(TimerKind::Arpeggio));
        assert_eq!(q.pop_due(1000), None);
        assert_eq!(q.pending(), 1);
    }

    #[test]
    fn test_cancel_bumps_generation() {
        let mut q = TimerQueue::new();
        let stale = q.arm(TimerKind::Step, 100);
        q.cancel(TimerKind::Step);
        assert!(!q.is_current(&stale));

        let fresh = q.arm(TimerKind::Step, 200);
        assert!(q.is_current(&fresh));
        assert_eq!(q.pending_of(TimerKind::Step), 1);
        assert_eq!(q.pop_due(1000), Some(fresh));
    }

    #[test]
    fn test_cancel_all() {
        let mut q = TimerQueue::new();
        q.arm(TimerKind::Step, 1);
        q.arm(TimerKind::Metronome, 2);
        q.arm(TimerKind::Arpeggio, 3);
        q.cancel_all();
        assert_eq!(q.pending(), 0);
        assert_eq!(q.next_due(), None);
        assert_eq!(q.pop_due(u64::MAX), None);
    }
}
