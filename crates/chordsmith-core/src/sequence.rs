//! Sequence steps, blocks (named sections) and the track that orders them

use serde::{Deserialize, Serialize};

use crate::chord::Chord;
use crate::error::{ChordsmithError, Result};
use crate::tonality::Tonality;

fn whole_note() -> f64 {
    1.0
}

/// One scheduled unit. Durations are in whole notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceStep {
    Chord {
        chord: Chord,
        #[serde(default = "whole_note")]
        duration: f64,
    },
    Rest {
        #[serde(default = "whole_note")]
        duration: f64,
    },
    SectionBoundary,
}

impl SequenceStep {
    pub fn chord(chord: Chord) -> Self {
        Self::Chord { chord, duration: whole_note() }
    }

    pub fn rest() -> Self {
        Self::Rest { duration: whole_note() }
    }

    /// Length in whole notes; boundaries take no time
    pub fn duration(&self) -> f64 {
        match self {
            Self::Chord { duration, .. } | Self::Rest { duration } => *duration,
            Self::SectionBoundary => 0.0,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::SectionBoundary)
    }

    pub fn as_chord(&self) -> Option<&Chord> {
        match self {
            Self::Chord { chord, .. } => Some(chord),
            _ => None,
        }
    }
}

/// True if `steps` holds anything besides section boundaries
pub fn is_playable(steps: &[SequenceStep]) -> bool {
    steps.iter().any(|s| !s.is_boundary())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// A named section with its own tonality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub tonality: Tonality,
    pub steps: Vec<SequenceStep>,
}

impl Block {
    pub fn new(id: BlockId, name: impl Into<String>, tonality: Tonality) -> Self {
        Self {
            id,
            name: name.into(),
            tonality,
            steps: Vec::new(),
        }
    }

    pub fn append(&mut self, step: SequenceStep) {
        self.steps.push(step);
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn insert(&mut self, index: usize, step: SequenceStep) {
        let idx = index.min(self.steps.len());
        self.steps.insert(idx, step);
    }

    pub fn remove_at(&mut self, index: usize) -> Result<SequenceStep> {
        if index >= self.steps.len() {
            return Err(ChordsmithError::InvalidStepIndex {
                index,
                len: self.steps.len(),
            });
        }
        Ok(self.steps.remove(index))
    }

    /// Append the diatonic chord on `degree`, as a triad or seventh
    pub fn append_degree(&mut self, degree: u8, seventh: bool) -> Option<Chord> {
        let diatonic = self.tonality.degree(degree)?;
        let chord = if seventh { diatonic.seventh_chord() } else { diatonic.chord() };
        self.append(SequenceStep::chord(chord));
        Some(chord)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Flatten blocks into one sequence, with a boundary between each pair of
/// non-empty blocks. Empty blocks contribute nothing.
pub fn concatenate_blocks(blocks: &[Block]) -> Vec<SequenceStep> {
    let mut out = Vec::new();
    for block in blocks.iter().filter(|b| !b.is_empty()) {
        if !out.is_empty() {
            out.push(SequenceStep::SectionBoundary);
        }
        out.extend(block.steps.iter().cloned());
    }
    out
}

/// Ordered blocks with exactly one current block. Persisted as its
/// `Vec<Block>` and rebuilt with [`Track::from_blocks`].
#[derive(Debug, Clone)]
pub struct Track {
    blocks: Vec<Block>,
    current: BlockId,
    next_block_id: u64,
}

impl Default for Track {
    fn default() -> Self {
        Self::new(Tonality::default())
    }
}

impl Track {
    pub fn new(tonality: Tonality) -> Self {
        let first = Block::new(BlockId(1), "Section 1", tonality);
        Self {
            blocks: vec![first],
            current: BlockId(1),
            next_block_id: 2,
        }
    }

    /// Rebuild from stored blocks; the first block becomes current
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let Some(first) = blocks.first() else {
            return Self::default();
        };
        let current = first.id;
        let next_block_id = blocks.iter().map(|b| b.id.0).max().unwrap_or(0) + 1;
        Self {
            blocks,
            current,
            next_block_id,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn add_block(&mut self, name: impl Into<String>, tonality: Tonality) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.push(Block::new(id, name, tonality));
        id
    }

    /// Remove a block. The last remaining block is never removed; if the
    /// current block goes, its successor (or predecessor) becomes current.
    pub fn remove_block(&mut self, id: BlockId) -> Option<Block> {
        if self.blocks.len() <= 1 {
            return None;
        }
        let pos = self.blocks.iter().position(|b| b.id == id)?;
        let removed = self.blocks.remove(pos);
        if removed.id == self.current {
            let next = pos.min(self.blocks.len() - 1);
            self.current = self.blocks[next].id;
        }
        Some(removed)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn current_id(&self) -> BlockId {
        self.current
    }

    pub fn current(&self) -> &Block {
        self.block(self.current).unwrap_or(&self.blocks[0])
    }

    pub fn current_mut(&mut self) -> &mut Block {
        let idx = self
            .blocks
            .iter()
            .position(|b| b.id == self.current)
            .unwrap_or(0);
        &mut self.blocks[idx]
    }

    pub fn select(&mut self, id: BlockId) -> Result<()> {
        if self.block(id).is_none() {
            return Err(ChordsmithError::BlockNotFound(id.0));
        }
        self.current = id;
        Ok(())
    }

    pub fn rename(&mut self, id: BlockId, name: impl Into<String>) -> Result<()> {
        let block = self.block_mut(id).ok_or(ChordsmithError::BlockNotFound(id.0))?;
        block.name = name.into();
        Ok(())
    }

    /// Copy of one block's steps, for handing to the scheduler
    pub fn block_steps(&self, id: BlockId) -> Result<Vec<SequenceStep>> {
        self.block(id)
            .map(|b| b.steps.clone())
            .ok_or(ChordsmithError::BlockNotFound(id.0))
    }

    /// The whole track as one sequence
    pub fn flatten(&self) -> Vec<SequenceStep> {
        concatenate_blocks(&self.blocks)
    }

    /// Block containing the `index`th step of [`flatten`](Self::flatten)
    pub fn block_at(&self, index: usize) -> Option<&Block> {
        let mut start = 0;
        for block in self.blocks.iter().filter(|b| !b.is_empty()) {
            let end = start + block.len();
            if index < end {
                return Some(block);
            }
            if index == end {
                return None;
            }
            start = end + 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::ChordQuality;
    use crate::pitch::PitchClass;
    use crate::tonality::Mode;

    fn chord(root: PitchClass) -> SequenceStep {
        SequenceStep::chord(Chord::new(root, ChordQuality::Maj))
    }

    fn block_with(id: u64, steps: Vec<SequenceStep>) -> Block {
        let mut block = Block::new(BlockId(id), format!("B{id}"), Tonality::default());
        block.steps = steps;
        block
    }

    #[test]
    fn test_append_and_remove() {
        let mut block = Block::new(BlockId(1), "Verse", Tonality::default());
        block.append(chord(PitchClass::C));
        block.append(SequenceStep::rest());
        block.insert(1, chord(PitchClass::G));
        assert_eq!(block.len(), 3);
        assert_eq!(block.remove_at(1).unwrap(), chord(PitchClass::G));
        assert_eq!(
            block.remove_at(5),
            Err(ChordsmithError::InvalidStepIndex { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_concatenate_inserts_boundaries_between_blocks() {
        let a = block_with(1, vec![chord(PitchClass::C), chord(PitchClass::F)]);
        let b = block_with(2, vec![chord(PitchClass::G)]);
        let flat = concatenate_blocks(&[a, b]);
        assert_eq!(
            flat,
            vec![
                chord(PitchClass::C),
                chord(PitchClass::F),
                SequenceStep::SectionBoundary,
                chord(PitchClass::G)
            ]
        );
    }

    #[test]
    fn test_concatenate_skips_empty_blocks() {
        let a = block_with(1, vec![chord(PitchClass::C)]);
        let empty = block_with(2, vec![]);
        let b = block_with(3, vec![chord(PitchClass::G)]);

        let flat = concatenate_blocks(&[empty.clone(), a.clone(), empty.clone(), b, empty.clone()]);
        assert_eq!(flat.iter().filter(|s| s.is_boundary()).count(), 1);
        assert!(!flat.first().unwrap().is_boundary());
        assert!(!flat.last().unwrap().is_boundary());

        assert_eq!(concatenate_blocks(&[a, empty.clone()]), vec![chord(PitchClass::C)]);
        assert!(concatenate_blocks(&[empty]).is_empty());
    }

    #[test]
    fn test_track_block_management() {
        let mut track = Track::new(Tonality::default());
        let chorus = track.add_block("Chorus", Tonality::new(PitchClass::A, Mode::Minor));
        assert_eq!(track.blocks().len(), 2);

        track.select(chorus).unwrap();
        assert_eq!(track.current().name, "Chorus");
        assert_eq!(track.select(BlockId(99)), Err(ChordsmithError::BlockNotFound(99)));

        let removed = track.remove_block(chorus).unwrap();
        assert_eq!(removed.name, "Chorus");
        assert_eq!(track.current_id(), BlockId(1));
        assert!(track.remove_block(BlockId(1)).is_none());
    }

    #[test]
    fn test_block_steps_are_a_copy() {
        let mut track = Track::default();
        track.current_mut().append(chord(PitchClass::C));
        let snapshot = track.block_steps(track.current_id()).unwrap();
        track.current_mut().remove_at(0).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(track.current().is_empty());
    }

    #[test]
    fn test_append_degree() {
        let mut block = Block::new(BlockId(1), "V", Tonality::new(PitchClass::G, Mode::Major));
        let five = block.append_degree(5, true).unwrap();
        assert_eq!(five, Chord::new(PitchClass::D, ChordQuality::Dom7));
        assert!(block.append_degree(9, false).is_none());
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn test_block_at_flattened_index() {
        let mut track = Track::default();
        track.current_mut().append(chord(PitchClass::C));
        track.current_mut().append(chord(PitchClass::F));
        let second = track.add_block("B", Tonality::default());
        track.block_mut(second).unwrap().append(chord(PitchClass::G));

        assert_eq!(track.block_at(1).unwrap().id, BlockId(1));
        assert!(track.block_at(2).is_none());
        assert_eq!(track.block_at(3).unwrap().id, second);
    }

    #[test]
    fn test_from_blocks_and_serde() {
        let blocks = vec![block_with(4, vec![chord(PitchClass::C)]), block_with(7, vec![])];
        let json = serde_json::to_string(&blocks).unwrap();
        let restored: Vec<Block> = serde_json::from_str(&json).unwrap();
        let mut track = Track::from_blocks(restored);
        assert_eq!(track.current_id(), BlockId(4));
        assert_eq!(track.add_block("new", Tonality::default()), BlockId(8));
    }

    #[test]
    fn test_step_defaults_when_deserialized() {
        let step: SequenceStep =
            serde_json::from_str(r#"{"type":"chord","chord":{"root":"E","quality":"min"}}"#).unwrap();
        assert_eq!(step.duration(), 1.0);
        let boundary: SequenceStep = serde_json::from_str(r#"{"type":"section_boundary"}"#).unwrap();
        assert!(boundary.is_boundary());
    }
}
