//! Dense chunk arena with a position index.

use std::collections::HashMap;

use crate::coords::ChunkPos;
use crate::primitives::Chunk;

/// Index into the arena's dense chunk array.
///
/// Stable only until the next removal: removing a chunk moves the last chunk
/// into the freed slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SlotIndex(pub usize);

/// Dense storage for resident chunks.
///
/// Chunks live contiguously in `chunks`; `index` maps positions to slots.
/// Removal is a swap-remove that patches the moved chunk's index entry.
#[derive(Default)]
pub(crate) struct ChunkArena {
  chunks: Vec<Chunk>,
  index: HashMap<ChunkPos, SlotIndex>,
}

impl ChunkArena {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores a chunk under its own position.
  ///
  /// The position must not already be resident.
  pub fn insert(&mut self, chunk: Chunk) -> SlotIndex {
    let idx = SlotIndex(self.chunks.len());
    debug_assert!(
      !self.index.contains_key(&chunk.pos()),
      "chunk {:?} inserted twice",
      chunk.pos()
    );
    self.index.insert(chunk.pos(), idx);
    self.chunks.push(chunk);
    idx
  }

  /// Gets the slot index for a resident chunk position.
  #[inline]
  pub fn index_for(&self, pos: ChunkPos) -> Option<SlotIndex> {
    self.index.get(&pos).copied()
  }

  #[inline]
  pub fn get(&self, idx: SlotIndex) -> &Chunk {
    &self.chunks[idx.0]
  }

  #[inline]
  pub fn get_mut(&mut self, idx: SlotIndex) -> &mut Chunk {
    &mut self.chunks[idx.0]
  }

  /// Removes a chunk by position in O(1).
  pub fn swap_remove(&mut self, pos: ChunkPos) -> Option<Chunk> {
    let idx = self.index.remove(&pos)?;
    let removed = self.chunks.swap_remove(idx.0);
    if let Some(moved) = self.chunks.get(idx.0) {
      self.index.insert(moved.pos(), idx);
    }
    Some(removed)
  }

  /// Removes every chunk whose position fails `keep`, returning the count.
  pub fn retain(&mut self, mut keep: impl FnMut(ChunkPos) -> bool) -> usize {
    let doomed: Vec<ChunkPos> = self
      .chunks
      .iter()
      .map(Chunk::pos)
      .filter(|&pos| !keep(pos))
      .collect();
    for pos in &doomed {
      self.swap_remove(*pos);
    }
    doomed.len()
  }

  /// Returns the number of resident chunks.
  pub fn len(&self) -> usize {
    self.chunks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.chunks.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
    self.chunks.iter()
  }
}
