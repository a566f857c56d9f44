//! Fixed-size tile grid for one chunk.

use crate::coords::{CHUNK_AREA, CHUNK_SIZE, ChunkPos, LocalPos, TileId, to_tile_index};

/// A `CHUNK_SIZE` x `CHUNK_SIZE` grid of tiles stored row-major.
///
/// Allocated once when its position is first generated and mutated in place
/// by edits. Never resized.
#[derive(Clone, Debug)]
pub struct Chunk {
  pos: ChunkPos,
  tiles: Box<[TileId]>,
}

impl Chunk {
  /// Creates a chunk filled with air.
  pub fn new(pos: ChunkPos) -> Self {
    Self {
      pos,
      tiles: vec![TileId::EMPTY; CHUNK_AREA].into_boxed_slice(),
    }
  }

  /// Chunk grid position.
  #[inline]
  pub fn pos(&self) -> ChunkPos {
    self.pos
  }

  #[inline]
  pub fn get(&self, local: LocalPos) -> TileId {
    self.tiles[to_tile_index(local)]
  }

  /// Writes a tile, returning the id it replaced.
  #[inline]
  pub fn set(&mut self, local: LocalPos, id: TileId) -> TileId {
    std::mem::replace(&mut self.tiles[to_tile_index(local)], id)
  }

  /// Raw row-major tile slice.
  pub fn tiles(&self) -> &[TileId] {
    &self.tiles
  }

  /// Returns true if every tile is air.
  pub fn is_empty(&self) -> bool {
    self.tiles.iter().all(|t| t.is_empty())
  }

  /// Iterates `(local, tile)` pairs in row-major order.
  pub fn iter(&self) -> impl Iterator<Item = (LocalPos, TileId)> + '_ {
    self.tiles.iter().enumerate().map(|(i, &tile)| {
      let x = (i as u32 % CHUNK_SIZE) as u16;
      let y = (i as u32 / CHUNK_SIZE) as u16;
      (LocalPos::new(x, y), tile)
    })
  }
}
