//! Chunk seeding - filling freshly allocated chunks with procedural tiles.
//!
//! The [`ChunkSeeder`] trait is the pluggable generator behind
//! [`TileWorld::ensure_chunk`](crate::TileWorld::ensure_chunk). Seeders must
//! be pure functions of world tile coordinates: a pruned chunk that is
//! revisited is regenerated from the seeder, and callers who never edited it
//! must not be able to tell.

mod terrain;

pub use terrain::TerrainSeeder;

use crate::coords::{CHUNK_SIZE, ChunkPos, LocalPos, TileId, TilePos};
use crate::primitives::Chunk;

/// Trait for populating chunk tile grids with initial data.
///
/// The `Send + Sync` bounds let a world holding a boxed seeder live in a
/// Bevy resource.
pub trait ChunkSeeder: Send + Sync {
  /// Generated tile at a world position.
  fn tile_at(&self, tile: TilePos) -> TileId;

  /// Fills the chunk with tiles for the given chunk position.
  ///
  /// Default implementation calls [`tile_at`](Self::tile_at) per tile.
  fn seed(&self, pos: ChunkPos, chunk: &mut Chunk) {
    for ly in 0..CHUNK_SIZE as u16 {
      for lx in 0..CHUNK_SIZE as u16 {
        let local = LocalPos::new(lx, ly);
        chunk.set(local, self.tile_at(pos.tile_at(local)));
      }
    }
  }
}

/// Seeder that leaves every chunk as air.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySeeder;

impl ChunkSeeder for EmptySeeder {
  fn tile_at(&self, _tile: TilePos) -> TileId {
    TileId::EMPTY
  }

  fn seed(&self, _pos: ChunkPos, _chunk: &mut Chunk) {}
}

/// Seeder that fills every row at or below `floor` with one tile.
#[derive(Clone, Copy, Debug)]
pub struct FlatSeeder {
  pub floor: i32,
  pub tile: TileId,
}

impl ChunkSeeder for FlatSeeder {
  fn tile_at(&self, tile: TilePos) -> TileId {
    if tile.y >= self.floor {
      self.tile
    } else {
      TileId::EMPTY
    }
  }
}
