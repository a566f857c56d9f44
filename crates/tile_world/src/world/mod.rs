//! TileWorld - sparse, procedurally generated chunk store.
//!
//! Chunks are generated from a [`ChunkSeeder`] on first access and kept in a
//! dense arena until pruned. Edits notify registered [`TileEditListener`]s
//! synchronously and are also queued for the mesh streamer, which drains
//! them once per frame.
//!
//! Pruning discards tile data unconditionally. A pruned chunk that is
//! revisited is regenerated from the seeder, so edits made inside it are
//! lost.

mod pool;

use bevy::prelude::Resource;
use pool::ChunkArena;

use crate::autotile::{Direction, TileNeighborhood};
use crate::coords::{
  ChunkBounds, ChunkPos, LocalPos, TileId, TilePos, world_to_chunk, world_to_local,
};
use crate::primitives::Chunk;
use crate::seeding::ChunkSeeder;

/// Emitted once per [`TileWorld::set_tile`] call that changes a tile.
#[derive(bevy::prelude::Message, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileEditEvent {
  pub tile: TilePos,
  pub chunk: ChunkPos,
  pub local: LocalPos,
  pub previous: TileId,
  pub tile_id: TileId,
}

/// Synchronous observer of tile edits.
///
/// Registration is append-only.
pub trait TileEditListener: Send + Sync {
  fn on_tile_edit(&mut self, event: &TileEditEvent);
}

impl<F> TileEditListener for F
where
  F: FnMut(&TileEditEvent) + Send + Sync,
{
  fn on_tile_edit(&mut self, event: &TileEditEvent) {
    self(event)
  }
}

/// Read-only tile access used by the mesher for neighbor sampling.
pub trait NeighborhoodSampler {
  /// Tile at a world position.
  fn tile(&self, tile: TilePos) -> TileId;

  /// Center tile and its eight neighbors.
  fn neighborhood(&self, center: TilePos) -> TileNeighborhood {
    let mut n = TileNeighborhood {
      center: self.tile(center),
      ..Default::default()
    };
    for dir in Direction::ALL {
      let (dx, dy) = dir.offset();
      *n.get_mut(dir) = self.tile(center.offset(dx, dy));
    }
    n
  }
}

/// Sparse infinite tile world.
#[derive(Resource)]
pub struct TileWorld {
  chunks: ChunkArena,
  seeder: Box<dyn ChunkSeeder>,
  listeners: Vec<Box<dyn TileEditListener>>,
  /// Edits not yet consumed by the streamer.
  pending_edits: Vec<TileEditEvent>,
}

impl TileWorld {
  /// Creates an empty world generated by `seeder`.
  pub fn new(seeder: impl ChunkSeeder + 'static) -> Self {
    Self {
      chunks: ChunkArena::new(),
      seeder: Box::new(seeder),
      listeners: Vec::new(),
      pending_edits: Vec::new(),
    }
  }

  /// Returns the chunk at `pos`, generating it on first access.
  pub fn ensure_chunk(&mut self, pos: ChunkPos) -> &Chunk {
    let idx = match self.chunks.index_for(pos) {
      Some(idx) => idx,
      None => {
        let mut chunk = Chunk::new(pos);
        self.seeder.seed(pos, &mut chunk);
        self.chunks.insert(chunk)
      }
    };
    self.chunks.get(idx)
  }

  /// Returns a resident chunk without generating.
  pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
    self.chunks.index_for(pos).map(|idx| self.chunks.get(idx))
  }

  /// Returns true if the chunk is resident.
  pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
    self.chunks.index_for(pos).is_some()
  }

  /// Generates every chunk within `radius` of `center` (a square).
  pub fn seed_radius(&mut self, center: ChunkPos, radius: u32) {
    let bounds = ChunkBounds::single(center).expand(radius as i32);
    for pos in bounds.positions() {
      self.ensure_chunk(pos);
    }
  }

  /// Tile at a world position, generating its chunk if needed.
  pub fn get_tile(&mut self, tile: TilePos) -> TileId {
    let (chunk, local) = tile.to_chunk_and_local();
    self.ensure_chunk(chunk).get(local)
  }

  /// Writes a tile.
  ///
  /// Returns false and does nothing if the tile already has `tile_id`.
  /// Otherwise notifies every listener with one [`TileEditEvent`].
  pub fn set_tile(&mut self, tile: TilePos, tile_id: TileId) -> bool {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    self.ensure_chunk(chunk_pos);
    let Some(idx) = self.chunks.index_for(chunk_pos) else {
      return false;
    };

    let chunk = self.chunks.get_mut(idx);
    if chunk.get(local) == tile_id {
      return false;
    }
    let previous = chunk.set(local, tile_id);

    let event = TileEditEvent {
      tile,
      chunk: chunk_pos,
      local,
      previous,
      tile_id,
    };
    for listener in &mut self.listeners {
      listener.on_tile_edit(&event);
    }
    self.pending_edits.push(event);
    true
  }

  /// Registers an edit observer.
  pub fn add_listener(&mut self, listener: impl TileEditListener + 'static) {
    self.listeners.push(Box::new(listener));
  }

  /// Takes all edits made since the last drain.
  pub fn drain_edits(&mut self) -> Vec<TileEditEvent> {
    std::mem::take(&mut self.pending_edits)
  }

  /// Samples the 3x3 neighborhood around a world tile.
  ///
  /// Neighbors in chunks that are not resident yet are generated.
  pub fn sample_neighborhood(&mut self, center: TilePos) -> TileNeighborhood {
    let mut n = TileNeighborhood {
      center: self.get_tile(center),
      ..Default::default()
    };
    for dir in Direction::ALL {
      let (dx, dy) = dir.offset();
      *n.get_mut(dir) = self.get_tile(center.offset(dx, dy));
    }
    n
  }

  /// Samples the 3x3 neighborhood around a tile given in chunk-local terms.
  pub fn sample_local_neighborhood(&mut self, chunk: ChunkPos, local: LocalPos) -> TileNeighborhood {
    self.sample_neighborhood(chunk.tile_at(local))
  }

  /// Removes every chunk outside `bounds`, returning how many were removed.
  pub fn prune_chunks_outside(&mut self, bounds: ChunkBounds) -> usize {
    self.chunks.retain(|pos| bounds.contains(pos))
  }

  /// Returns the number of resident chunks.
  pub fn chunk_count(&self) -> usize {
    self.chunks.len()
  }

  /// Iterates resident chunks in arena order.
  pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
    self.chunks.iter()
  }
}

impl NeighborhoodSampler for TileWorld {
  /// Resident tiles come from storage, others straight from the seeder.
  fn tile(&self, tile: TilePos) -> TileId {
    match self.chunk(world_to_chunk(tile)) {
      Some(chunk) => chunk.get(world_to_local(tile)),
      None => self.seeder.tile_at(tile),
    }
  }
}
