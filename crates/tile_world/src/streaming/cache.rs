//! Per-chunk mesh cache entries.

use crate::coords::ChunkPos;
use crate::mesh::{AnimatedChunkMeshState, ChunkMeshData, MeshError};

/// Lifecycle of a cached chunk mesh.
///
/// `Queued` moves to `Ready` or `Empty` once built. Edits send `Ready` and
/// `Empty` back to `Queued`. Any state may be evicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshState {
  /// Waiting in the build queue.
  Queued,
  /// Built with geometry and a GPU handle.
  Ready,
  /// Built with no geometry, or the build failed.
  Empty,
}

/// Cached mesh for one chunk.
///
/// The entry exclusively owns its CPU vertex buffer and its GPU handle.
#[derive(Debug)]
pub struct MeshCacheEntry<H> {
  pub(crate) pos: ChunkPos,
  pub(crate) state: MeshState,
  pub(crate) mesh: Option<ChunkMeshData>,
  pub(crate) handle: Option<H>,
  pub(crate) animation: Option<AnimatedChunkMeshState>,
  pub(crate) error: Option<MeshError>,
}

impl<H> MeshCacheEntry<H> {
  pub(crate) fn queued(pos: ChunkPos) -> Self {
    Self {
      pos,
      state: MeshState::Queued,
      mesh: None,
      handle: None,
      animation: None,
      error: None,
    }
  }

  pub fn pos(&self) -> ChunkPos {
    self.pos
  }

  pub fn state(&self) -> MeshState {
    self.state
  }

  /// CPU copy of the built vertices, present while `Ready`.
  pub fn mesh(&self) -> Option<&ChunkMeshData> {
    self.mesh.as_ref()
  }

  pub fn handle(&self) -> Option<&H> {
    self.handle.as_ref()
  }

  pub fn animation(&self) -> Option<&AnimatedChunkMeshState> {
    self.animation.as_ref()
  }

  /// Error of the last failed build.
  pub fn error(&self) -> Option<&MeshError> {
    self.error.as_ref()
  }

  pub fn vertex_count(&self) -> usize {
    self.mesh.as_ref().map_or(0, ChunkMeshData::vertex_count)
  }

  pub fn is_animated(&self) -> bool {
    self.animation.is_some()
  }

  /// Drops built data and returns the GPU handle for release.
  pub(crate) fn invalidate(&mut self) -> Option<H> {
    self.state = MeshState::Queued;
    self.mesh = None;
    self.animation = None;
    self.error = None;
    self.handle.take()
  }
}
