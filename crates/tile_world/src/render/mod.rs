//! GPU mesh resources for built chunk meshes.
//!
//! The streamer never talks to the GPU directly. It hands vertex buffers to a
//! [`MeshBackend`] and stores whatever handle comes back in the chunk's cache
//! entry, which owns it until release.

#[cfg(not(feature = "headless"))]
mod bevy_backend;
mod recording;

#[cfg(not(feature = "headless"))]
pub use bevy_backend::{BevyMeshBackend, create_chunk_mesh};
pub use recording::{RecordedBuffer, RecordedMesh, RecordingBackend};

use crate::mesh::ChunkMeshData;

/// Creates, updates and releases GPU meshes.
pub trait MeshBackend {
  /// Owned reference to one GPU mesh.
  type Handle: Clone;

  /// Uploads a mesh that will never change.
  fn create_static(&mut self, mesh: &ChunkMeshData) -> Self::Handle;

  /// Uploads a mesh whose UVs are rewritten by animation.
  fn create_dynamic(&mut self, mesh: &ChunkMeshData) -> Self::Handle;

  /// Re-uploads vertex data of a dynamic mesh.
  fn update_vertices(&mut self, handle: &Self::Handle, mesh: &ChunkMeshData);

  /// Frees the GPU mesh.
  fn release(&mut self, handle: Self::Handle);
}
