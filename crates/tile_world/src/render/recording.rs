//! In-memory backend for headless runs and tests.

use std::collections::HashMap;

use super::MeshBackend;
use crate::mesh::ChunkMeshData;

/// Handle issued by [`RecordingBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordedMesh(pub u64);

/// A mesh held by the recording backend.
#[derive(Clone, Debug)]
pub struct RecordedBuffer {
  pub data: ChunkMeshData,
  pub dynamic: bool,
  pub uploads: u32,
}

/// Backend that keeps meshes in a map and counts traffic.
#[derive(bevy::prelude::Resource, Default, Debug)]
pub struct RecordingBackend {
  next_id: u64,
  live: HashMap<RecordedMesh, RecordedBuffer>,
  /// Total buffer creations.
  pub created: u32,
  /// Total dynamic buffer re-uploads.
  pub updated: u32,
  /// Total releases.
  pub released: u32,
}

impl RecordingBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of meshes created and not yet released.
  pub fn live_count(&self) -> usize {
    self.live.len()
  }

  pub fn get(&self, handle: RecordedMesh) -> Option<&RecordedBuffer> {
    self.live.get(&handle)
  }

  fn create(&mut self, mesh: &ChunkMeshData, dynamic: bool) -> RecordedMesh {
    let handle = RecordedMesh(self.next_id);
    self.next_id += 1;
    self.created += 1;
    self.live.insert(
      handle,
      RecordedBuffer {
        data: mesh.clone(),
        dynamic,
        uploads: 1,
      },
    );
    handle
  }
}

impl MeshBackend for RecordingBackend {
  type Handle = RecordedMesh;

  fn create_static(&mut self, mesh: &ChunkMeshData) -> RecordedMesh {
    self.create(mesh, false)
  }

  fn create_dynamic(&mut self, mesh: &ChunkMeshData) -> RecordedMesh {
    self.create(mesh, true)
  }

  fn update_vertices(&mut self, handle: &RecordedMesh, mesh: &ChunkMeshData) {
    if let Some(buffer) = self.live.get_mut(handle) {
      buffer.data.clone_from(mesh);
      buffer.uploads += 1;
      self.updated += 1;
    }
  }

  fn release(&mut self, handle: RecordedMesh) {
    if self.live.remove(&handle).is_some() {
      self.released += 1;
    }
  }
}
