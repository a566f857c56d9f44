//! Mesh backend over Bevy's `Assets<Mesh>`.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::PrimitiveTopology;
use bevy::prelude::*;

use super::MeshBackend;
use crate::mesh::ChunkMeshData;

/// Builds a triangle-list mesh from interleaved chunk vertices.
///
/// Positions are in world tile space with rows growing downward; the chunk
/// entity flips Y so row 0 is drawn at the top.
pub fn create_chunk_mesh(data: &ChunkMeshData, usage: RenderAssetUsages) -> Mesh {
  Mesh::new(PrimitiveTopology::TriangleList, usage)
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, data.positions())
    .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, data.uvs())
}

/// [`MeshBackend`] that stores chunk meshes as Bevy assets.
pub struct BevyMeshBackend<'a> {
  meshes: &'a mut Assets<Mesh>,
}

impl<'a> BevyMeshBackend<'a> {
  pub fn new(meshes: &'a mut Assets<Mesh>) -> Self {
    Self { meshes }
  }
}

impl MeshBackend for BevyMeshBackend<'_> {
  type Handle = Handle<Mesh>;

  fn create_static(&mut self, mesh: &ChunkMeshData) -> Handle<Mesh> {
    // Static meshes are never read back, keep them render-side only
    self
      .meshes
      .add(create_chunk_mesh(mesh, RenderAssetUsages::RENDER_WORLD))
  }

  fn create_dynamic(&mut self, mesh: &ChunkMeshData) -> Handle<Mesh> {
    self.meshes.add(create_chunk_mesh(
      mesh,
      RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    ))
  }

  fn update_vertices(&mut self, handle: &Handle<Mesh>, mesh: &ChunkMeshData) {
    // Positions never change after a build, only UVs are re-sent
    if let Some(asset) = self.meshes.get_mut(handle) {
      asset.insert_attribute(Mesh::ATTRIBUTE_UV_0, mesh.uvs());
    }
  }

  fn release(&mut self, handle: Handle<Mesh>) {
    self.meshes.remove(&handle);
  }
}
