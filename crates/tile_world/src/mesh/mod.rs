//! Chunk triangulation.
//!
//! Every non-empty tile becomes one quad of two triangles with a fixed
//! vertex order:
//!
//! ```text
//! 0 TL ---- 1 TR        triangle A: TL, TR, BR
//!   |  \      |         triangle B: TL, BR, BL
//!   |    \    |
//! 5 BL ---- 2 BR        (vertices 3 and 4 repeat TL and BR)
//! ```
//!
//! Each vertex is `[x, y, u, v]`. The order never changes between rebuilds
//! because the animated mesh patcher rewrites UVs at fixed offsets inside
//! each quad.

pub mod animation;

use crate::autotile::resolve_terrain_variant;
use crate::coords::{TILE_SIZE, TileId, TilePos};
use crate::metadata::{TileRegistry, TileRender, UvRect};
use crate::primitives::Chunk;
use crate::world::NeighborhoodSampler;

pub use animation::{AnimatedChunkMeshState, AnimatedChunkTileState};

/// Floats per vertex: position xy then uv.
pub const FLOATS_PER_VERTEX: usize = 4;

/// Vertices per tile quad.
pub const VERTICES_PER_QUAD: usize = 6;

/// Floats per tile quad.
pub const FLOATS_PER_QUAD: usize = FLOATS_PER_VERTEX * VERTICES_PER_QUAD;

/// Float offsets of the UV pairs inside one quad.
pub const QUAD_UV_OFFSETS: [usize; VERTICES_PER_QUAD] = [2, 6, 10, 14, 18, 22];

/// Which UV corner each quad vertex takes: `(use u1, use v1)`.
const QUAD_CORNERS: [(bool, bool); VERTICES_PER_QUAD] = [
  (false, false), // TL
  (true, false),  // TR
  (true, true),   // BR
  (false, false), // TL
  (true, true),   // BR
  (false, true),  // BL
];

/// Error building a chunk mesh.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshError {
  /// A non-empty tile has nothing to draw it with.
  MissingRenderMetadata { tile: TileId, pos: TilePos },
  /// Metadata points at an atlas slot outside the atlas.
  InvalidAtlasSlot { tile: TileId, slot: u32 },
}

impl std::fmt::Display for MeshError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MeshError::MissingRenderMetadata { tile, pos } => write!(
        f,
        "tile {} at ({}, {}) has no render metadata",
        tile.0, pos.x, pos.y
      ),
      MeshError::InvalidAtlasSlot { tile, slot } => {
        write!(f, "tile {} references atlas slot {} outside the atlas", tile.0, slot)
      }
    }
  }
}

impl std::error::Error for MeshError {}

/// Flat interleaved vertex buffer for one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMeshData {
  vertices: Vec<f32>,
}

impl ChunkMeshData {
  /// Interleaved `[x, y, u, v]` floats.
  pub fn vertices(&self) -> &[f32] {
    &self.vertices
  }

  pub(crate) fn vertices_mut(&mut self) -> &mut [f32] {
    &mut self.vertices
  }

  pub fn vertex_count(&self) -> usize {
    self.vertices.len() / FLOATS_PER_VERTEX
  }

  /// Returns true when the chunk produced no geometry.
  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  /// Positions as 3D points on the z = 0 plane.
  pub fn positions(&self) -> Vec<[f32; 3]> {
    self
      .vertices
      .chunks_exact(FLOATS_PER_VERTEX)
      .map(|v| [v[0], v[1], 0.0])
      .collect()
  }

  pub fn uvs(&self) -> Vec<[f32; 2]> {
    self
      .vertices
      .chunks_exact(FLOATS_PER_VERTEX)
      .map(|v| [v[2], v[3]])
      .collect()
  }

  fn push_quad(&mut self, pos: TilePos, uv: UvRect) {
    let x0 = pos.x as f32 * TILE_SIZE;
    let y0 = pos.y as f32 * TILE_SIZE;
    let x1 = x0 + TILE_SIZE;
    let y1 = y0 + TILE_SIZE;
    for (right, bottom) in QUAD_CORNERS {
      let x = if right { x1 } else { x0 };
      let y = if bottom { y1 } else { y0 };
      let u = if right { uv.u1 } else { uv.u0 };
      let v = if bottom { uv.v1 } else { uv.v0 };
      self.vertices.extend_from_slice(&[x, y, u, v]);
    }
  }
}

/// Overwrites the six UV pairs of the quad starting at `quad_offset`.
pub(crate) fn write_quad_uvs(vertices: &mut [f32], quad_offset: usize, uv: UvRect) {
  for (slot, (right, bottom)) in QUAD_UV_OFFSETS.iter().zip(QUAD_CORNERS) {
    let at = quad_offset + slot;
    vertices[at] = if right { uv.u1 } else { uv.u0 };
    vertices[at + 1] = if bottom { uv.v1 } else { uv.v0 };
  }
}

/// A quad whose tile is animated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimatedTileQuad {
  pub tile: TileId,
  /// Float offset of the quad's first vertex.
  pub vertex_offset: usize,
}

/// Output of [`build_chunk_mesh`].
#[derive(Clone, Debug, Default)]
pub struct ChunkMeshBuild {
  pub mesh: ChunkMeshData,
  pub animated: Vec<AnimatedTileQuad>,
}

/// Triangulates one chunk.
///
/// Tiles are walked in row-major order. The render source of each tile is
/// resolved with this precedence: terrain autotile table, static atlas slot,
/// direct UV rect. A non-empty tile with none of these fails the whole
/// build, even if it declares an animation.
pub fn build_chunk_mesh<S: NeighborhoodSampler + ?Sized>(
  chunk: &Chunk,
  sampler: &S,
  registry: &TileRegistry,
) -> Result<ChunkMeshBuild, MeshError> {
  let mut build = ChunkMeshBuild::default();
  let pos = chunk.pos();

  for (local, tile) in chunk.iter() {
    if tile.is_empty() {
      continue;
    }
    let world = pos.tile_at(local);
    let render = registry
      .get(tile)
      .ok_or(MeshError::MissingRenderMetadata { tile, pos: world })?;
    let uv = resolve_uv(tile, world, render, sampler, registry)?;

    if render.animation.is_some() {
      build.animated.push(AnimatedTileQuad {
        tile,
        vertex_offset: build.mesh.vertices.len(),
      });
    }
    build.mesh.push_quad(world, uv);
  }

  Ok(build)
}

fn resolve_uv<S: NeighborhoodSampler + ?Sized>(
  tile: TileId,
  world: TilePos,
  render: &TileRender,
  sampler: &S,
  registry: &TileRegistry,
) -> Result<UvRect, MeshError> {
  let atlas_slot = |slot: u32| {
    registry
      .atlas()
      .slot_uv(slot)
      .ok_or(MeshError::InvalidAtlasSlot { tile, slot })
  };

  if let Some(table) = &render.autotile {
    let variant = resolve_terrain_variant(&sampler.neighborhood(world));
    return atlas_slot(table[variant as usize]);
  }
  if let Some(slot) = render.atlas_index {
    return atlas_slot(slot);
  }
  if let Some(rect) = render.uv_rect {
    return Ok(rect);
  }
  Err(MeshError::MissingRenderMetadata { tile, pos: world })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::{CHUNK_SIZE, ChunkPos, LocalPos};
  use crate::metadata::{AtlasLayout, TileSprite, ids};
  use crate::seeding::{EmptySeeder, FlatSeeder};
  use crate::world::TileWorld;

  fn registry() -> TileRegistry {
    TileRegistry::builtin()
  }

  #[test]
  fn empty_chunk_has_no_geometry() {
    let world = TileWorld::new(EmptySeeder);
    let chunk = Chunk::new(ChunkPos::new(0, 0));
    let build = build_chunk_mesh(&chunk, &world, &registry()).unwrap();
    assert_eq!(build.mesh.vertex_count(), 0);
    assert!(build.mesh.is_empty());
    assert!(build.animated.is_empty());
  }

  #[test]
  fn single_tile_quad_layout() {
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(1, 0));
    chunk.set(LocalPos::new(2, 3), ids::STONE);

    let reg = registry();
    let build = build_chunk_mesh(&chunk, &world, &reg).unwrap();
    assert_eq!(build.mesh.vertex_count(), 6);

    let uv = reg.atlas().slot_uv(32).unwrap();
    let x0 = (CHUNK_SIZE as f32 + 2.0) * TILE_SIZE;
    let y0 = 3.0 * TILE_SIZE;
    let (x1, y1) = (x0 + TILE_SIZE, y0 + TILE_SIZE);
    #[rustfmt::skip]
    let expected = vec![
      x0, y0, uv.u0, uv.v0,
      x1, y0, uv.u1, uv.v0,
      x1, y1, uv.u1, uv.v1,
      x0, y0, uv.u0, uv.v0,
      x1, y1, uv.u1, uv.v1,
      x0, y1, uv.u0, uv.v1,
    ];
    assert_eq!(build.mesh.vertices(), expected.as_slice());
  }

  #[test]
  fn missing_metadata_fails_build() {
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    let unknown = TileId(200);
    chunk.set(LocalPos::new(0, 0), unknown);
    let err = build_chunk_mesh(&chunk, &world, &registry()).unwrap_err();
    assert!(matches!(err, MeshError::MissingRenderMetadata { tile, .. } if tile == unknown));
  }

  #[test]
  fn metadata_without_render_source_fails_build() {
    let world = TileWorld::new(EmptySeeder);
    let reg = registry().with_tile(TileId(9), TileRender::named("Ghost"));
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(5, 5), TileId(9));
    assert!(build_chunk_mesh(&chunk, &world, &reg).is_err());
  }

  #[test]
  fn out_of_atlas_slot_fails_build() {
    let world = TileWorld::new(EmptySeeder);
    let reg = TileRegistry::new(AtlasLayout::new(2, 2, 8).unwrap())
      .with_tile(TileId(1), TileRender::named("Far").with_atlas(99));
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), TileId(1));
    assert_eq!(
      build_chunk_mesh(&chunk, &world, &reg).unwrap_err(),
      MeshError::InvalidAtlasSlot {
        tile: TileId(1),
        slot: 99
      }
    );
  }

  #[test]
  fn uv_rect_is_used_directly() {
    let world = TileWorld::new(EmptySeeder);
    let reg = registry();
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), ids::BRICK);
    let build = build_chunk_mesh(&chunk, &world, &reg).unwrap();
    let rect = reg.get(ids::BRICK).and_then(|r| r.uv_rect).unwrap();
    assert_eq!(&build.mesh.vertices()[2..4], &[rect.u0, rect.v0]);
    assert_eq!(&build.mesh.vertices()[22..24], &[rect.u0, rect.v1]);
  }

  #[test]
  fn autotile_samples_across_chunk_edges() {
    // Solid dirt floor from row 0 down, spanning every chunk
    let world = TileWorld::new(FlatSeeder {
      floor: 0,
      tile: ids::DIRT,
    });
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), ids::DIRT);

    let reg = registry();
    let build = build_chunk_mesh(&chunk, &world, &reg).unwrap();
    // Neighbors come from the sampler, including the west column in chunk
    // (-1, 0): only north is open, so the variant is E | S | W
    let table = reg.get(ids::DIRT).and_then(|r| r.autotile).unwrap();
    let uv = reg.atlas().slot_uv(table[2 | 4 | 8]).unwrap();
    assert_eq!(&build.mesh.vertices()[2..4], &[uv.u0, uv.v0]);
  }

  #[test]
  fn animated_quads_are_recorded_with_offsets() {
    let world = TileWorld::new(EmptySeeder);
    let reg = registry();
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), ids::STONE);
    chunk.set(LocalPos::new(1, 0), ids::WATER);
    chunk.set(LocalPos::new(0, 1), ids::WATER);

    let build = build_chunk_mesh(&chunk, &world, &reg).unwrap();
    assert_eq!(build.mesh.vertex_count(), 18);
    assert_eq!(
      build.animated,
      vec![
        AnimatedTileQuad {
          tile: ids::WATER,
          vertex_offset: FLOATS_PER_QUAD
        },
        AnimatedTileQuad {
          tile: ids::WATER,
          vertex_offset: 2 * FLOATS_PER_QUAD
        },
      ]
    );
  }

  #[test]
  fn animation_without_base_sprite_fails() {
    let world = TileWorld::new(EmptySeeder);
    let reg = registry().with_tile(
      TileId(7),
      TileRender::named("Lava").with_animation(100, vec![TileSprite::Atlas(3), TileSprite::Atlas(4)]),
    );
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(2, 1), TileId(7));
    let err = build_chunk_mesh(&chunk, &world, &reg).unwrap_err();
    assert_eq!(
      err,
      MeshError::MissingRenderMetadata {
        tile: TileId(7),
        pos: TilePos::new(2, 1),
      }
    );
  }

  #[test]
  fn write_quad_uvs_touches_only_uvs() {
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), ids::STONE);
    let mut build = build_chunk_mesh(&chunk, &world, &registry()).unwrap();
    let before = build.mesh.positions();

    let rect = UvRect::new(0.5, 0.25, 0.75, 0.5);
    write_quad_uvs(build.mesh.vertices_mut(), 0, rect);
    assert_eq!(build.mesh.positions(), before);
    assert_eq!(
      build.mesh.uvs(),
      vec![
        [0.5, 0.25],
        [0.75, 0.25],
        [0.75, 0.5],
        [0.5, 0.25],
        [0.75, 0.5],
        [0.5, 0.5]
      ]
    );
  }
}
