//! Per-frame UV patching for animated tiles.

use bevy::log::warn;

use super::{AnimatedTileQuad, ChunkMeshData, FLOATS_PER_QUAD, write_quad_uvs};
use crate::coords::TileId;
use crate::metadata::TileRegistry;

/// An animated quad and the frame it currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimatedChunkTileState {
  pub tile: TileId,
  pub vertex_offset: usize,
  pub frame_index: usize,
}

/// Animation bookkeeping for one chunk mesh.
///
/// The vertex buffer itself stays with the mesh cache entry and is borrowed
/// mutably for the duration of each [`apply_frame_at`](Self::apply_frame_at)
/// call.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedChunkMeshState {
  tiles: Vec<AnimatedChunkTileState>,
  // Parallel to `tiles`: set once a quad failed to resolve a frame
  stalled: Vec<bool>,
}

impl AnimatedChunkMeshState {
  /// Returns `None` when the mesh has no animated quads, so static chunks
  /// carry no per-frame work.
  pub fn new(mesh: &ChunkMeshData, quads: &[AnimatedTileQuad]) -> Option<Self> {
    if quads.is_empty() {
      return None;
    }
    debug_assert!(
      quads
        .iter()
        .all(|q| q.vertex_offset + FLOATS_PER_QUAD <= mesh.vertices().len()),
      "animated quad offset past end of mesh"
    );
    Some(Self {
      tiles: quads
        .iter()
        .map(|q| AnimatedChunkTileState {
          tile: q.tile,
          vertex_offset: q.vertex_offset,
          frame_index: 0,
        })
        .collect(),
      stalled: vec![false; quads.len()],
    })
  }

  pub fn tiles(&self) -> &[AnimatedChunkTileState] {
    &self.tiles
  }

  /// Number of quads frozen because a frame could not be resolved.
  pub fn stalled_quads(&self) -> usize {
    self.stalled.iter().filter(|&&s| s).count()
  }

  /// Advances every animated quad to the frame shown at `elapsed_ms`.
  ///
  /// Quads whose frame index is unchanged are left alone. A quad whose
  /// animation or frame sprite no longer resolves keeps its current UVs and
  /// is reported with a warning the first time. Returns true if any quad
  /// was rewritten, meaning the vertex buffer needs re-uploading.
  pub fn apply_frame_at(
    &mut self,
    mesh: &mut ChunkMeshData,
    elapsed_ms: f64,
    registry: &TileRegistry,
  ) -> bool {
    let vertices = mesh.vertices_mut();
    let mut changed = false;

    for (state, stalled) in self.tiles.iter_mut().zip(&mut self.stalled) {
      let Some(animation) = registry.get(state.tile).and_then(|r| r.animation.as_ref()) else {
        mark_stalled(stalled, state, || "tile is no longer animated".into());
        continue;
      };
      let next = animation.frame_index_at(elapsed_ms);
      if next == state.frame_index {
        continue;
      }
      let Some(uv) = animation
        .frames
        .get(next)
        .and_then(|frame| registry.sprite_uv(*frame))
      else {
        mark_stalled(stalled, state, || {
          format!("frame {} is outside the atlas", next)
        });
        continue;
      };
      if state.vertex_offset + FLOATS_PER_QUAD > vertices.len() {
        mark_stalled(stalled, state, || {
          format!("mesh holds only {} floats", vertices.len())
        });
        continue;
      }

      write_quad_uvs(vertices, state.vertex_offset, uv);
      state.frame_index = next;
      changed = true;
    }

    changed
  }
}

fn mark_stalled(
  stalled: &mut bool,
  state: &AnimatedChunkTileState,
  reason: impl FnOnce() -> String,
) {
  if !std::mem::replace(stalled, true) {
    warn!(
      "Animated tile {:?} at vertex offset {} frozen on frame {}: {}",
      state.tile,
      state.vertex_offset,
      state.frame_index,
      reason()
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::{ChunkPos, LocalPos};
  use crate::mesh::{FLOATS_PER_VERTEX, QUAD_UV_OFFSETS, build_chunk_mesh};
  use crate::metadata::{AtlasLayout, TileRender, TileSprite, ids};
  use crate::primitives::Chunk;
  use crate::seeding::EmptySeeder;
  use crate::world::TileWorld;

  const TORCH: TileId = TileId(6);

  fn torch_registry() -> TileRegistry {
    TileRegistry::new(AtlasLayout::new(8, 4, 16).unwrap())
      .with_tile(ids::STONE, TileRender::named("Stone").with_atlas(1))
      .with_tile(
        TORCH,
        TileRender::named("Torch")
          .with_atlas(14)
          .with_animation(180, vec![TileSprite::Atlas(14), TileSprite::Atlas(15)]),
      )
  }

  fn torch_mesh(registry: &TileRegistry) -> (ChunkMeshData, Vec<AnimatedTileQuad>) {
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), ids::STONE);
    chunk.set(LocalPos::new(1, 0), TORCH);
    let build = build_chunk_mesh(&chunk, &world, registry).unwrap();
    (build.mesh, build.animated)
  }

  fn quad_uvs(mesh: &ChunkMeshData, quad_offset: usize) -> Vec<(f32, f32)> {
    QUAD_UV_OFFSETS
      .iter()
      .map(|o| {
        let at = quad_offset + o;
        (mesh.vertices()[at], mesh.vertices()[at + 1])
      })
      .collect()
  }

  #[test]
  fn static_mesh_has_no_state() {
    let registry = torch_registry();
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(3, 3), ids::STONE);
    let build = build_chunk_mesh(&chunk, &world, &registry).unwrap();
    assert!(AnimatedChunkMeshState::new(&build.mesh, &build.animated).is_none());
  }

  #[test]
  fn new_state_starts_at_frame_zero() {
    let registry = torch_registry();
    let (mesh, quads) = torch_mesh(&registry);
    let state = AnimatedChunkMeshState::new(&mesh, &quads).unwrap();
    assert_eq!(
      state.tiles(),
      &[AnimatedChunkTileState {
        tile: TORCH,
        vertex_offset: FLOATS_PER_QUAD,
        frame_index: 0
      }]
    );
  }

  #[test]
  fn frames_advance_on_duration_boundaries() {
    let registry = torch_registry();
    let (mut mesh, quads) = torch_mesh(&registry);
    let mut state = AnimatedChunkMeshState::new(&mesh, &quads).unwrap();
    let original = mesh.clone();

    assert!(!state.apply_frame_at(&mut mesh, 0.0, &registry));
    assert!(!state.apply_frame_at(&mut mesh, 179.0, &registry));
    assert_eq!(mesh, original, "no patch before the first boundary");

    assert!(state.apply_frame_at(&mut mesh, 180.0, &registry));
    assert_eq!(state.tiles()[0].frame_index, 1);
    let frame_15 = registry.atlas().slot_uv(15).unwrap();
    assert_eq!(
      quad_uvs(&mesh, FLOATS_PER_QUAD),
      vec![
        (frame_15.u0, frame_15.v0),
        (frame_15.u1, frame_15.v0),
        (frame_15.u1, frame_15.v1),
        (frame_15.u0, frame_15.v0),
        (frame_15.u1, frame_15.v1),
        (frame_15.u0, frame_15.v1),
      ]
    );
    // Static quad and all positions untouched
    assert_eq!(
      &mesh.vertices()[..FLOATS_PER_QUAD],
      &original.vertices()[..FLOATS_PER_QUAD]
    );
    for (a, b) in mesh
      .vertices()
      .chunks_exact(FLOATS_PER_VERTEX)
      .zip(original.vertices().chunks_exact(FLOATS_PER_VERTEX))
    {
      assert_eq!(a[..2], b[..2]);
    }

    assert!(!state.apply_frame_at(&mut mesh, 200.0, &registry));
    assert!(state.apply_frame_at(&mut mesh, 360.0, &registry));
    assert_eq!(state.tiles()[0].frame_index, 0);
    assert_eq!(mesh, original, "frame 0 restores the original UVs");
    assert_eq!(state.stalled_quads(), 0);
  }

  #[test]
  fn unresolvable_frame_freezes_quad() {
    let registry = TileRegistry::new(AtlasLayout::new(8, 4, 16).unwrap()).with_tile(
      TORCH,
      TileRender::named("Torch")
        .with_atlas(14)
        .with_animation(180, vec![TileSprite::Atlas(14), TileSprite::Atlas(999)]),
    );
    let world = TileWorld::new(EmptySeeder);
    let mut chunk = Chunk::new(ChunkPos::new(0, 0));
    chunk.set(LocalPos::new(0, 0), TORCH);
    let build = build_chunk_mesh(&chunk, &world, &registry).unwrap();
    let mut mesh = build.mesh.clone();
    let mut state = AnimatedChunkMeshState::new(&mesh, &build.animated).unwrap();

    assert!(!state.apply_frame_at(&mut mesh, 180.0, &registry));
    assert!(!state.apply_frame_at(&mut mesh, 540.0, &registry));
    assert_eq!(state.tiles()[0].frame_index, 0);
    assert_eq!(mesh, build.mesh);
    assert_eq!(state.stalled_quads(), 1);
  }
}
