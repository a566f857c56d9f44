//! Bevy plugin wiring the tile world, mesh streamer and chunk entities.
//!
//! Tile space is y-down while Bevy world space is y-up. Chunk meshes are
//! built in tile space and drawn by entities scaled `(1, -1, 1)`.

#[cfg(not(feature = "headless"))]
use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
#[cfg(not(feature = "headless"))]
use bevy::sprite_render::{ColorMaterial, MeshMaterial2d};

use crate::config::StreamingConfig;
use crate::coords::{ChunkPos, TILE_SIZE, TilePos};
use crate::diagnostics::StreamingStats;
use crate::metadata::TileRegistry;
#[cfg(not(feature = "headless"))]
use crate::render::BevyMeshBackend;
#[cfg(feature = "headless")]
use crate::render::{RecordedMesh, RecordingBackend};
use crate::seeding::TerrainSeeder;
use crate::streaming::ChunkMeshStreamer;
use crate::world::{TileEditEvent, TileWorld};

/// GPU handle stored in the streamer's cache entries.
#[cfg(not(feature = "headless"))]
pub type ChunkMeshHandle = Handle<Mesh>;
/// GPU handle stored in the streamer's cache entries.
#[cfg(feature = "headless")]
pub type ChunkMeshHandle = RecordedMesh;

/// Marker component for the camera that drives streaming.
#[derive(Component)]
pub struct StreamingCamera;

/// Entity drawing one chunk mesh.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkMeshEntity(pub ChunkPos);

/// The streamer instance owned by the app.
#[derive(Resource, Deref, DerefMut)]
pub struct TileStreamer(pub ChunkMeshStreamer<ChunkMeshHandle>);

/// Visible area used when the streaming camera has no orthographic
/// projection, in tiles.
#[derive(Resource, Clone, Copy, Debug)]
pub struct StreamingView {
  pub tiles: UVec2,
}

impl StreamingView {
  /// Camera-relative world rect covering `tiles`.
  pub fn area(&self) -> Rect {
    let half = self.tiles.as_vec2() * TILE_SIZE * 0.5;
    Rect::from_center_half_size(Vec2::ZERO, half)
  }
}

/// Atlas image path for the shared chunk material.
#[cfg(not(feature = "headless"))]
#[derive(Resource, Clone, Debug, Default)]
struct AtlasSource(Option<String>);

/// Material shared by every chunk entity.
#[cfg(not(feature = "headless"))]
#[derive(Resource)]
pub struct TileAtlasMaterial(pub Handle<ColorMaterial>);

#[cfg(not(feature = "headless"))]
#[derive(Resource, Default)]
struct ChunkEntities(HashMap<ChunkPos, (Entity, Handle<Mesh>)>);

/// Streaming tile world plugin.
///
/// # Usage
///
/// ```ignore
/// app.add_plugins(
///   TileWorldPlugin::default()
///     .with_seed(7)
///     .with_atlas("tiles/atlas.png"),
/// );
/// app.world_mut().spawn((Camera2d, StreamingCamera));
/// ```
///
/// A [`TileWorld`] or [`TileRegistry`] resource inserted before the plugin
/// is kept as is.
#[derive(Clone, Debug)]
pub struct TileWorldPlugin {
  pub streaming: StreamingConfig,
  pub registry: Option<TileRegistry>,
  pub atlas_path: Option<String>,
  pub view_tiles: UVec2,
}

impl Default for TileWorldPlugin {
  fn default() -> Self {
    Self {
      streaming: StreamingConfig::default(),
      registry: None,
      atlas_path: None,
      view_tiles: Self::DEFAULT_VIEW_TILES,
    }
  }
}

impl TileWorldPlugin {
  pub const DEFAULT_VIEW_TILES: UVec2 = UVec2::new(80, 45);

  pub fn new(streaming: StreamingConfig) -> Self {
    Self {
      streaming,
      ..Default::default()
    }
  }

  pub fn with_seed(mut self, seed: u32) -> Self {
    self.streaming.seed = seed;
    self
  }

  pub fn with_registry(mut self, registry: TileRegistry) -> Self {
    self.registry = Some(registry);
    self
  }

  pub fn with_atlas(mut self, path: impl Into<String>) -> Self {
    self.atlas_path = Some(path.into());
    self
  }

  /// Sets the fallback visible area for cameras without an orthographic
  /// projection.
  pub fn with_view_tiles(mut self, width: u32, height: u32) -> Self {
    self.view_tiles = UVec2::new(width, height);
    self
  }
}

impl Plugin for TileWorldPlugin {
  fn build(&self, app: &mut App) {
    let streaming = match self.streaming.validate() {
      Ok(()) => self.streaming.clone(),
      Err(e) => {
        error!("Invalid streaming config: {}. Using defaults.", e);
        StreamingConfig::default()
      }
    };

    if !app.world().contains_resource::<TileRegistry>() {
      app.insert_resource(self.registry.clone().unwrap_or_default());
    }
    if !app.world().contains_resource::<TileWorld>() {
      let mut world = TileWorld::new(TerrainSeeder::new(streaming.seed));
      world.seed_radius(ChunkPos::new(0, 0), streaming.seed_radius);
      app.insert_resource(world);
    }

    app
      .insert_resource(TileStreamer(ChunkMeshStreamer::new(streaming.clone())))
      .insert_resource(StreamingView {
        tiles: self.view_tiles,
      })
      .init_resource::<StreamingStats>()
      .add_message::<TileEditEvent>();

    #[cfg(not(feature = "headless"))]
    app
      .insert_resource(AtlasSource(self.atlas_path.clone()))
      .init_resource::<ChunkEntities>()
      .add_systems(Startup, setup_atlas_material)
      .add_systems(Update, (tick_streaming, sync_chunk_entities).chain());

    #[cfg(feature = "headless")]
    app
      .init_resource::<RecordingBackend>()
      .add_systems(Update, tick_streaming);

    info!(
      "Tile world streaming: seed {}, {} builds/frame, {:.1}ms budget",
      streaming.seed, streaming.builds_per_frame, streaming.build_budget_ms
    );
    app.insert_resource(streaming);
  }
}

/// Inclusive tile rectangle visible from a camera at `center` whose
/// camera-relative view is `area`, both in Bevy world units.
pub fn visible_tile_rect(center: Vec2, area: Rect) -> (TilePos, TilePos) {
  let min = center + area.min;
  let max = center + area.max;
  let to_tile = |v: f32| (v / TILE_SIZE).floor() as i32;
  // Flip y into tile space
  (
    TilePos::new(to_tile(min.x), to_tile(-max.y)),
    TilePos::new(to_tile(max.x), to_tile(-min.y)),
  )
}

/// System: Forwards edits, then streams, builds and animates chunk meshes.
#[allow(clippy::too_many_arguments)]
fn tick_streaming(
  camera: Query<(&GlobalTransform, Option<&Projection>), With<StreamingCamera>>,
  view: Res<StreamingView>,
  time: Res<Time>,
  registry: Res<TileRegistry>,
  mut world: ResMut<TileWorld>,
  mut streamer: ResMut<TileStreamer>,
  mut stats: ResMut<StreamingStats>,
  mut edit_messages: MessageWriter<TileEditEvent>,
  #[cfg(not(feature = "headless"))] mut meshes: ResMut<Assets<Mesh>>,
  #[cfg(feature = "headless")] mut backend: ResMut<RecordingBackend>,
) {
  let Ok((transform, projection)) = camera.single() else {
    return;
  };
  let area = match projection {
    Some(Projection::Orthographic(ortho)) => ortho.area,
    _ => view.area(),
  };
  let (min_tile, max_tile) = visible_tile_rect(transform.translation().truncate(), area);

  #[cfg(not(feature = "headless"))]
  let backend = &mut BevyMeshBackend::new(&mut meshes);
  #[cfg(feature = "headless")]
  let backend = &mut *backend;

  let edits = world.drain_edits();
  for event in &edits {
    streamer.handle_tile_edit(event, backend);
  }
  edit_messages.write_batch(edits.iter().copied());

  let elapsed_ms = time.elapsed_secs_f64() * 1000.0;
  match streamer.tick(min_tile, max_tile, &mut world, &registry, backend, elapsed_ms) {
    Ok(mut report) => {
      report.edits += edits.len() as u32;
      let (cached, queued) = (streamer.len(), streamer.queue_len());
      stats.record(&report, cached, queued);
    }
    Err(e) => warn!("Skipping streaming frame: {}", e),
  }
}

#[cfg(not(feature = "headless"))]
fn setup_atlas_material(
  mut commands: Commands,
  source: Res<AtlasSource>,
  assets: Option<Res<AssetServer>>,
  mut materials: ResMut<Assets<ColorMaterial>>,
) {
  let texture = match (&source.0, assets) {
    (Some(path), Some(assets)) => Some(assets.load(path.clone())),
    (Some(path), None) => {
      warn!("No AssetServer, tile atlas {:?} not loaded", path);
      None
    }
    (None, _) => None,
  };
  let material = materials.add(ColorMaterial {
    texture,
    ..default()
  });
  commands.insert_resource(TileAtlasMaterial(material));
}

/// System: Spawns, updates and despawns one entity per drawable chunk.
#[cfg(not(feature = "headless"))]
fn sync_chunk_entities(
  mut commands: Commands,
  streamer: Res<TileStreamer>,
  material: Option<Res<TileAtlasMaterial>>,
  mut spawned: ResMut<ChunkEntities>,
) {
  let Some(material) = material else {
    return;
  };

  let mut live = HashSet::new();
  for (pos, handle) in streamer.drawable() {
    live.insert(pos);
    if let Some((entity, current)) = spawned.0.get(&pos) {
      if current == handle {
        continue;
      }
      // Rebuilt mesh: respawn so bounds are recomputed
      commands.entity(*entity).despawn();
    }
    let entity = commands
      .spawn((
        ChunkMeshEntity(pos),
        Mesh2d(handle.clone()),
        MeshMaterial2d(material.0.clone()),
        Transform::from_scale(Vec3::new(1.0, -1.0, 1.0)),
      ))
      .id();
    spawned.0.insert(pos, (entity, handle.clone()));
  }

  spawned.0.retain(|pos, (entity, _)| {
    if live.contains(pos) {
      return true;
    }
    commands.entity(*entity).despawn();
    false
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_at_origin_straddles_chunk_zero() {
    let view = StreamingView {
      tiles: UVec2::new(4, 2),
    };
    let (min, max) = visible_tile_rect(Vec2::ZERO, view.area());
    assert_eq!(min, TilePos::new(-2, -1));
    assert_eq!(max, TilePos::new(2, 1));
  }

  #[test]
  fn camera_moving_up_reveals_negative_tile_rows() {
    let area = Rect::from_center_half_size(Vec2::ZERO, Vec2::splat(TILE_SIZE));
    let (min, max) = visible_tile_rect(Vec2::new(0.0, 10.0 * TILE_SIZE), area);
    assert_eq!(min.y, -11);
    assert_eq!(max.y, -9);
  }
}
