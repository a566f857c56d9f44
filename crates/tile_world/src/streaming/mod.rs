//! Streaming mesh cache and build scheduler.
//!
//! Each frame the streamer derives draw and retain bounds from the visible
//! tile rectangle, queues builds for uncached chunks, builds a bounded number
//! of meshes, then evicts everything outside the retain bounds.
//!
//! Build work is amortized across frames instead of threads: at most
//! `builds_per_frame` meshes are built per call, and building stops early
//! once `build_budget_ms` of wall time has passed. The first build always
//! runs so the queue makes progress every frame.

mod cache;
mod queue;

use std::collections::HashMap;
use std::time::Duration;

use bevy::log::{debug, warn};
// WASM compat
use web_time::Instant;

pub use cache::{MeshCacheEntry, MeshState};
pub use queue::{BuildPriority, BuildQueue, MeshBuildRequest};

use crate::config::StreamingConfig;
use crate::coords::{BoundsError, ChunkBounds, ChunkPos, TilePos, affected_chunks_for_local_edit};
use crate::mesh::{AnimatedChunkMeshState, build_chunk_mesh};
use crate::metadata::TileRegistry;
use crate::render::MeshBackend;
use crate::world::{TileEditEvent, TileWorld};

/// Outcome of one [`ChunkMeshStreamer::process_build_queue`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuildReport {
  /// Chunks that became `Ready`.
  pub built: u32,
  /// Chunks that built with no geometry.
  pub empty: u32,
  /// Chunks whose build failed.
  pub failed: u32,
  /// Wall time spent building.
  pub elapsed_ms: f32,
}

impl BuildReport {
  /// Builds attempted this frame.
  pub fn attempted(&self) -> u32 {
    self.built + self.empty + self.failed
  }
}

/// Outcome of one [`ChunkMeshStreamer::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
  /// Edits consumed from the world.
  pub edits: u32,
  /// Chunks newly queued by scheduling.
  pub queued: u32,
  pub builds: BuildReport,
  /// Cache entries evicted.
  pub evicted: u32,
  /// Chunks pruned from the world.
  pub pruned_chunks: u32,
  /// Animated meshes re-uploaded.
  pub uploads: u32,
}

/// Chunk mesh cache plus the queue that fills it.
///
/// `H` is the GPU handle type of the [`MeshBackend`] in use.
pub struct ChunkMeshStreamer<H> {
  entries: HashMap<ChunkPos, MeshCacheEntry<H>>,
  queue: BuildQueue,
  config: StreamingConfig,
  draw_bounds: Option<ChunkBounds>,
  retain_bounds: Option<ChunkBounds>,
}

impl<H> ChunkMeshStreamer<H> {
  /// Creates an empty streamer.
  ///
  /// An invalid config is clamped so every frame still builds at least one
  /// mesh: `builds_per_frame` rises to 1 and a negative or non-finite
  /// `build_budget_ms` becomes 0.
  pub fn new(mut config: StreamingConfig) -> Self {
    if let Err(e) = config.validate() {
      warn!("Invalid streaming config: {}. Clamping.", e);
      config.builds_per_frame = config.builds_per_frame.max(1);
      if !config.build_budget_ms.is_finite() || config.build_budget_ms < 0.0 {
        config.build_budget_ms = 0.0;
      }
    }
    Self {
      entries: HashMap::new(),
      queue: BuildQueue::new(),
      config,
      draw_bounds: None,
      retain_bounds: None,
    }
  }

  pub fn config(&self) -> &StreamingConfig {
    &self.config
  }

  /// Derives draw and retain bounds from the visible tile rectangle.
  ///
  /// Draw bounds cover every chunk touching the rectangle plus
  /// `draw_padding`; retain bounds add `retain_padding` on top.
  pub fn update_bounds(
    &mut self,
    min_tile: TilePos,
    max_tile: TilePos,
  ) -> Result<(ChunkBounds, ChunkBounds), BoundsError> {
    let visible = ChunkBounds::from_tile_rect(min_tile, max_tile)?;
    let draw = visible.expand(self.config.draw_padding as i32);
    let retain = draw.expand(self.config.retain_padding as i32);
    self.draw_bounds = Some(draw);
    self.retain_bounds = Some(retain);
    Ok((draw, retain))
  }

  pub fn draw_bounds(&self) -> Option<ChunkBounds> {
    self.draw_bounds
  }

  pub fn retain_bounds(&self) -> Option<ChunkBounds> {
    self.retain_bounds
  }

  /// Queues uncached chunks.
  ///
  /// Chunks in `draw` go to the visible lane, promoting any that were
  /// already waiting as prefetch. Chunks only in `retain` go to the
  /// prefetch lane. Returns how many entries were created.
  pub fn schedule_mesh_builds(&mut self, draw: ChunkBounds, retain: ChunkBounds) -> u32 {
    let mut created = 0;
    for pos in draw.positions() {
      match self.entries.get(&pos).map(MeshCacheEntry::state) {
        None => {
          self.entries.insert(pos, MeshCacheEntry::queued(pos));
          self.queue.enqueue(pos, BuildPriority::Visible);
          created += 1;
        }
        Some(MeshState::Queued) => {
          self.queue.enqueue(pos, BuildPriority::Visible);
        }
        Some(_) => {}
      }
    }
    for pos in retain.positions() {
      if draw.contains(pos) || self.entries.contains_key(&pos) {
        continue;
      }
      self.entries.insert(pos, MeshCacheEntry::queued(pos));
      self.queue.enqueue(pos, BuildPriority::Prefetch);
      created += 1;
    }
    created
  }

  /// Builds queued meshes within the frame budget.
  ///
  /// A failed build marks the chunk `Empty` with the error kept on the
  /// entry. It is not retried until an edit touches the chunk again.
  pub fn process_build_queue<B>(
    &mut self,
    world: &mut TileWorld,
    registry: &TileRegistry,
    backend: &mut B,
  ) -> BuildReport
  where
    B: MeshBackend<Handle = H>,
  {
    let start = Instant::now();
    let budget = Duration::from_secs_f32(self.config.build_budget_ms / 1000.0);
    let mut report = BuildReport::default();

    while report.attempted() < self.config.builds_per_frame {
      if report.attempted() > 0 && start.elapsed() >= budget {
        break;
      }
      let Some(request) = self.queue.pop() else {
        break;
      };
      let Some(entry) = self.entries.get_mut(&request.pos) else {
        continue;
      };
      if entry.state != MeshState::Queued {
        continue;
      }

      world.ensure_chunk(request.pos);
      let Some(chunk) = world.chunk(request.pos) else {
        continue;
      };

      match build_chunk_mesh(chunk, &*world, registry) {
        Ok(build) if build.mesh.is_empty() => {
          entry.state = MeshState::Empty;
          report.empty += 1;
        }
        Ok(build) => {
          let animation = AnimatedChunkMeshState::new(&build.mesh, &build.animated);
          let handle = if animation.is_some() {
            backend.create_dynamic(&build.mesh)
          } else {
            backend.create_static(&build.mesh)
          };
          entry.state = MeshState::Ready;
          entry.handle = Some(handle);
          entry.animation = animation;
          entry.mesh = Some(build.mesh);
          report.built += 1;
        }
        Err(err) => {
          warn!("Chunk {:?} mesh build failed: {}", request.pos, err);
          entry.state = MeshState::Empty;
          entry.error = Some(err);
          report.failed += 1;
        }
      }
    }

    report.elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
    if report.attempted() > 0 {
      debug!(
        "Built {} chunk meshes ({} empty, {} failed) in {:.2}ms, {} queued",
        report.built,
        report.empty,
        report.failed,
        report.elapsed_ms,
        self.queue.len()
      );
    }
    report
  }

  /// Invalidates meshes affected by a tile edit.
  ///
  /// Built chunks release their GPU mesh. Every affected cached chunk then
  /// moves to the head of the queue, ahead of cold builds. Uncached chunks
  /// are left alone since they build fresh when next requested.
  pub fn handle_tile_edit<B>(&mut self, event: &TileEditEvent, backend: &mut B)
  where
    B: MeshBackend<Handle = H>,
  {
    for pos in affected_chunks_for_local_edit(event.chunk, event.local) {
      let Some(entry) = self.entries.get_mut(&pos) else {
        continue;
      };
      if entry.state != MeshState::Queued
        && let Some(handle) = entry.invalidate()
      {
        backend.release(handle);
      }
      self.queue.promote_front(pos);
    }
  }

  /// Evicts every cache entry outside `retain` and prunes the world to match.
  ///
  /// Returns `(evicted entries, pruned chunks)`.
  pub fn prune_streaming_caches<B>(
    &mut self,
    retain: ChunkBounds,
    world: &mut TileWorld,
    backend: &mut B,
  ) -> (usize, usize)
  where
    B: MeshBackend<Handle = H>,
  {
    let before = self.entries.len();
    self.entries.retain(|pos, entry| {
      if retain.contains(*pos) {
        return true;
      }
      if let Some(handle) = entry.handle.take() {
        backend.release(handle);
      }
      false
    });
    let evicted = before - self.entries.len();

    let entries = &self.entries;
    self
      .queue
      .retain(|pos| retain.contains(pos) && entries.contains_key(&pos));

    let pruned = world.prune_chunks_outside(retain);
    if evicted > 0 || pruned > 0 {
      debug!("Evicted {} chunk meshes, pruned {} chunks", evicted, pruned);
    }
    (evicted, pruned)
  }

  /// Ready meshes inside the draw bounds, sorted by chunk position.
  pub fn drawable(&self) -> Vec<(ChunkPos, &H)> {
    let Some(draw) = self.draw_bounds else {
      return Vec::new();
    };
    let mut ready: Vec<_> = self
      .entries
      .values()
      .filter(|e| e.state == MeshState::Ready && draw.contains(e.pos))
      .filter_map(|e| e.handle.as_ref().map(|h| (e.pos, h)))
      .collect();
    ready.sort_by_key(|(pos, _)| *pos);
    ready
  }

  /// Advances animated meshes inside the draw bounds.
  ///
  /// Only meshes whose frame actually changed are re-uploaded. Returns the
  /// number of uploads.
  pub fn animate<B>(&mut self, elapsed_ms: f64, registry: &TileRegistry, backend: &mut B) -> u32
  where
    B: MeshBackend<Handle = H>,
  {
    let Some(draw) = self.draw_bounds else {
      return 0;
    };
    let mut uploads = 0;
    for entry in self.entries.values_mut() {
      if entry.state != MeshState::Ready || !draw.contains(entry.pos) {
        continue;
      }
      let MeshCacheEntry {
        animation: Some(animation),
        mesh: Some(mesh),
        handle: Some(handle),
        ..
      } = entry
      else {
        continue;
      };
      if animation.apply_frame_at(mesh, elapsed_ms, registry) {
        backend.update_vertices(handle, mesh);
        uploads += 1;
      }
    }
    uploads
  }

  /// Runs one full frame: edits, scheduling, builds, eviction, animation.
  pub fn tick<B>(
    &mut self,
    min_tile: TilePos,
    max_tile: TilePos,
    world: &mut TileWorld,
    registry: &TileRegistry,
    backend: &mut B,
    elapsed_ms: f64,
  ) -> Result<FrameReport, BoundsError>
  where
    B: MeshBackend<Handle = H>,
  {
    let mut report = FrameReport::default();

    for event in world.drain_edits() {
      self.handle_tile_edit(&event, backend);
      report.edits += 1;
    }

    let (draw, retain) = self.update_bounds(min_tile, max_tile)?;
    report.queued = self.schedule_mesh_builds(draw, retain);
    report.builds = self.process_build_queue(world, registry, backend);

    let (evicted, pruned) = self.prune_streaming_caches(retain, world, backend);
    report.evicted = evicted as u32;
    report.pruned_chunks = pruned as u32;

    report.uploads = self.animate(elapsed_ms, registry, backend);
    Ok(report)
  }

  pub fn entry(&self, pos: ChunkPos) -> Option<&MeshCacheEntry<H>> {
    self.entries.get(&pos)
  }

  pub fn entries(&self) -> impl Iterator<Item = &MeshCacheEntry<H>> {
    self.entries.values()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn queue(&self) -> &BuildQueue {
    &self.queue
  }

  pub fn queue_len(&self) -> usize {
    self.queue.len()
  }

  /// True when nothing is waiting to be built.
  pub fn is_idle(&self) -> bool {
    self.queue.is_empty()
  }

  /// Releases every GPU mesh and forgets all entries.
  pub fn clear<B>(&mut self, backend: &mut B)
  where
    B: MeshBackend<Handle = H>,
  {
    for (_, entry) in self.entries.drain() {
      if let Some(handle) = entry.handle {
        backend.release(handle);
      }
    }
    self.queue.clear();
    self.draw_bounds = None;
    self.retain_bounds = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::{CHUNK_SIZE, LocalPos, TileId};
  use crate::metadata::ids;
  use crate::render::{RecordedMesh, RecordingBackend};
  use crate::seeding::FlatSeeder;

  const C: i32 = CHUNK_SIZE as i32;

  fn config() -> StreamingConfig {
    StreamingConfig {
      draw_padding: 0,
      retain_padding: 1,
      build_budget_ms: 1000.0,
      ..Default::default()
    }
  }

  fn stone_world() -> TileWorld {
    TileWorld::new(FlatSeeder {
      floor: 0,
      tile: ids::STONE,
    })
  }

  fn single_chunk() -> (TilePos, TilePos) {
    (TilePos::new(0, 0), TilePos::new(C - 1, C - 1))
  }

  #[test]
  fn bounds_are_padded_twice() {
    let mut streamer = ChunkMeshStreamer::<RecordedMesh>::new(StreamingConfig::default());
    let (draw, retain) = streamer
      .update_bounds(TilePos::new(0, 0), TilePos::new(C, 1))
      .unwrap();
    assert_eq!(draw.min(), ChunkPos::new(-1, -1));
    assert_eq!(draw.max(), ChunkPos::new(2, 1));
    assert_eq!(retain.min(), ChunkPos::new(-3, -3));
    assert_eq!(retain.max(), ChunkPos::new(4, 3));
  }

  #[test]
  fn inverted_rect_is_rejected() {
    let mut streamer = ChunkMeshStreamer::<RecordedMesh>::new(config());
    assert!(
      streamer
        .update_bounds(TilePos::new(5, 0), TilePos::new(0, 0))
        .is_err()
    );
    assert!(streamer.draw_bounds().is_none());
  }

  #[test]
  fn schedule_splits_visible_and_prefetch() {
    let mut streamer = ChunkMeshStreamer::<RecordedMesh>::new(config());
    let (min, max) = single_chunk();
    let (draw, retain) = streamer.update_bounds(min, max).unwrap();
    assert_eq!(streamer.schedule_mesh_builds(draw, retain), 9);

    let first = streamer.queue().iter().next().unwrap();
    assert_eq!(first.pos, ChunkPos::new(0, 0));
    assert_eq!(first.priority, BuildPriority::Visible);
    assert_eq!(
      streamer
        .queue()
        .iter()
        .filter(|r| r.priority == BuildPriority::Prefetch)
        .count(),
      8
    );

    // Rescheduling is a no-op
    assert_eq!(streamer.schedule_mesh_builds(draw, retain), 0);
    assert_eq!(streamer.queue_len(), 9);
  }

  #[test]
  fn count_budget_caps_builds() {
    let mut streamer = ChunkMeshStreamer::new(config().with_builds_per_frame(2));
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = single_chunk();
    let (draw, retain) = streamer.update_bounds(min, max).unwrap();
    streamer.schedule_mesh_builds(draw, retain);

    let report = streamer.process_build_queue(&mut world, &registry, &mut backend);
    assert_eq!(report.attempted(), 2);
    assert_eq!(streamer.queue_len(), 7);
  }

  #[test]
  fn exhausted_time_budget_still_builds_one() {
    let mut streamer = ChunkMeshStreamer::new(config().with_build_budget_ms(0.0));
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = single_chunk();
    let (draw, retain) = streamer.update_bounds(min, max).unwrap();
    streamer.schedule_mesh_builds(draw, retain);

    let report = streamer.process_build_queue(&mut world, &registry, &mut backend);
    assert_eq!(report.attempted(), 1);
    assert_eq!(
      streamer.entry(ChunkPos::new(0, 0)).map(MeshCacheEntry::state),
      Some(MeshState::Ready)
    );
  }

  #[test]
  fn air_chunk_becomes_empty_without_gpu_mesh() {
    let mut streamer = ChunkMeshStreamer::new(config());
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    // Rows above y = 0 are air
    let (draw, retain) = streamer
      .update_bounds(TilePos::new(0, -C), TilePos::new(C - 1, -1))
      .unwrap();
    streamer.schedule_mesh_builds(draw, retain);
    streamer.process_build_queue(&mut world, &registry, &mut backend);

    let entry = streamer.entry(ChunkPos::new(0, -1)).unwrap();
    assert_eq!(entry.state(), MeshState::Empty);
    assert_eq!(entry.vertex_count(), 0);
    assert!(entry.handle().is_none());
    assert!(entry.error().is_none());
  }

  #[test]
  fn failed_build_is_empty_with_error() {
    let mut streamer = ChunkMeshStreamer::new(config().with_builds_per_frame(16));
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    world.set_tile(TilePos::new(3, 3), TileId(250));
    world.drain_edits();

    let (min, max) = single_chunk();
    let (draw, retain) = streamer.update_bounds(min, max).unwrap();
    streamer.schedule_mesh_builds(draw, retain);
    let report = streamer.process_build_queue(&mut world, &registry, &mut backend);
    assert_eq!(report.failed, 1);

    let entry = streamer.entry(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(entry.state(), MeshState::Empty);
    assert!(entry.error().is_some());
    assert!(entry.handle().is_none());
    // Other chunks still built
    assert_eq!(
      streamer.entry(ChunkPos::new(1, 0)).map(MeshCacheEntry::state),
      Some(MeshState::Ready)
    );
  }

  #[test]
  fn edit_requeues_failed_chunk() {
    let mut streamer = ChunkMeshStreamer::new(config());
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let bad = TilePos::new(3, 3);
    world.set_tile(bad, TileId(250));
    world.drain_edits();

    let (min, max) = single_chunk();
    streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    assert!(streamer.entry(ChunkPos::new(0, 0)).unwrap().error().is_some());

    world.set_tile(bad, ids::STONE);
    streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    let entry = streamer.entry(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(entry.state(), MeshState::Ready);
    assert!(entry.error().is_none());
  }

  #[test]
  fn edit_on_queued_chunk_only_promotes() {
    let mut streamer = ChunkMeshStreamer::<RecordedMesh>::new(config());
    let mut backend = RecordingBackend::new();
    let (min, max) = single_chunk();
    let (draw, retain) = streamer.update_bounds(min, max).unwrap();
    streamer.schedule_mesh_builds(draw, retain);

    let prefetch = ChunkPos::new(1, 1);
    assert_eq!(
      streamer.queue().priority_of(prefetch),
      Some(BuildPriority::Prefetch)
    );
    let event = TileEditEvent {
      tile: prefetch.tile_at(LocalPos::new(5, 5)),
      chunk: prefetch,
      local: LocalPos::new(5, 5),
      previous: ids::STONE,
      tile_id: ids::BRICK,
    };
    streamer.handle_tile_edit(&event, &mut backend);
    assert_eq!(
      streamer.queue().priority_of(prefetch),
      Some(BuildPriority::Visible)
    );
    assert_eq!(streamer.queue().iter().next().map(|r| r.pos), Some(prefetch));
    assert_eq!(streamer.queue_len(), 9);
    assert_eq!(backend.released, 0);
  }

  #[test]
  fn edited_chunk_rebuilds_before_cold_chunks() {
    let config = StreamingConfig {
      draw_padding: 0,
      retain_padding: 0,
      builds_per_frame: 1,
      build_budget_ms: 1000.0,
      ..Default::default()
    };
    let mut streamer = ChunkMeshStreamer::new(config);
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = (TilePos::new(-C, 0), TilePos::new(2 * C - 1, C - 1));

    let left = ChunkPos::new(-1, 0);
    streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    assert_eq!(streamer.entry(left).map(MeshCacheEntry::state), Some(MeshState::Ready));

    assert!(world.set_tile(TilePos::new(-C / 2, C / 2), ids::BRICK));
    let report = streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    assert_eq!(report.builds.built, 1);
    assert_eq!(streamer.entry(left).map(MeshCacheEntry::state), Some(MeshState::Ready));
    assert_eq!(
      streamer.entry(ChunkPos::new(0, 0)).map(MeshCacheEntry::state),
      Some(MeshState::Queued)
    );
    assert_eq!(backend.released, 1);
    assert_eq!(backend.created, 2);
  }

  #[test]
  fn zero_build_budget_is_clamped_to_one() {
    let mut streamer = ChunkMeshStreamer::new(
      config()
        .with_builds_per_frame(0)
        .with_build_budget_ms(f32::NAN),
    );
    assert_eq!(streamer.config().builds_per_frame, 1);
    assert_eq!(streamer.config().build_budget_ms, 0.0);

    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = single_chunk();
    let report = streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    assert_eq!(report.builds.attempted(), 1);
    assert_eq!(
      streamer.entry(ChunkPos::new(0, 0)).map(MeshCacheEntry::state),
      Some(MeshState::Ready)
    );
  }

  #[test]
  fn drawable_is_sorted_and_clipped_to_draw_bounds() {
    let mut streamer = ChunkMeshStreamer::new(config().with_builds_per_frame(32));
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = (TilePos::new(0, 0), TilePos::new(2 * C - 1, C - 1));
    streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();

    let drawn: Vec<ChunkPos> = streamer.drawable().into_iter().map(|(p, _)| p).collect();
    assert_eq!(drawn, vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
    // Prefetched neighbors below are ready but not drawn
    assert_eq!(
      streamer.entry(ChunkPos::new(0, 1)).map(MeshCacheEntry::state),
      Some(MeshState::Ready)
    );
  }

  #[test]
  fn clear_releases_everything() {
    let mut streamer = ChunkMeshStreamer::new(config().with_builds_per_frame(32));
    let mut world = stone_world();
    let registry = TileRegistry::builtin();
    let mut backend = RecordingBackend::new();
    let (min, max) = single_chunk();
    streamer
      .tick(min, max, &mut world, &registry, &mut backend, 0.0)
      .unwrap();
    assert!(backend.live_count() > 0);

    streamer.clear(&mut backend);
    assert_eq!(backend.live_count(), 0);
    assert!(streamer.is_empty());
    assert!(streamer.is_idle());
  }
}
