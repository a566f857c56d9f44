//! Tile World - streaming chunked tile map plugin for Bevy.
//!
//! Procedurally generated tiles are stored in fixed-size chunks, autotiled
//! from their neighbors, triangulated into per-chunk meshes and streamed
//! around a camera under a per-frame build budget.

pub mod autotile;
pub mod config;
pub mod coords;
pub mod diagnostics;
pub mod mesh;
pub mod metadata;
pub mod plugin;
pub mod primitives;
pub mod render;
pub mod seeding;
pub mod streaming;
pub mod world;

pub use autotile::{Adjacency, Direction, TileNeighborhood};
pub use config::{ConfigError, StreamingConfig};
pub use coords::{
  BoundsError, CHUNK_SIZE, ChunkBounds, ChunkPos, LocalPos, TILE_SIZE, TileId, TilePos,
  affected_chunks_for_local_edit, world_to_chunk, world_to_local,
};
pub use diagnostics::{StreamingStats, TimeSeries};
pub use mesh::{
  AnimatedChunkMeshState, AnimatedTileQuad, ChunkMeshBuild, ChunkMeshData, MeshError,
  build_chunk_mesh,
};
pub use metadata::{
  AtlasLayout, TileAnimation, TileRegistry, TileRegistryConfig, TileRender, TileSprite, UvRect,
  ids as tile_ids,
};
#[cfg(feature = "headless")]
pub use plugin::ChunkMeshHandle;
#[cfg(not(feature = "headless"))]
pub use plugin::{ChunkMeshHandle, TileAtlasMaterial};
pub use plugin::{
  ChunkMeshEntity, StreamingCamera, StreamingView, TileStreamer, TileWorldPlugin,
  visible_tile_rect,
};
pub use primitives::Chunk;
#[cfg(not(feature = "headless"))]
pub use render::BevyMeshBackend;
pub use render::{MeshBackend, RecordedMesh, RecordingBackend};
pub use seeding::{ChunkSeeder, EmptySeeder, FlatSeeder, TerrainSeeder};
pub use streaming::{
  BuildPriority, BuildQueue, BuildReport, ChunkMeshStreamer, FrameReport, MeshCacheEntry,
  MeshState,
};
pub use world::{NeighborhoodSampler, TileEditEvent, TileEditListener, TileWorld};
