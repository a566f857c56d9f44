//! Height-field terrain seeder using Perlin noise.

use noise::{NoiseFn, Perlin};

use super::ChunkSeeder;
use crate::coords::{CHUNK_SIZE, ChunkPos, LocalPos, TileId, TilePos};
use crate::metadata::ids;
use crate::primitives::Chunk;

/// Side-view terrain generator.
///
/// Produces a rolling surface from fractal Perlin noise sampled along the x
/// axis, fills below it with dirt then stone, carves caves with a second 2D
/// noise field and floods open air under sea level with water. Rows grow
/// downward, so larger `y` is deeper.
///
/// Every tile is a pure function of `(seed, x, y)`.
#[derive(Clone)]
pub struct TerrainSeeder {
  height_noise: Perlin,
  cave_noise: Perlin,
  /// Row of the average surface.
  surface_level: i32,
  /// Vertical amplitude of hills, in tiles.
  height_range: f64,
  base_frequency: f64,
  octaves: usize,
  persistence: f64,
  lacunarity: f64,
  /// Tiles of dirt between grass and stone.
  dirt_depth: i32,
  cave_frequency: f64,
  /// Noise values above this are carved out.
  cave_threshold: f64,
  /// Air below this row turns into water.
  sea_level: i32,
}

impl TerrainSeeder {
  const DEFAULT_SURFACE_LEVEL: i32 = 0;
  const DEFAULT_HEIGHT_RANGE: f64 = 24.0;
  const DEFAULT_BASE_FREQUENCY: f64 = 0.01;
  const DEFAULT_OCTAVES: usize = 4;
  const DEFAULT_PERSISTENCE: f64 = 0.5;
  const DEFAULT_LACUNARITY: f64 = 2.0;
  const DEFAULT_DIRT_DEPTH: i32 = 6;
  const DEFAULT_CAVE_FREQUENCY: f64 = 0.08;
  const DEFAULT_CAVE_THRESHOLD: f64 = 0.4;
  const DEFAULT_SEA_LEVEL: i32 = 8;

  /// Creates a seeder with default terrain parameters.
  ///
  /// Use builder methods to customize:
  /// - `surface_level(i32)`: Average surface row (default: 0)
  /// - `height_range(f64)`: Hill amplitude in tiles (default: 24.0)
  /// - `octaves(usize)`: Fractal octaves for the surface (default: 4)
  /// - `sea_level(i32)`: Row below which air floods (default: 8)
  pub fn new(seed: u32) -> Self {
    Self {
      height_noise: Perlin::new(seed),
      // Offset so caves don't mirror the surface profile
      cave_noise: Perlin::new(seed.wrapping_add(0x9E37)),
      surface_level: Self::DEFAULT_SURFACE_LEVEL,
      height_range: Self::DEFAULT_HEIGHT_RANGE,
      base_frequency: Self::DEFAULT_BASE_FREQUENCY,
      octaves: Self::DEFAULT_OCTAVES,
      persistence: Self::DEFAULT_PERSISTENCE,
      lacunarity: Self::DEFAULT_LACUNARITY,
      dirt_depth: Self::DEFAULT_DIRT_DEPTH,
      cave_frequency: Self::DEFAULT_CAVE_FREQUENCY,
      cave_threshold: Self::DEFAULT_CAVE_THRESHOLD,
      sea_level: Self::DEFAULT_SEA_LEVEL,
    }
  }

  pub fn surface_level(mut self, row: i32) -> Self {
    self.surface_level = row;
    self
  }

  pub fn height_range(mut self, tiles: f64) -> Self {
    self.height_range = tiles;
    self
  }

  pub fn octaves(mut self, octaves: usize) -> Self {
    self.octaves = octaves.max(1);
    self
  }

  pub fn sea_level(mut self, row: i32) -> Self {
    self.sea_level = row;
    self
  }

  /// Surface row for a world column.
  pub fn surface_at(&self, x: i32) -> i32 {
    let mut amplitude = 1.0;
    let mut frequency = self.base_frequency;
    let mut total = 0.0;
    let mut max_value = 0.0;

    for _ in 0..self.octaves {
      total += self.height_noise.get([x as f64 * frequency, 0.5]) * amplitude;
      max_value += amplitude;
      amplitude *= self.persistence;
      frequency *= self.lacunarity;
    }

    let normalized = total / max_value;
    self.surface_level - (normalized * self.height_range).round() as i32
  }

  fn tile_below_surface(&self, tile: TilePos, surface: i32) -> TileId {
    let depth = tile.y - surface;
    if depth < 0 {
      return self.open_air(tile);
    }

    // Keep the grass line intact so caves don't open onto the surface
    if depth > 1 {
      let cave = self.cave_noise.get([
        tile.x as f64 * self.cave_frequency,
        tile.y as f64 * self.cave_frequency,
      ]);
      if cave > self.cave_threshold {
        return TileId::EMPTY;
      }
    }

    if depth == 0 {
      ids::GRASS
    } else if depth <= self.dirt_depth {
      ids::DIRT
    } else {
      ids::STONE
    }
  }

  fn open_air(&self, tile: TilePos) -> TileId {
    if tile.y > self.sea_level {
      ids::WATER
    } else {
      TileId::EMPTY
    }
  }
}

impl Default for TerrainSeeder {
  fn default() -> Self {
    Self::new(0)
  }
}

impl ChunkSeeder for TerrainSeeder {
  fn tile_at(&self, tile: TilePos) -> TileId {
    self.tile_below_surface(tile, self.surface_at(tile.x))
  }

  fn seed(&self, pos: ChunkPos, chunk: &mut Chunk) {
    for lx in 0..CHUNK_SIZE as u16 {
      let column = pos.tile_at(LocalPos::new(lx, 0)).x;
      // One surface sample per column
      let surface = self.surface_at(column);
      for ly in 0..CHUNK_SIZE as u16 {
        let local = LocalPos::new(lx, ly);
        chunk.set(local, self.tile_below_surface(pos.tile_at(local), surface));
      }
    }
  }
}
