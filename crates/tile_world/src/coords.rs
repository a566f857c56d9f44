//! Coordinate types and chunk-space math.
//!
//! Defines the coordinate system for the tile world:
//! - [`TilePos`]: Absolute world tile position (i32, rows grow downward)
//! - [`ChunkPos`]: Chunk grid position (i32)
//! - [`LocalPos`]: Tile position within a chunk (u16)
//! - [`ChunkBounds`]: Inclusive rectangle in chunk space
//! - [`TileId`]: Tile registry index, `0` is air

use serde::{Deserialize, Serialize};

/// Size of a chunk in tiles (width and height).
pub const CHUNK_SIZE: u32 = 32;

/// Number of tiles stored in one chunk.
pub const CHUNK_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Size of a tile in world units.
pub const TILE_SIZE: f32 = 16.0;

/// Tile registry index.
///
/// `TileId(0)` is reserved for air: it is never meshed and never solid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u16);

impl TileId {
  /// The empty tile.
  pub const EMPTY: TileId = TileId(0);

  /// Returns true for air.
  #[inline]
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

/// Absolute tile position in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TilePos {
  pub x: i32,
  pub y: i32,
}

impl TilePos {
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  /// Returns the tile offset by `(dx, dy)`, wrapping at the `i32` edges.
  #[inline]
  pub const fn offset(self, dx: i32, dy: i32) -> Self {
    Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
  }

  /// Splits the position into its chunk and in-chunk parts.
  #[inline]
  pub const fn to_chunk_and_local(self) -> (ChunkPos, LocalPos) {
    (world_to_chunk(self), world_to_local(self))
  }
}

/// Chunk grid position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
  pub x: i32,
  pub y: i32,
}

impl ChunkPos {
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  /// Returns the world tile at this chunk's local `(0, 0)`.
  #[inline]
  pub const fn origin_tile(self) -> TilePos {
    TilePos::new(self.x * CHUNK_SIZE as i32, self.y * CHUNK_SIZE as i32)
  }

  /// Returns the world tile for a local position inside this chunk.
  #[inline]
  pub const fn tile_at(self, local: LocalPos) -> TilePos {
    let origin = self.origin_tile();
    TilePos::new(origin.x + local.x as i32, origin.y + local.y as i32)
  }
}

/// Tile position within a chunk, each axis in `[0, CHUNK_SIZE)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalPos {
  pub x: u16,
  pub y: u16,
}

impl LocalPos {
  pub const fn new(x: u16, y: u16) -> Self {
    Self { x, y }
  }

  /// Returns true if the tile touches any chunk edge.
  pub const fn is_edge(self) -> bool {
    let last = (CHUNK_SIZE - 1) as u16;
    self.x == 0 || self.y == 0 || self.x == last || self.y == last
  }
}

/// Row-major index of a local tile in a chunk's tile array.
#[inline]
pub const fn to_tile_index(local: LocalPos) -> usize {
  local.y as usize * CHUNK_SIZE as usize + local.x as usize
}

/// Chunk containing a world tile. Floors toward negative infinity.
#[inline]
pub const fn world_to_chunk(tile: TilePos) -> ChunkPos {
  let size = CHUNK_SIZE as i32;
  ChunkPos::new(tile.x.div_euclid(size), tile.y.div_euclid(size))
}

/// Position of a world tile inside its chunk, always non-negative.
#[inline]
pub const fn world_to_local(tile: TilePos) -> LocalPos {
  let size = CHUNK_SIZE as i32;
  LocalPos::new(tile.x.rem_euclid(size) as u16, tile.y.rem_euclid(size) as u16)
}

/// Error returned when a rectangle has min > max on some axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundsError {
  pub min: (i32, i32),
  pub max: (i32, i32),
}

impl std::fmt::Display for BoundsError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "inverted bounds: min {:?} exceeds max {:?}",
      self.min, self.max
    )
  }
}

impl std::error::Error for BoundsError {}

/// Inclusive rectangle of chunk positions.
///
/// Always satisfies `min_x <= max_x` and `min_y <= max_y`. An empty set of
/// chunks is represented by having no bounds at all, never by an inverted
/// rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkBounds {
  min_x: i32,
  min_y: i32,
  max_x: i32,
  max_y: i32,
}

impl ChunkBounds {
  /// Creates bounds from inclusive corners.
  pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Result<Self, BoundsError> {
    if min_x > max_x || min_y > max_y {
      return Err(BoundsError {
        min: (min_x, min_y),
        max: (max_x, max_y),
      });
    }
    Ok(Self {
      min_x,
      min_y,
      max_x,
      max_y,
    })
  }

  /// Bounds covering exactly one chunk.
  pub const fn single(pos: ChunkPos) -> Self {
    Self {
      min_x: pos.x,
      min_y: pos.y,
      max_x: pos.x,
      max_y: pos.y,
    }
  }

  /// Smallest chunk rectangle enclosing an inclusive tile rectangle.
  pub fn from_tile_rect(min: TilePos, max: TilePos) -> Result<Self, BoundsError> {
    if min.x > max.x || min.y > max.y {
      return Err(BoundsError {
        min: (min.x, min.y),
        max: (max.x, max.y),
      });
    }
    let lo = world_to_chunk(min);
    let hi = world_to_chunk(max);
    Self::new(lo.x, lo.y, hi.x, hi.y)
  }

  /// Grows every edge outward by `padding` chunks.
  #[must_use]
  pub const fn expand(self, padding: i32) -> Self {
    Self {
      min_x: self.min_x.saturating_sub(padding),
      min_y: self.min_y.saturating_sub(padding),
      max_x: self.max_x.saturating_add(padding),
      max_y: self.max_y.saturating_add(padding),
    }
  }

  /// Inclusive containment test.
  #[inline]
  pub const fn contains(&self, pos: ChunkPos) -> bool {
    pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
  }

  pub const fn min(&self) -> ChunkPos {
    ChunkPos::new(self.min_x, self.min_y)
  }

  pub const fn max(&self) -> ChunkPos {
    ChunkPos::new(self.max_x, self.max_y)
  }

  /// Number of chunks covered.
  pub const fn area(&self) -> usize {
    let w = (self.max_x as i64 - self.min_x as i64 + 1) as usize;
    let h = (self.max_y as i64 - self.min_y as i64 + 1) as usize;
    w * h
  }

  /// Iterates covered chunks row by row.
  pub fn positions(self) -> impl Iterator<Item = ChunkPos> {
    let Self {
      min_x,
      min_y,
      max_x,
      max_y,
    } = self;
    (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| ChunkPos::new(x, y)))
  }
}

/// Chunks whose meshes can change when the tile at `local` in `chunk` is
/// edited.
///
/// Always includes `chunk` itself first. Edge tiles add the chunk across
/// that edge, and corner tiles also add the diagonal chunk, since meshing
/// samples the full 3x3 neighborhood.
pub fn affected_chunks_for_local_edit(chunk: ChunkPos, local: LocalPos) -> Vec<ChunkPos> {
  let last = (CHUNK_SIZE - 1) as u16;
  let edge_offset = |v: u16| -> Option<i32> {
    if v == 0 {
      Some(-1)
    } else if v == last {
      Some(1)
    } else {
      None
    }
  };

  let dx = edge_offset(local.x);
  let dy = edge_offset(local.y);

  let mut affected = Vec::with_capacity(4);
  affected.push(chunk);
  if let Some(dx) = dx {
    affected.push(ChunkPos::new(chunk.x + dx, chunk.y));
  }
  if let Some(dy) = dy {
    affected.push(ChunkPos::new(chunk.x, chunk.y + dy));
  }
  if let (Some(dx), Some(dy)) = (dx, dy) {
    affected.push(ChunkPos::new(chunk.x + dx, chunk.y + dy));
  }
  affected
}
