//! Autotile adjacency masks and variant selection.
//!
//! A tile's 3x3 neighborhood becomes an 8-bit [`Adjacency`] mask (clockwise
//! from north). Diagonal bits are only kept when both supporting cardinals
//! are set, then the mask is compressed to a 4-bit cardinal variant index
//! through a 256-entry lookup table. Terrain art with 8-bit variants can
//! swap the table without touching mask construction.

use bitflags::bitflags;

use crate::coords::TileId;

bitflags! {
  /// Directions in which a tile connects to its neighbors.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct Adjacency: u8 {
    const N = 1;
    const NE = 2;
    const E = 4;
    const SE = 8;
    const S = 16;
    const SW = 32;
    const W = 64;
    const NW = 128;
  }
}

/// One of the eight neighbor directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
  North,
  NorthEast,
  East,
  SouthEast,
  South,
  SouthWest,
  West,
  NorthWest,
}

impl Direction {
  /// All directions, clockwise from north.
  pub const ALL: [Direction; 8] = [
    Direction::North,
    Direction::NorthEast,
    Direction::East,
    Direction::SouthEast,
    Direction::South,
    Direction::SouthWest,
    Direction::West,
    Direction::NorthWest,
  ];

  /// Mask bit for this direction.
  pub const fn bit(self) -> Adjacency {
    match self {
      Direction::North => Adjacency::N,
      Direction::NorthEast => Adjacency::NE,
      Direction::East => Adjacency::E,
      Direction::SouthEast => Adjacency::SE,
      Direction::South => Adjacency::S,
      Direction::SouthWest => Adjacency::SW,
      Direction::West => Adjacency::W,
      Direction::NorthWest => Adjacency::NW,
    }
  }

  /// Tile offset `(dx, dy)`. Rows grow downward, so north is `-y`.
  pub const fn offset(self) -> (i32, i32) {
    match self {
      Direction::North => (0, -1),
      Direction::NorthEast => (1, -1),
      Direction::East => (1, 0),
      Direction::SouthEast => (1, 1),
      Direction::South => (0, 1),
      Direction::SouthWest => (-1, 1),
      Direction::West => (-1, 0),
      Direction::NorthWest => (-1, -1),
    }
  }
}

/// A tile and its eight neighbors, possibly spanning chunk boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileNeighborhood {
  pub center: TileId,
  pub north: TileId,
  pub north_east: TileId,
  pub east: TileId,
  pub south_east: TileId,
  pub south: TileId,
  pub south_west: TileId,
  pub west: TileId,
  pub north_west: TileId,
}

impl TileNeighborhood {
  /// Neighborhood where every tile is `id`.
  pub const fn uniform(id: TileId) -> Self {
    Self {
      center: id,
      north: id,
      north_east: id,
      east: id,
      south_east: id,
      south: id,
      south_west: id,
      west: id,
      north_west: id,
    }
  }

  /// Neighbor in the given direction.
  pub const fn get(&self, dir: Direction) -> TileId {
    match dir {
      Direction::North => self.north,
      Direction::NorthEast => self.north_east,
      Direction::East => self.east,
      Direction::SouthEast => self.south_east,
      Direction::South => self.south,
      Direction::SouthWest => self.south_west,
      Direction::West => self.west,
      Direction::NorthWest => self.north_west,
    }
  }

  /// Mutable neighbor slot in the given direction.
  pub fn get_mut(&mut self, dir: Direction) -> &mut TileId {
    match dir {
      Direction::North => &mut self.north,
      Direction::NorthEast => &mut self.north_east,
      Direction::East => &mut self.east,
      Direction::SouthEast => &mut self.south_east,
      Direction::South => &mut self.south,
      Direction::SouthWest => &mut self.south_west,
      Direction::West => &mut self.west,
      Direction::NorthWest => &mut self.north_west,
    }
  }
}

/// Default connectivity: non-empty center joined to an identical neighbor.
pub fn same_tile(center: TileId, neighbor: TileId, _dir: Direction) -> bool {
  !center.is_empty() && neighbor == center
}

/// Builds the raw adjacency mask with the default [`same_tile`] predicate.
pub fn build_adjacency_mask(neighborhood: &TileNeighborhood) -> Adjacency {
  build_adjacency_mask_with(neighborhood, same_tile)
}

/// Builds the raw adjacency mask with a custom connectivity predicate.
pub fn build_adjacency_mask_with(
  neighborhood: &TileNeighborhood,
  is_connected: impl Fn(TileId, TileId, Direction) -> bool,
) -> Adjacency {
  let mut mask = Adjacency::empty();
  for dir in Direction::ALL {
    if is_connected(neighborhood.center, neighborhood.get(dir), dir) {
      mask |= dir.bit();
    }
  }
  mask
}

/// Clears every diagonal bit whose two adjacent cardinals are not both set.
pub const fn normalize_adjacency_mask(mask: Adjacency) -> Adjacency {
  let mut bits = mask.bits();
  let n = bits & Adjacency::N.bits() != 0;
  let e = bits & Adjacency::E.bits() != 0;
  let s = bits & Adjacency::S.bits() != 0;
  let w = bits & Adjacency::W.bits() != 0;

  if !(n && e) {
    bits &= !Adjacency::NE.bits();
  }
  if !(s && e) {
    bits &= !Adjacency::SE.bits();
  }
  if !(s && w) {
    bits &= !Adjacency::SW.bits();
  }
  if !(n && w) {
    bits &= !Adjacency::NW.bits();
  }
  Adjacency::from_bits_retain(bits)
}

/// 8-bit mask to 4-bit cardinal index (bit0=N, bit1=E, bit2=S, bit3=W).
static TERRAIN_VARIANT_LUT: [u8; 256] = build_terrain_lut();

const fn build_terrain_lut() -> [u8; 256] {
  let mut lut = [0u8; 256];
  let mut mask = 0usize;
  while mask < 256 {
    let m = mask as u8;
    let mut index = 0u8;
    if m & Adjacency::N.bits() != 0 {
      index |= 1;
    }
    if m & Adjacency::E.bits() != 0 {
      index |= 2;
    }
    if m & Adjacency::S.bits() != 0 {
      index |= 4;
    }
    if m & Adjacency::W.bits() != 0 {
      index |= 8;
    }
    lut[mask] = index;
    mask += 1;
  }
  lut
}

/// Cardinal variant index (`0..16`) for a normalized mask.
#[inline]
pub fn terrain_variant_index(normalized: Adjacency) -> u8 {
  TERRAIN_VARIANT_LUT[normalized.bits() as usize]
}

/// Mask, normalize and index in one step.
pub fn resolve_terrain_variant(neighborhood: &TileNeighborhood) -> u8 {
  terrain_variant_index(normalize_adjacency_mask(build_adjacency_mask(
    neighborhood,
  )))
}
