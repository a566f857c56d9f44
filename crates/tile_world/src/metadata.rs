//! Tile render metadata registry.
//!
//! Maps tile ids to how they are drawn: a static atlas slot, a direct UV
//! rect, an animated frame sequence or a 16-entry terrain autotile table.
//! The registry is an explicit value handed to the mesher and the animated
//! mesh patcher, and is loaded from TOML via [`TileRegistryConfig`].

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::coords::TileId;

/// Built-in tile ids used by the default terrain seeder.
pub mod ids {
  use crate::coords::TileId;

  pub const AIR: TileId = TileId(0);
  pub const GRASS: TileId = TileId(1);
  pub const DIRT: TileId = TileId(2);
  pub const STONE: TileId = TileId(3);
  pub const WATER: TileId = TileId(4);
  pub const BRICK: TileId = TileId(5);
}

/// Number of cardinal autotile variants (4 bits).
pub const AUTOTILE_VARIANTS: usize = 16;

/// Texture-space rectangle, `(u0, v0)` top-left and `(u1, v1)` bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
  pub u0: f32,
  pub v0: f32,
  pub u1: f32,
  pub v1: f32,
}

impl UvRect {
  pub const fn new(u0: f32, v0: f32, u1: f32, v1: f32) -> Self {
    Self { u0, v0, u1, v1 }
  }
}

/// Grid geometry of the tile atlas texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasLayout {
  /// Slots per row.
  pub columns: u32,
  /// Number of slot rows.
  pub rows: u32,
  /// Pixel size of one square slot.
  pub tile_px: u32,
}

impl AtlasLayout {
  /// Creates a layout, rejecting zero-sized geometry.
  pub fn new(columns: u32, rows: u32, tile_px: u32) -> Result<Self, ConfigError> {
    let layout = Self {
      columns,
      rows,
      tile_px,
    };
    layout.validate()?;
    Ok(layout)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.columns == 0 || self.rows == 0 || self.tile_px == 0 {
      return Err(ConfigError::Invalid(format!(
        "atlas layout must be non-zero, got {}x{} slots of {}px",
        self.columns, self.rows, self.tile_px
      )));
    }
    Ok(())
  }

  /// Total number of addressable slots.
  #[must_use]
  pub fn slot_count(&self) -> u32 {
    self.columns * self.rows
  }

  /// Atlas texture size in pixels.
  #[must_use]
  pub fn texture_size(&self) -> (u32, u32) {
    (self.columns * self.tile_px, self.rows * self.tile_px)
  }

  /// UV rect of a slot, or `None` if the slot lies outside the atlas.
  pub fn slot_uv(&self, slot: u32) -> Option<UvRect> {
    if slot >= self.slot_count() {
      return None;
    }
    let (width, height) = self.texture_size();
    let px = (slot % self.columns) * self.tile_px;
    let py = (slot / self.columns) * self.tile_px;
    Some(UvRect {
      u0: px as f32 / width as f32,
      v0: py as f32 / height as f32,
      u1: (px + self.tile_px) as f32 / width as f32,
      v1: (py + self.tile_px) as f32 / height as f32,
    })
  }
}

impl Default for AtlasLayout {
  fn default() -> Self {
    Self {
      columns: 8,
      rows: 6,
      tile_px: 16,
    }
  }
}

/// One image a tile can show: an atlas slot or an explicit rect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSprite {
  Atlas(u32),
  Uv(UvRect),
}

/// Looping frame sequence with a fixed per-frame duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileAnimation {
  pub frame_duration_ms: u32,
  pub frames: Vec<TileSprite>,
}

impl TileAnimation {
  /// Frame shown at `elapsed_ms`: `floor(elapsed / duration) mod frames`.
  ///
  /// Negative or non-finite elapsed times clamp to frame 0.
  pub fn frame_index_at(&self, elapsed_ms: f64) -> usize {
    if self.frames.is_empty() || self.frame_duration_ms == 0 || !elapsed_ms.is_finite()
      || elapsed_ms <= 0.0
    {
      return 0;
    }
    let step = (elapsed_ms / f64::from(self.frame_duration_ms)).floor() as u64;
    (step % self.frames.len() as u64) as usize
  }
}

/// Render description of a single tile id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileRender {
  pub name: String,
  pub atlas_index: Option<u32>,
  pub uv_rect: Option<UvRect>,
  pub animation: Option<TileAnimation>,
  /// Atlas slot for each cardinal autotile variant.
  pub autotile: Option<[u32; AUTOTILE_VARIANTS]>,
}

impl TileRender {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn with_atlas(mut self, slot: u32) -> Self {
    self.atlas_index = Some(slot);
    self
  }

  pub fn with_uv(mut self, rect: UvRect) -> Self {
    self.uv_rect = Some(rect);
    self
  }

  pub fn with_animation(mut self, frame_duration_ms: u32, frames: Vec<TileSprite>) -> Self {
    self.animation = Some(TileAnimation {
      frame_duration_ms,
      frames,
    });
    self
  }

  pub fn with_autotile(mut self, table: [u32; AUTOTILE_VARIANTS]) -> Self {
    self.autotile = Some(table);
    self
  }
}

/// Registry of tile render metadata, indexed by [`TileId`].
#[derive(bevy::prelude::Resource, Clone, Debug)]
pub struct TileRegistry {
  atlas: AtlasLayout,
  entries: Vec<Option<TileRender>>,
}

impl TileRegistry {
  /// Creates an empty registry over the given atlas.
  pub fn new(atlas: AtlasLayout) -> Self {
    Self {
      atlas,
      entries: Vec::new(),
    }
  }

  /// Built-in terrain tiles over the default 8x6 atlas.
  pub fn builtin() -> Self {
    let atlas = AtlasLayout::default();
    let mut grass = [0u32; AUTOTILE_VARIANTS];
    let mut dirt = [0u32; AUTOTILE_VARIANTS];
    for variant in 0..AUTOTILE_VARIANTS as u32 {
      grass[variant as usize] = variant;
      dirt[variant as usize] = 16 + variant;
    }

    Self::new(atlas)
      .with_tile(ids::GRASS, TileRender::named("Grass").with_autotile(grass))
      .with_tile(ids::DIRT, TileRender::named("Dirt").with_autotile(dirt))
      .with_tile(ids::STONE, TileRender::named("Stone").with_atlas(32))
      .with_tile(
        ids::WATER,
        TileRender::named("Water").with_atlas(40).with_animation(
          180,
          vec![
            TileSprite::Atlas(40),
            TileSprite::Atlas(41),
            TileSprite::Atlas(42),
            TileSprite::Atlas(43),
          ],
        ),
      )
      .with_tile(
        ids::BRICK,
        TileRender::named("Brick").with_uv(UvRect::new(0.125, 0.6666667, 0.25, 0.8333333)),
      )
  }

  /// Builder form of [`insert`](Self::insert).
  pub fn with_tile(mut self, id: TileId, render: TileRender) -> Self {
    self.insert(id, render);
    self
  }

  /// Registers or replaces metadata for a tile id.
  pub fn insert(&mut self, id: TileId, render: TileRender) {
    let index = id.0 as usize;
    if self.entries.len() <= index {
      self.entries.resize(index + 1, None);
    }
    self.entries[index] = Some(render);
  }

  /// Metadata for a tile, or `None` if unregistered.
  pub fn get(&self, id: TileId) -> Option<&TileRender> {
    self.entries.get(id.0 as usize).and_then(Option::as_ref)
  }

  pub fn atlas(&self) -> &AtlasLayout {
    &self.atlas
  }

  /// Resolves a sprite to texture coordinates.
  pub fn sprite_uv(&self, sprite: TileSprite) -> Option<UvRect> {
    match sprite {
      TileSprite::Atlas(slot) => self.atlas.slot_uv(slot),
      TileSprite::Uv(rect) => Some(rect),
    }
  }

  /// Returns true if the tile declares a frame sequence.
  pub fn is_animated(&self, id: TileId) -> bool {
    self.get(id).is_some_and(|r| r.animation.is_some())
  }

  /// Returns the number of registered tiles.
  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.iter().filter(|e| e.is_some()).count()
  }

  /// Returns true if no tiles are registered.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Iterates registered `(id, render)` pairs in id order.
  pub fn iter(&self) -> impl Iterator<Item = (TileId, &TileRender)> {
    self
      .entries
      .iter()
      .enumerate()
      .filter_map(|(i, e)| e.as_ref().map(|r| (TileId(i as u16), r)))
  }
}

impl Default for TileRegistry {
  fn default() -> Self {
    Self::builtin()
  }
}

/// Serialized form of one registry entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileConfig {
  pub id: TileId,
  #[serde(default)]
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub atlas_index: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub autotile: Option<Vec<u32>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uv_rect: Option<UvRect>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub animation: Option<TileAnimation>,
}

/// TOML-facing registry description.
///
/// ```toml
/// [atlas]
/// columns = 8
/// rows = 6
/// tile_px = 16
///
/// [[tiles]]
/// id = 3
/// name = "Stone"
/// atlas_index = 32
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileRegistryConfig {
  pub atlas: AtlasLayout,
  #[serde(default)]
  pub tiles: Vec<TileConfig>,
}

impl TileRegistryConfig {
  /// Config equivalent of [`TileRegistry::builtin`].
  pub fn builtin() -> Self {
    Self::from(&TileRegistry::builtin())
  }

  /// Parses and validates a registry from TOML.
  pub fn load_str(source: &str) -> Result<TileRegistry, ConfigError> {
    let config: TileRegistryConfig = toml::from_str(source)?;
    TileRegistry::try_from(config)
  }
}

impl From<&TileRegistry> for TileRegistryConfig {
  fn from(registry: &TileRegistry) -> Self {
    let tiles = registry
      .iter()
      .map(|(id, render)| TileConfig {
        id,
        name: render.name.clone(),
        atlas_index: render.atlas_index,
        autotile: render.autotile.map(|t| t.to_vec()),
        uv_rect: render.uv_rect,
        animation: render.animation.clone(),
      })
      .collect();
    Self {
      atlas: registry.atlas,
      tiles,
    }
  }
}

impl TryFrom<TileRegistryConfig> for TileRegistry {
  type Error = ConfigError;

  fn try_from(config: TileRegistryConfig) -> Result<Self, Self::Error> {
    config.atlas.validate()?;
    let mut registry = TileRegistry::new(config.atlas);

    for tile in config.tiles {
      if tile.id.is_empty() {
        return Err(ConfigError::Invalid(format!(
          "tile '{}' uses reserved id 0",
          tile.name
        )));
      }
      if registry.get(tile.id).is_some() {
        return Err(ConfigError::Invalid(format!(
          "duplicate tile id {}",
          tile.id.0
        )));
      }

      let autotile = match tile.autotile {
        Some(table) => Some(<[u32; AUTOTILE_VARIANTS]>::try_from(table.as_slice()).map_err(
          |_| {
            ConfigError::Invalid(format!(
              "tile {} autotile table needs {} entries, got {}",
              tile.id.0,
              AUTOTILE_VARIANTS,
              table.len()
            ))
          },
        )?),
        None => None,
      };

      if let Some(animation) = &tile.animation
        && (animation.frames.is_empty() || animation.frame_duration_ms == 0)
      {
        return Err(ConfigError::Invalid(format!(
          "tile {} animation needs at least one frame and a non-zero duration",
          tile.id.0
        )));
      }

      let frames = tile.animation.iter().flat_map(|a| &a.frames);
      let slots = tile
        .atlas_index
        .into_iter()
        .chain(autotile.iter().flatten().copied())
        .chain(frames.filter_map(|frame| match *frame {
          TileSprite::Atlas(slot) => Some(slot),
          TileSprite::Uv(_) => None,
        }));
      let slot_count = config.atlas.slot_count();
      for slot in slots {
        if slot >= slot_count {
          return Err(ConfigError::Invalid(format!(
            "tile {} references atlas slot {} but the atlas has {} slots",
            tile.id.0, slot, slot_count
          )));
        }
      }

      registry.insert(
        tile.id,
        TileRender {
          name: tile.name,
          atlas_index: tile.atlas_index,
          uv_rect: tile.uv_rect,
          animation: tile.animation,
          autotile,
        },
      );
    }

    Ok(registry)
  }
}
