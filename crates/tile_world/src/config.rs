//! Streaming configuration and config loading errors.

use serde::{Deserialize, Serialize};

/// Error loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
  /// TOML syntax or shape error.
  Parse(toml::de::Error),
  /// Well-formed input with invalid values.
  Invalid(String),
}

impl std::fmt::Display for ConfigError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
      ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
    }
  }
}

impl std::error::Error for ConfigError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ConfigError::Parse(e) => Some(e),
      ConfigError::Invalid(_) => None,
    }
  }
}

impl From<toml::de::Error> for ConfigError {
  fn from(e: toml::de::Error) -> Self {
    ConfigError::Parse(e)
  }
}

/// Tuning for chunk streaming and mesh build scheduling.
#[derive(bevy::prelude::Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
  /// Chunks of padding added around the visible chunk rectangle.
  pub draw_padding: u32,
  /// Extra chunks kept resident beyond the draw bounds.
  pub retain_padding: u32,
  /// Maximum mesh builds per frame.
  pub builds_per_frame: u32,
  /// Wall-time budget for mesh builds per frame, in milliseconds.
  pub build_budget_ms: f32,
  /// World generation seed.
  pub seed: u32,
  /// Chunk radius generated around the origin on startup.
  pub seed_radius: u32,
}

impl StreamingConfig {
  pub const DEFAULT_DRAW_PADDING: u32 = 1;
  pub const DEFAULT_RETAIN_PADDING: u32 = 2;
  pub const DEFAULT_BUILDS_PER_FRAME: u32 = 4;
  pub const DEFAULT_BUILD_BUDGET_MS: f32 = 3.0;

  /// Parses a config from TOML, filling omitted fields with defaults.
  pub fn load_str(source: &str) -> Result<Self, ConfigError> {
    let config: StreamingConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  /// Rejects values that would stall streaming.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.builds_per_frame == 0 {
      return Err(ConfigError::Invalid(
        "builds_per_frame must be at least 1".into(),
      ));
    }
    if !self.build_budget_ms.is_finite() || self.build_budget_ms < 0.0 {
      return Err(ConfigError::Invalid(format!(
        "build_budget_ms must be a non-negative number, got {}",
        self.build_budget_ms
      )));
    }
    Ok(())
  }

  /// Sets the world seed.
  pub fn with_seed(mut self, seed: u32) -> Self {
    self.seed = seed;
    self
  }

  /// Sets the per-frame build count budget.
  pub fn with_builds_per_frame(mut self, builds: u32) -> Self {
    self.builds_per_frame = builds;
    self
  }

  /// Sets the per-frame build time budget.
  pub fn with_build_budget_ms(mut self, ms: f32) -> Self {
    self.build_budget_ms = ms;
    self
  }
}

impl Default for StreamingConfig {
  fn default() -> Self {
    Self {
      draw_padding: Self::DEFAULT_DRAW_PADDING,
      retain_padding: Self::DEFAULT_RETAIN_PADDING,
      builds_per_frame: Self::DEFAULT_BUILDS_PER_FRAME,
      build_budget_ms: Self::DEFAULT_BUILD_BUDGET_MS,
      seed: 0,
      seed_radius: 1,
    }
  }
}
