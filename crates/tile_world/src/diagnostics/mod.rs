//! Streaming counters and rolling timings.

mod time_series;

use bevy::prelude::Resource;
pub use time_series::TimeSeries;

use crate::streaming::FrameReport;

const SAMPLE_CAPACITY: usize = 300;

/// Per-frame streaming metrics.
#[derive(Resource, Clone, Debug)]
pub struct StreamingStats {
  /// Wall time spent building meshes each frame.
  pub build_time_ms: TimeSeries,
  /// Builds attempted each frame.
  pub builds: TimeSeries,
  /// Animated mesh uploads each frame.
  pub uploads: TimeSeries,
  pub total_built: u64,
  pub total_empty: u64,
  pub total_failed: u64,
  pub total_evicted: u64,
  pub total_pruned_chunks: u64,
  pub total_uploads: u64,
  pub total_edits: u64,
  /// Cached chunk meshes after the last frame.
  pub cached: usize,
  /// Build requests waiting after the last frame.
  pub queued: usize,
}

impl Default for StreamingStats {
  fn default() -> Self {
    Self {
      build_time_ms: TimeSeries::new(SAMPLE_CAPACITY),
      builds: TimeSeries::new(SAMPLE_CAPACITY),
      uploads: TimeSeries::new(SAMPLE_CAPACITY),
      total_built: 0,
      total_empty: 0,
      total_failed: 0,
      total_evicted: 0,
      total_pruned_chunks: 0,
      total_uploads: 0,
      total_edits: 0,
      cached: 0,
      queued: 0,
    }
  }
}

impl StreamingStats {
  /// Folds one frame's report into the totals and series.
  pub fn record(&mut self, report: &FrameReport, cached: usize, queued: usize) {
    let builds = &report.builds;
    self.build_time_ms.push(builds.elapsed_ms);
    self.builds.push(builds.attempted() as f32);
    self.uploads.push(report.uploads as f32);

    self.total_built += u64::from(builds.built);
    self.total_empty += u64::from(builds.empty);
    self.total_failed += u64::from(builds.failed);
    self.total_evicted += u64::from(report.evicted);
    self.total_pruned_chunks += u64::from(report.pruned_chunks);
    self.total_uploads += u64::from(report.uploads);
    self.total_edits += u64::from(report.edits);
    self.cached = cached;
    self.queued = queued;
  }
}
