use std::collections::VecDeque;

/// Fixed-capacity window of recent samples with a running sum.
#[derive(Clone, Debug)]
pub struct TimeSeries {
  samples: VecDeque<f32>,
  capacity: usize,
  sum: f32,
}

impl TimeSeries {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      samples: VecDeque::with_capacity(capacity),
      capacity,
      sum: 0.0,
    }
  }

  /// Appends a sample, dropping the oldest once full.
  pub fn push(&mut self, value: f32) {
    if self.samples.len() == self.capacity
      && let Some(oldest) = self.samples.pop_front()
    {
      self.sum -= oldest;
    }
    self.samples.push_back(value);
    self.sum += value;
  }

  pub fn samples(&self) -> &VecDeque<f32> {
    &self.samples
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Most recent sample.
  pub fn current(&self) -> Option<f32> {
    self.samples.back().copied()
  }

  pub fn avg(&self) -> f32 {
    if self.samples.is_empty() {
      0.0
    } else {
      self.sum / self.samples.len() as f32
    }
  }

  /// Largest sample in the window, 0 when empty.
  pub fn max(&self) -> f32 {
    self.samples.iter().copied().reduce(f32::max).unwrap_or(0.0)
  }

  pub fn clear(&mut self) {
    self.samples.clear();
    self.sum = 0.0;
  }
}
