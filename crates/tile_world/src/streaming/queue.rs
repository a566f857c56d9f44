//! Two-lane mesh build queue.

use std::collections::{HashMap, VecDeque};

use crate::coords::ChunkPos;

/// Queue lane a build request waits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildPriority {
  /// Chunk is inside the draw bounds.
  Visible,
  /// Chunk is only inside the retain bounds.
  Prefetch,
}

/// A pending mesh build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshBuildRequest {
  pub pos: ChunkPos,
  pub priority: BuildPriority,
}

/// Ordered build requests with at most one entry per chunk.
///
/// Visible requests always pop before prefetch requests, and each lane is
/// FIFO. Enqueuing a visible request for a chunk waiting in the prefetch
/// lane promotes it to the back of the visible lane. Edited chunks jump the
/// whole queue through [`BuildQueue::promote_front`].
#[derive(Default, Debug)]
pub struct BuildQueue {
  visible: VecDeque<ChunkPos>,
  prefetch: VecDeque<ChunkPos>,
  members: HashMap<ChunkPos, BuildPriority>,
}

impl BuildQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or promotes a request. Returns true if the queue changed.
  pub fn enqueue(&mut self, pos: ChunkPos, priority: BuildPriority) -> bool {
    match (self.members.get(&pos).copied(), priority) {
      (None, BuildPriority::Visible) => self.visible.push_back(pos),
      (None, BuildPriority::Prefetch) => self.prefetch.push_back(pos),
      (Some(BuildPriority::Prefetch), BuildPriority::Visible) => {
        self.prefetch.retain(|&p| p != pos);
        self.visible.push_back(pos);
      }
      (Some(_), _) => return false,
    }
    self.members.insert(pos, priority);
    true
  }

  /// Moves `pos` to the head of the visible lane, queuing it if absent.
  pub fn promote_front(&mut self, pos: ChunkPos) {
    match self.members.insert(pos, BuildPriority::Visible) {
      Some(BuildPriority::Visible) => self.visible.retain(|&p| p != pos),
      Some(BuildPriority::Prefetch) => self.prefetch.retain(|&p| p != pos),
      None => {}
    }
    self.visible.push_front(pos);
  }

  /// Removes the next request, visible lane first.
  pub fn pop(&mut self) -> Option<MeshBuildRequest> {
    let (pos, priority) = match self.visible.pop_front() {
      Some(pos) => (pos, BuildPriority::Visible),
      None => (self.prefetch.pop_front()?, BuildPriority::Prefetch),
    };
    self.members.remove(&pos);
    Some(MeshBuildRequest { pos, priority })
  }

  /// Lane the chunk is waiting in, if queued.
  pub fn priority_of(&self, pos: ChunkPos) -> Option<BuildPriority> {
    self.members.get(&pos).copied()
  }

  pub fn contains(&self, pos: ChunkPos) -> bool {
    self.members.contains_key(&pos)
  }

  /// Drops every request whose chunk fails `keep`.
  pub fn retain(&mut self, mut keep: impl FnMut(ChunkPos) -> bool) {
    self.members.retain(|&pos, _| keep(pos));
    let members = &self.members;
    self.visible.retain(|pos| members.contains_key(pos));
    self.prefetch.retain(|pos| members.contains_key(pos));
  }

  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  /// Requests in pop order.
  pub fn iter(&self) -> impl Iterator<Item = MeshBuildRequest> + '_ {
    let visible = self.visible.iter().map(|&pos| MeshBuildRequest {
      pos,
      priority: BuildPriority::Visible,
    });
    let prefetch = self.prefetch.iter().map(|&pos| MeshBuildRequest {
      pos,
      priority: BuildPriority::Prefetch,
    });
    visible.chain(prefetch)
  }

  pub fn clear(&mut self) {
    self.visible.clear();
    self.prefetch.clear();
    self.members.clear();
  }
}
