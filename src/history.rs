//! Per-consumer record of shown items with a replay cursor.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::media::MediaItem;

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub item: Arc<MediaItem>,
    /// Position of the item in its enumeration cycle when it was drawn.
    pub index: usize,
}

/// Bounded list of shown items plus a cursor for stepping back and forth.
///
/// `cursor == None` means the consumer is at the live edge and new items
/// come from the pool. While the cursor is set, `step_forward` replays
/// entries until it walks off the newest one.
#[derive(Debug)]
pub struct HistoryTrack {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    capacity: usize,
}

impl Default for HistoryTrack {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryTrack {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_replaying(&self) -> bool {
        self.cursor.is_some()
    }

    /// Append a freshly drawn item, evicting the oldest entry when full.
    pub fn record_shown(&mut self, item: Arc<MediaItem>, index: usize) {
        self.entries.push_back(HistoryEntry { item, index });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn step_forward(&mut self) -> Option<Arc<MediaItem>> {
        let next = self.cursor? + 1;
        match self.entries.get(next) {
            Some(entry) => {
                self.cursor = Some(next);
                Some(Arc::clone(&entry.item))
            }
            None => {
                self.cursor = None;
                None
            }
        }
    }

    pub fn step_backward(&mut self) -> Option<Arc<MediaItem>> {
        // The newest entry is what is on screen, so stepping back from the
        // live edge lands on the one before it.
        let target = match self.cursor {
            None => self.entries.len().checked_sub(2)?,
            Some(cursor) => cursor.checked_sub(1)?,
        };
        let entry = self.entries.get(target)?;
        self.cursor = Some(target);
        Some(Arc::clone(&entry.item))
    }

    pub fn most_recently_shown(&self) -> Option<Arc<MediaItem>> {
        self.entries.back().map(|entry| Arc::clone(&entry.item))
    }

    /// Cycle index of the replayed entry, or 0 at the live edge.
    pub fn current_display_index(&self) -> usize {
        self.cursor
            .and_then(|cursor| self.entries.get(cursor))
            .map_or(0, |entry| entry.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
