//! Shared working set of items not yet shown in the current cycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;

use crate::history::HistoryTrack;
use crate::media::MediaItem;

#[derive(Debug, Default)]
struct PoolState {
    cycle: u64,
    remaining: Vec<Arc<MediaItem>>,
    total: usize,
    ids: HashSet<String>,
}

impl PoolState {
    fn shown(&self) -> usize {
        self.total - self.remaining.len()
    }
}

/// Items of the active enumeration cycle, drawn at random without
/// replacement.
///
/// Every mutation goes through one mutex, so concurrent draws never hand the
/// same item to two consumers and the shown count always matches what was
/// removed. Items pushed for an older cycle are ignored, which makes late
/// results from a superseded enumeration harmless.
#[derive(Debug, Default)]
pub struct ItemPool {
    state: Mutex<PoolState>,
}

impl ItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop everything and start a new cycle, returning its number.
    pub fn begin_cycle(&self) -> u64 {
        let mut state = self.lock();
        state.cycle += 1;
        state.remaining.clear();
        state.ids.clear();
        state.total = 0;
        state.cycle
    }

    pub fn cycle(&self) -> u64 {
        self.lock().cycle
    }

    /// Add an item found during `cycle`.
    ///
    /// Returns `false` when the cycle is stale or the id was already seen in
    /// this cycle.
    pub fn push(&self, cycle: u64, item: MediaItem) -> bool {
        let mut state = self.lock();
        if state.cycle != cycle || !state.ids.insert(item.id.clone()) {
            return false;
        }
        state.remaining.push(Arc::new(item));
        state.total += 1;
        true
    }

    pub fn total(&self) -> usize {
        self.lock().total
    }

    pub fn remaining(&self) -> usize {
        self.lock().remaining.len()
    }

    /// How many items of this cycle have been drawn so far.
    pub fn shown(&self) -> usize {
        self.lock().shown()
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().remaining.is_empty()
    }

    /// Remove one uniformly random item and return it with its position in
    /// the cycle (1-based count of items drawn, including this one).
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Arc<MediaItem>, usize)> {
        let mut state = self.lock();
        Self::take_random(&mut state, rng)
    }

    /// Draw the first available item and record it into `history` with the
    /// position it was drawn at.
    ///
    /// `is_available` runs without the lock held. Items for which it is
    /// false are discarded without being recorded; they still count as shown
    /// for this cycle.
    pub fn draw_into<R, F>(
        &self,
        rng: &mut R,
        history: &mut HistoryTrack,
        is_available: F,
    ) -> Option<Arc<MediaItem>>
    where
        R: Rng + ?Sized,
        F: Fn(&MediaItem) -> bool,
    {
        loop {
            let (item, index) = Self::take_random(&mut self.lock(), rng)?;
            if !is_available(&item) {
                tracing::debug!(item = %item.locator, "skipping item that is no longer available");
                continue;
            }
            history.record_shown(Arc::clone(&item), index);
            return Some(item);
        }
    }

    fn take_random<R: Rng + ?Sized>(
        state: &mut PoolState,
        rng: &mut R,
    ) -> Option<(Arc<MediaItem>, usize)> {
        if state.remaining.is_empty() {
            return None;
        }
        let pick = rng.random_range(0..state.remaining.len());
        let item = state.remaining.swap_remove(pick);
        Some((item, state.shown()))
    }
}
