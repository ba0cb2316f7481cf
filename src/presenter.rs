//! Display side of the engine: what a viewer must provide, and slot
//! bookkeeping for multi-panel layouts.

use std::sync::Arc;

use tracing::{error, info};

use crate::media::MediaItem;

/// A viewer surface the engine feeds.
///
/// For videos the presenter is expected to report the end of the clip back
/// to the engine (`EngineHandle::video_ended`) so playback can move on
/// before the fallback timer does.
pub trait Presenter: Send {
    /// Number of panels the layout shows at once (1-up, 4-up, ...).
    fn slot_count(&self) -> usize;

    fn show(&mut self, slot: usize, item: &Arc<MediaItem>);

    fn pause_video(&mut self);

    fn resume_video(&mut self);

    fn report_error(&mut self, message: &str);
}

/// Picks which slot the next item goes to: the one updated longest ago,
/// lowest index first on ties.
#[derive(Debug, Clone)]
pub struct SlotTracker {
    last_updated: Vec<u64>,
    clock: u64,
}

impl SlotTracker {
    pub fn new(slots: usize) -> Self {
        Self {
            last_updated: vec![0; slots.max(1)],
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.last_updated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_updated.is_empty()
    }

    /// Change the layout. All slots become equally stale.
    pub fn resize(&mut self, slots: usize) {
        self.last_updated = vec![0; slots.max(1)];
        self.clock = 0;
    }

    /// Claim the oldest slot and mark it as just updated.
    pub fn next_slot(&mut self) -> usize {
        let (slot, _) = self
            .last_updated
            .iter()
            .enumerate()
            .min_by_key(|(idx, stamp)| (**stamp, *idx))
            .unwrap_or((0, &0));
        self.clock += 1;
        if let Some(stamp) = self.last_updated.get_mut(slot) {
            *stamp = self.clock;
        }
        slot
    }
}

/// Presenter that only logs what it would show. Used by the CLI.
#[derive(Debug)]
pub struct TracingPresenter {
    slots: usize,
}

impl TracingPresenter {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: slots.max(1),
        }
    }
}

impl Presenter for TracingPresenter {
    fn slot_count(&self) -> usize {
        self.slots
    }

    fn show(&mut self, slot: usize, item: &Arc<MediaItem>) {
        info!(
            slot,
            kind = %item.kind,
            item = %item.locator,
            caption = %item.caption(),
            "show"
        );
    }

    fn pause_video(&mut self) {
        info!("video paused");
    }

    fn resume_video(&mut self) {
        info!("video resumed");
    }

    fn report_error(&mut self, message: &str) {
        error!(message, "slideshow error");
    }
}
