//! Playback state machine.
//!
//! [`PlaybackEngine`] owns every piece of mutable playback state and is
//! driven by three inputs: commands, source events and the slide timer. It is
//! synchronous; `tasks::manager` runs it inside a single task so the inputs
//! are serialized.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::events::{ConsumerId, EngineCommand, EngineState, SourceEvent};
use crate::history::{DEFAULT_HISTORY_CAPACITY, HistoryTrack};
use crate::media::MediaItem;
use crate::pool::ItemPool;
use crate::presenter::{Presenter, SlotTracker};
use crate::session::SessionDescriptor;
use crate::source::{ContentSource, PoolSink, spawn_enumeration};
use crate::timer::{DEFAULT_VIDEO_BUFFER, MAX_SLIDE_SECONDS, SlideDurations, SlideTimer};

const SOURCE_EVENT_CAPACITY: usize = 16;

/// Message shown when a whole cycle produced nothing.
pub const NO_MEDIA_MESSAGE: &str = "No media found";

/// Tunables for one engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub durations: SlideDurations,
    pub video_buffer: Duration,
    pub history_capacity: usize,
    pub seed: Option<u64>,
}

impl EngineSettings {
    pub fn new(durations: SlideDurations) -> Self {
        Self {
            durations,
            video_buffer: DEFAULT_VIDEO_BUFFER,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            seed: None,
        }
    }

    pub fn from_session(session: &SessionDescriptor, cfg: &Configuration) -> Self {
        Self {
            durations: session.durations(),
            video_buffer: cfg.video_buffer,
            history_capacity: cfg.history_capacity,
            seed: cfg.seed,
        }
    }
}

struct Consumer {
    presenter: Box<dyn Presenter>,
    history: HistoryTrack,
    slots: SlotTracker,
    current: Option<Arc<MediaItem>>,
}

impl Consumer {
    fn showing_video(&self) -> bool {
        self.current.as_ref().is_some_and(|item| item.is_video())
    }

    fn display(&mut self, id: ConsumerId, item: Arc<MediaItem>) {
        let slot = self.slots.next_slot();
        debug!(consumer = %id, slot, item = %item.locator, kind = %item.kind, "display");
        self.presenter.show(slot, &item);
        self.current = Some(item);
    }
}

pub struct PlaybackEngine {
    state: EngineState,
    source: Arc<ContentSource>,
    pool: Arc<ItemPool>,
    events: mpsc::Sender<SourceEvent>,
    consumers: BTreeMap<ConsumerId, Consumer>,
    timer: SlideTimer,
    durations: SlideDurations,
    video_buffer: Duration,
    history_capacity: usize,
    rng: StdRng,
    enumerating: bool,
    /// Consumers that asked for an item while the pool was empty, one entry
    /// per missing slide and never more entries than the consumer has slots.
    waiting: Vec<ConsumerId>,
    /// An error has been shown since the last successful enumeration.
    reported: bool,
    last_advanced: Option<ConsumerId>,
    state_tx: watch::Sender<EngineState>,
}

impl PlaybackEngine {
    /// Create an engine in the `Created` state along with the receiver its
    /// background enumerations report to.
    pub fn new(
        source: ContentSource,
        settings: EngineSettings,
    ) -> (Self, mpsc::Receiver<SourceEvent>) {
        let (events, source_rx) = mpsc::channel(SOURCE_EVENT_CAPACITY);
        let (state_tx, _) = watch::channel(EngineState::Created);
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let engine = Self {
            state: EngineState::Created,
            source: Arc::new(source),
            pool: Arc::new(ItemPool::new()),
            events,
            consumers: BTreeMap::new(),
            timer: SlideTimer::default(),
            durations: settings.durations,
            video_buffer: settings.video_buffer,
            history_capacity: settings.history_capacity,
            rng,
            enumerating: false,
            waiting: Vec::new(),
            reported: false,
            last_advanced: None,
            state_tx,
        };
        (engine, source_rx)
    }

    /// Register a viewer. Consumers attached while playing get their slots
    /// filled on the next advance.
    pub fn attach(&mut self, id: ConsumerId, presenter: Box<dyn Presenter>) {
        let slots = SlotTracker::new(presenter.slot_count());
        let consumer = Consumer {
            presenter,
            history: HistoryTrack::with_capacity(self.history_capacity),
            slots,
            current: None,
        };
        if self.consumers.insert(id, consumer).is_some() {
            warn!(consumer = %id, "replaced existing consumer");
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state_tx.subscribe()
    }

    pub fn pool(&self) -> &Arc<ItemPool> {
        &self.pool
    }

    pub fn timer(&self) -> &SlideTimer {
        &self.timer
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn durations(&self) -> &SlideDurations {
        &self.durations
    }

    pub fn history(&self, id: ConsumerId) -> Option<&HistoryTrack> {
        self.consumers.get(&id).map(|c| &c.history)
    }

    pub fn current_item(&self, id: ConsumerId) -> Option<Arc<MediaItem>> {
        self.consumers.get(&id).and_then(|c| c.current.clone())
    }

    /// 1-based position of what `id` is showing within the cycle.
    pub fn current_index(&self, id: ConsumerId) -> usize {
        match self.consumers.get(&id) {
            Some(c) if c.history.is_replaying() => c.history.current_display_index(),
            _ => self.pool.shown(),
        }
    }

    /// Kick off the first enumeration. Playback begins once items arrive.
    pub fn start(&mut self) {
        if self.state != EngineState::Created {
            debug!(state = ?self.state, "start ignored");
            return;
        }
        self.begin_enumeration();
    }

    pub fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Next(id) => self.next(id),
            EngineCommand::Previous(id) => self.previous(id),
            EngineCommand::VideoEnded(id) => self.video_ended(id),
            EngineCommand::SlotsChanged(id) => self.slots_changed(id),
            EngineCommand::AdjustDuration(delta) => self.adjust_duration(delta),
        }
    }

    pub fn on_source_event(&mut self, event: SourceEvent) {
        if self.state == EngineState::Stopped {
            debug!(?event, "engine stopped; dropping source event");
            return;
        }
        if event.cycle() != self.pool.cycle() {
            debug!(?event, current = self.pool.cycle(), "dropping stale source event");
            return;
        }
        match event {
            SourceEvent::FirstAvailable { .. } => {
                self.reported = false;
                match self.state {
                    EngineState::Created => self.enter_playing(),
                    EngineState::Playing => {
                        if self.serve_waiting() {
                            self.reschedule();
                        }
                    }
                    _ => {}
                }
            }
            SourceEvent::Complete { total, .. } => {
                self.enumerating = false;
                info!(total, "enumeration complete");
                if total == 0 {
                    self.waiting.clear();
                    self.report_once(NO_MEDIA_MESSAGE);
                    // Retry on the next tick.
                    self.reschedule();
                    return;
                }
                match self.state {
                    EngineState::Created => self.enter_playing(),
                    EngineState::Playing => {
                        if self.serve_waiting() {
                            self.reschedule();
                        }
                    }
                    _ => {}
                }
            }
            SourceEvent::Failed { message, .. } => {
                warn!(%message, "enumeration failed");
                self.report_once(&message);
            }
        }
    }

    /// Advance every consumer by one slide.
    pub fn on_timer_fired(&mut self) {
        self.timer.fire();
        if self.state != EngineState::Playing {
            debug!(state = ?self.state, "timer fired while not playing");
            return;
        }
        let ids: Vec<ConsumerId> = self.consumers.keys().copied().collect();
        let mut shown = false;
        for id in ids {
            shown |= self.next_slide(id);
        }
        self.rearm_after(shown);
    }

    pub fn play(&mut self) {
        if self.state != EngineState::Paused {
            debug!(state = ?self.state, "play ignored");
            return;
        }
        self.set_state(EngineState::Playing);
        let ids: Vec<ConsumerId> = self.consumers.keys().copied().collect();
        for id in ids {
            let Some(consumer) = self.consumers.get_mut(&id) else {
                continue;
            };
            if consumer.showing_video() {
                consumer.presenter.resume_video();
                self.last_advanced = Some(id);
            } else {
                self.next_slide(id);
            }
        }
        self.serve_waiting();
        self.reschedule();
    }

    pub fn pause(&mut self) {
        if self.state != EngineState::Playing {
            debug!(state = ?self.state, "pause ignored");
            return;
        }
        self.set_state(EngineState::Paused);
        self.timer.cancel();
        for consumer in self.consumers.values_mut() {
            if consumer.showing_video() {
                consumer.presenter.pause_video();
            }
        }
    }

    /// Terminal. Later commands, timer ticks and source events are dropped.
    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.timer.cancel();
        self.waiting.clear();
        self.enumerating = false;
        // Invalidates the running enumeration and discards its items.
        self.pool.begin_cycle();
        self.set_state(EngineState::Stopped);
    }

    pub fn next(&mut self, id: ConsumerId) {
        if self.state != EngineState::Playing {
            debug!(consumer = %id, state = ?self.state, "next ignored");
            return;
        }
        let shown = self.next_slide(id);
        self.rearm_after(shown);
    }

    pub fn previous(&mut self, id: ConsumerId) {
        if self.state != EngineState::Playing {
            debug!(consumer = %id, state = ?self.state, "previous ignored");
            return;
        }
        let Some(consumer) = self.consumers.get_mut(&id) else {
            warn!(consumer = %id, "previous for unknown consumer");
            return;
        };
        match consumer.history.step_backward() {
            Some(item) => {
                consumer.display(id, item);
                self.last_advanced = Some(id);
                self.reschedule();
            }
            None => {
                debug!(consumer = %id, "already at oldest history entry");
                let after = self.durations.effective(&mut self.rng);
                self.timer.schedule(after);
            }
        }
    }

    pub fn video_ended(&mut self, id: ConsumerId) {
        if self.state != EngineState::Playing {
            debug!(consumer = %id, state = ?self.state, "video end ignored");
            return;
        }
        let showing_video = self
            .consumers
            .get(&id)
            .is_some_and(Consumer::showing_video);
        if !showing_video {
            debug!(consumer = %id, "video end for an item no longer shown");
            return;
        }
        self.next_slide(id);
        self.reschedule();
    }

    pub fn slots_changed(&mut self, id: ConsumerId) {
        let Some(consumer) = self.consumers.get_mut(&id) else {
            warn!(consumer = %id, "slot change for unknown consumer");
            return;
        };
        let slots = consumer.presenter.slot_count();
        if slots == consumer.slots.len() {
            return;
        }
        info!(consumer = %id, slots, "slot count changed");
        consumer.slots.resize(slots);
        if self.state == EngineState::Playing {
            for _ in 0..slots {
                self.next_slide(id);
            }
            self.reschedule();
        }
    }

    /// Shift the slide duration by `delta` seconds. The effective duration
    /// never drops below one second.
    pub fn adjust_duration(&mut self, delta: f64) {
        if !delta.is_finite() {
            warn!(delta, "ignoring non-finite duration adjustment");
            return;
        }
        self.durations.override_seconds =
            (self.durations.override_seconds + delta).clamp(-MAX_SLIDE_SECONDS, MAX_SLIDE_SECONDS);
        info!(
            override_seconds = self.durations.override_seconds,
            "slide duration adjusted"
        );
        if self.state == EngineState::Playing && !self.last_shown_is_video() {
            let after = self.durations.effective(&mut self.rng);
            self.timer.schedule(after);
        }
    }

    fn set_state(&mut self, state: EngineState) {
        info!(from = ?self.state, to = ?state, "engine state");
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn enter_playing(&mut self) {
        self.set_state(EngineState::Playing);
        let ids: Vec<ConsumerId> = self.consumers.keys().copied().collect();
        for id in ids {
            let slots = match self.consumers.get_mut(&id) {
                Some(consumer) => {
                    let slots = consumer.presenter.slot_count();
                    consumer.slots.resize(slots);
                    slots
                }
                None => continue,
            };
            for _ in 0..slots {
                self.next_slide(id);
            }
        }
        self.reschedule();
    }

    /// Show the next item on `id`: replay forward through history first,
    /// then draw from the pool. With the pool empty the consumer waits and a
    /// new enumeration cycle starts unless one is running.
    fn next_slide(&mut self, id: ConsumerId) -> bool {
        let Some(consumer) = self.consumers.get_mut(&id) else {
            warn!(consumer = %id, "advance for unknown consumer");
            return false;
        };
        let slot_count = consumer.slots.len();
        if let Some(item) = consumer.history.step_forward() {
            consumer.display(id, item);
            self.last_advanced = Some(id);
            return true;
        }
        let drawn = self
            .pool
            .draw_into(&mut self.rng, &mut consumer.history, MediaItem::is_available);
        match drawn {
            Some(item) => {
                consumer.display(id, item);
                self.last_advanced = Some(id);
                true
            }
            None => {
                let queued = self.waiting.iter().filter(|w| **w == id).count();
                if queued < slot_count {
                    self.waiting.push(id);
                }
                if self.enumerating {
                    debug!(consumer = %id, "pool empty; waiting for enumeration");
                } else {
                    self.begin_enumeration();
                }
                false
            }
        }
    }

    /// Returns whether anything was shown.
    fn serve_waiting(&mut self) -> bool {
        let waiting = std::mem::take(&mut self.waiting);
        let mut shown = false;
        for id in waiting {
            shown |= self.next_slide(id);
        }
        shown
    }

    /// After an advance: keep the slide timer going, unless nothing could be
    /// shown and a running enumeration will resume playback when it reports.
    fn rearm_after(&mut self, shown: bool) {
        if shown || !self.enumerating {
            self.reschedule();
        } else {
            debug!("pool empty; timer parked until enumeration reports");
            self.timer.cancel();
        }
    }

    fn begin_enumeration(&mut self) {
        if self.enumerating {
            return;
        }
        let cycle = self.pool.begin_cycle();
        self.enumerating = true;
        if cycle == 1 {
            info!(cycle, "starting enumeration");
        } else {
            debug!(cycle, "pool exhausted; rebuilding");
        }
        let sink = PoolSink::new(Arc::clone(&self.pool), cycle, self.events.clone());
        spawn_enumeration(Arc::clone(&self.source), sink);
    }

    fn last_shown_is_video(&self) -> bool {
        self.last_advanced
            .and_then(|id| self.consumers.get(&id))
            .is_some_and(Consumer::showing_video)
    }

    /// Arm the timer for whatever was shown last.
    ///
    /// Clips of known length get their length plus the video buffer. Clips of
    /// unknown length leave the timer off; the presenter's end-of-video
    /// notification advances instead.
    fn reschedule(&mut self) {
        if self.state != EngineState::Playing {
            return;
        }
        let video = self
            .last_advanced
            .and_then(|id| self.consumers.get(&id))
            .and_then(|c| c.current.clone())
            .filter(|item| item.is_video());
        match video {
            Some(clip) => match clip.duration {
                Some(length) => self.timer.schedule(length.saturating_add(self.video_buffer)),
                None => {
                    debug!(item = %clip.locator, "clip length unknown; waiting for it to end");
                    self.timer.cancel();
                }
            },
            None => {
                let after = self.durations.effective(&mut self.rng);
                self.timer.schedule(after);
            }
        }
    }

    fn report_once(&mut self, message: &str) {
        if self.reported {
            debug!(%message, "error already reported");
            return;
        }
        self.reported = true;
        for consumer in self.consumers.values_mut() {
            consumer.presenter.report_error(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::search::{RemoteMatch, SearchClient, SearchPage, SearchRequest};
    use crate::tasks::remote::RemoteSearch;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Show(usize, String),
        PauseVideo,
        ResumeVideo,
        Error(String),
    }

    #[derive(Clone)]
    struct Recorder {
        slots: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<Seen>>>,
    }

    impl Recorder {
        fn new(slots: usize) -> Self {
            Self {
                slots: Arc::new(AtomicUsize::new(slots)),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn seen(&self) -> Vec<Seen> {
            self.log.lock().expect("log lock").clone()
        }

        fn shown(&self) -> Vec<String> {
            self.seen()
                .into_iter()
                .filter_map(|s| match s {
                    Seen::Show(_, id) => Some(id),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, seen: Seen) {
            self.log.lock().expect("log lock").push(seen);
        }
    }

    impl Presenter for Recorder {
        fn slot_count(&self) -> usize {
            self.slots.load(Ordering::SeqCst)
        }
        fn show(&mut self, slot: usize, item: &Arc<MediaItem>) {
            self.push(Seen::Show(slot, item.id.clone()));
        }
        fn pause_video(&mut self) {
            self.push(Seen::PauseVideo);
        }
        fn resume_video(&mut self) {
            self.push(Seen::ResumeVideo);
        }
        fn report_error(&mut self, message: &str) {
            self.push(Seen::Error(message.to_string()));
        }
    }

    struct Fixed {
        matches: Vec<RemoteMatch>,
        fail: bool,
    }

    impl SearchClient for Fixed {
        fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage, SearchError> {
            if self.fail {
                return Err(SearchError::Transport("connection refused".into()));
            }
            let start = (request.first_index - 1).min(self.matches.len());
            let end = (start + request.page_size).min(self.matches.len());
            Ok(SearchPage {
                total_matches: self.matches.len(),
                items: self.matches[start..end].to_vec(),
                error: None,
            })
        }
    }

    /// Serves the first page at once and holds every later page until the
    /// gate sender is dropped.
    struct Gated {
        matches: Vec<RemoteMatch>,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl SearchClient for Gated {
        fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage, SearchError> {
            if request.first_index > 1 {
                let _ = self.gate.lock().expect("gate lock").recv();
            }
            let start = (request.first_index - 1).min(self.matches.len());
            let end = (start + request.page_size).min(self.matches.len());
            Ok(SearchPage {
                total_matches: self.matches.len(),
                items: self.matches[start..end].to_vec(),
                error: None,
            })
        }
    }

    fn image(n: usize) -> RemoteMatch {
        RemoteMatch {
            id: format!("i{n}"),
            url: format!("http://h/{n}.jpg"),
            ..RemoteMatch::default()
        }
    }

    fn video(n: usize, seconds: Option<f64>) -> RemoteMatch {
        RemoteMatch {
            id: format!("v{n}"),
            url: format!("http://h/{n}.mp4"),
            media_type: Some("video".into()),
            duration_seconds: seconds,
            ..RemoteMatch::default()
        }
    }

    fn engine_with(
        matches: Vec<RemoteMatch>,
        fail: bool,
        slots: usize,
    ) -> (PlaybackEngine, mpsc::Receiver<SourceEvent>, Recorder) {
        let client = Arc::new(Fixed { matches, fail });
        let source = ContentSource::RemoteSearch(RemoteSearch::new("http://h", "q", 100, client));
        let mut settings = EngineSettings::new(SlideDurations::new(5.0, None));
        settings.seed = Some(42);
        let (mut engine, rx) = PlaybackEngine::new(source, settings);
        let recorder = Recorder::new(slots);
        engine.attach(ConsumerId(0), Box::new(recorder.clone()));
        (engine, rx, recorder)
    }

    /// Feed source events until the current cycle completes.
    async fn pump(engine: &mut PlaybackEngine, rx: &mut mpsc::Receiver<SourceEvent>) {
        loop {
            let event = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("source event in time")
                .expect("source channel open");
            let done = matches!(event, SourceEvent::Complete { .. });
            engine.on_source_event(event);
            if done {
                break;
            }
        }
    }

    const ME: ConsumerId = ConsumerId(0);

    #[tokio::test]
    async fn fills_every_slot_when_items_arrive() {
        let (mut engine, mut rx, recorder) = engine_with((0..10).map(image).collect(), false, 4);
        engine.start();
        assert_eq!(engine.state(), EngineState::Created);
        pump(&mut engine, &mut rx).await;

        assert_eq!(engine.state(), EngineState::Playing);
        let slots: Vec<usize> = recorder
            .seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Show(slot, _) => Some(slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(engine.timer().is_armed());
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(5)));
        assert_eq!(*engine.subscribe().borrow(), EngineState::Playing);
    }

    #[tokio::test]
    async fn cycle_never_repeats_and_then_reenumerates() {
        let (mut engine, mut rx, recorder) = engine_with((0..5).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        for _ in 0..4 {
            engine.on_timer_fired();
        }
        let mut first_cycle = recorder.shown();
        first_cycle.sort();
        assert_eq!(first_cycle, vec!["i0", "i1", "i2", "i3", "i4"]);
        assert_eq!(engine.current_index(ME), 5);

        engine.on_timer_fired();
        assert_eq!(recorder.shown().len(), 5, "nothing left until the next cycle");
        pump(&mut engine, &mut rx).await;
        assert_eq!(engine.pool().cycle(), 2);
        assert_eq!(recorder.shown().len(), 6);
        assert_eq!(engine.current_index(ME), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ticks_while_a_page_is_pending_advance_once() {
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let client = Arc::new(Gated {
            matches: (0..6).map(image).collect(),
            gate: Mutex::new(gate),
        });
        let source = ContentSource::RemoteSearch(RemoteSearch::new("http://h", "q", 1, client));
        let mut settings = EngineSettings::new(SlideDurations::new(5.0, None));
        settings.seed = Some(9);
        let (mut engine, mut rx) = PlaybackEngine::new(source, settings);
        let recorder = Recorder::new(1);
        engine.attach(ME, Box::new(recorder.clone()));

        engine.start();
        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first item in time")
            .expect("source channel open");
        assert!(matches!(first, SourceEvent::FirstAvailable { .. }));
        engine.on_source_event(first);
        assert_eq!(recorder.shown().len(), 1);

        for _ in 0..3 {
            engine.on_timer_fired();
            assert!(!engine.timer().is_armed(), "no ticks while waiting for items");
        }
        engine.next(ME);
        assert_eq!(recorder.shown().len(), 1);
        assert_eq!(engine.pool().cycle(), 1);

        drop(release);
        pump(&mut engine, &mut rx).await;
        assert_eq!(recorder.shown().len(), 2, "one pending advance, served once");
        assert!(engine.timer().is_armed());
        assert_eq!(engine.current_index(ME), 2);
    }

    #[tokio::test]
    async fn previous_and_next_replay_history() {
        let (mut engine, mut rx, recorder) = engine_with((0..10).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        engine.on_timer_fired();
        engine.on_timer_fired();
        let live = recorder.shown();
        let (a, b, c) = (live[0].clone(), live[1].clone(), live[2].clone());

        engine.previous(ME);
        engine.previous(ME);
        assert_eq!(engine.current_index(ME), 1);
        engine.next(ME);
        assert_eq!(engine.current_index(ME), 2);

        let shown = recorder.shown();
        assert_eq!(shown[3..], [b.clone(), a, b]);
        engine.next(ME);
        assert_eq!(recorder.shown().last(), Some(&c));
        assert_eq!(engine.current_index(ME), 3);
        engine.next(ME);
        assert!(!engine.history(ME).expect("history").is_replaying());
        assert_eq!(recorder.shown().len(), 8);
        assert_eq!(engine.current_index(ME), 4);
    }

    #[tokio::test]
    async fn previous_at_oldest_rearms_timer() {
        let (mut engine, mut rx, recorder) = engine_with((0..3).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        engine.previous(ME);
        assert_eq!(recorder.shown().len(), 1);
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn pause_is_idempotent_and_play_advances() {
        let (mut engine, mut rx, recorder) = engine_with((0..10).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;

        engine.pause();
        engine.pause();
        assert_eq!(engine.state(), EngineState::Paused);
        assert!(!engine.timer().is_armed());
        engine.on_timer_fired();
        engine.next(ME);
        assert_eq!(recorder.shown().len(), 1);

        engine.play();
        assert_eq!(engine.state(), EngineState::Playing);
        assert_eq!(recorder.shown().len(), 2);
        assert!(engine.timer().is_armed());
    }

    #[tokio::test]
    async fn stop_drops_all_later_input() {
        let (mut engine, mut rx, recorder) = engine_with((0..10).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!engine.timer().is_armed());

        engine.on_timer_fired();
        engine.on_command(EngineCommand::Next(ME));
        engine.on_command(EngineCommand::Play);
        engine.on_source_event(SourceEvent::FirstAvailable {
            cycle: engine.pool().cycle(),
        });
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(recorder.shown().len(), 1);
        assert_eq!(engine.pool().total(), 0);
    }

    #[tokio::test]
    async fn videos_use_clip_length_and_pause_resume() {
        let (mut engine, mut rx, recorder) = engine_with(vec![video(1, Some(2.0))], false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(5)));

        engine.pause();
        engine.play();
        assert_eq!(
            recorder.seen(),
            vec![
                Seen::Show(0, "v1".into()),
                Seen::PauseVideo,
                Seen::ResumeVideo
            ]
        );
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn video_of_unknown_length_waits_for_its_end() {
        let mut matches = vec![video(1, None)];
        matches.extend((0..3).map(image));
        let (mut engine, mut rx, recorder) = engine_with(matches, false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;

        // Drive until the clip is on screen.
        while !engine.current_item(ME).is_some_and(|item| item.is_video()) {
            engine.on_timer_fired();
        }
        assert!(!engine.timer().is_armed());

        let before = recorder.shown().len();
        let exhausted = engine.pool().is_exhausted();
        engine.video_ended(ME);
        if exhausted {
            pump(&mut engine, &mut rx).await;
        }
        assert_eq!(recorder.shown().len(), before + 1);
    }

    #[tokio::test]
    async fn stale_video_end_is_ignored() {
        let (mut engine, mut rx, recorder) = engine_with((0..3).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        engine.video_ended(ME);
        assert_eq!(recorder.shown().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_once() {
        let (mut engine, mut rx, recorder) = engine_with(Vec::new(), true, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        let errors: Vec<_> = recorder
            .seen()
            .into_iter()
            .filter(|s| matches!(s, Seen::Error(_)))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Seen::Error(m) if m.contains("connection refused")));
        assert_eq!(engine.state(), EngineState::Created);
    }

    #[tokio::test]
    async fn empty_source_reports_no_media() {
        let (mut engine, mut rx, recorder) = engine_with(Vec::new(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        assert_eq!(recorder.seen(), vec![Seen::Error(NO_MEDIA_MESSAGE.into())]);
        assert_eq!(engine.state(), EngineState::Created);
    }

    #[tokio::test]
    async fn duration_adjustment_has_a_floor() {
        let (mut engine, mut rx, _) = engine_with((0..3).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        engine.adjust_duration(2.0);
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(7)));
        engine.adjust_duration(-100.0);
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(1)));
        engine.adjust_duration(1e20);
        assert_eq!(engine.durations().override_seconds, MAX_SLIDE_SECONDS);
        assert_eq!(engine.timer().period(), Some(Duration::from_secs(86_400)));
    }

    #[tokio::test]
    async fn growing_slot_count_fills_new_slots() {
        let (mut engine, mut rx, recorder) = engine_with((0..10).map(image).collect(), false, 1);
        engine.start();
        pump(&mut engine, &mut rx).await;
        recorder.slots.store(3, Ordering::SeqCst);
        engine.on_command(EngineCommand::SlotsChanged(ME));
        assert_eq!(recorder.shown().len(), 4);
        engine.on_command(EngineCommand::SlotsChanged(ME));
        assert_eq!(recorder.shown().len(), 4);
    }
}
