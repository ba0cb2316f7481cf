//! Slide timing: how long an item stays up, and the single advance timer.

use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep_until};

/// Shortest time any slide stays on screen, whatever the override says.
pub const MIN_SLIDE_SECONDS: f64 = 1.0;

/// Longest time the timer waits for anything, slides and clips alike.
pub const MAX_SLIDE_SECONDS: f64 = 86_400.0;
const MAX_PERIOD: Duration = Duration::from_secs(86_400);

/// Extra time granted to a video on top of its clip length before the
/// fallback timer advances past it.
pub const DEFAULT_VIDEO_BUFFER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct SlideDurations {
    pub slide_seconds: f64,
    /// Upper bound for the random jitter; equal to or below the base means
    /// no jitter.
    pub slide_seconds_max: Option<f64>,
    /// User adjustment added after jitter; may be negative.
    pub override_seconds: f64,
}

impl SlideDurations {
    pub fn new(slide_seconds: f64, slide_seconds_max: Option<f64>) -> Self {
        Self {
            slide_seconds,
            slide_seconds_max,
            override_seconds: 0.0,
        }
    }

    /// Seconds the next image should stay up.
    ///
    /// The jitter is a whole number of seconds in `[0, max - base]` added to
    /// the (possibly fractional) base.
    pub fn effective_seconds<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let base = self.slide_seconds;
        let spread = self
            .slide_seconds_max
            .map_or(0, |max| (max - base).floor() as i64);
        let jitter = if spread > 0 {
            rng.random_range(0..=spread) as f64
        } else {
            0.0
        };
        let secs = base + jitter + self.override_seconds;
        if secs.is_nan() {
            return MIN_SLIDE_SECONDS;
        }
        secs.clamp(MIN_SLIDE_SECONDS, MAX_SLIDE_SECONDS)
    }

    pub fn effective<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::try_from_secs_f64(self.effective_seconds(rng)).unwrap_or(MAX_PERIOD)
    }
}

/// The engine's one advance timer.
///
/// Scheduling replaces any earlier deadline, so there is never more than one
/// pending advance. The engine loop reads [`SlideTimer::deadline`] each turn
/// and sleeps on it with [`wait_for`].
#[derive(Debug, Default)]
pub struct SlideTimer {
    deadline: Option<Instant>,
    period: Option<Duration>,
}

impl SlideTimer {
    /// Arm for `after`, capped at a day.
    pub fn schedule(&mut self, after: Duration) {
        let after = after.min(MAX_PERIOD);
        self.deadline = Some(Instant::now() + after);
        self.period = Some(after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.period = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Interval used by the most recent `schedule`, while armed.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Mark the pending deadline as consumed.
    pub fn fire(&mut self) {
        self.deadline = None;
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn override_cannot_push_below_floor() {
        let mut durations = SlideDurations::new(10.0, None);
        durations.override_seconds = -1000.0;
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(durations.effective_seconds(&mut rng), 1.0);
        assert_eq!(durations.effective(&mut rng), Duration::from_secs(1));
    }

    #[test]
    fn oversized_durations_are_capped() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut durations = SlideDurations::new(5.0, None);
        durations.override_seconds = 1e20;
        assert_eq!(durations.effective(&mut rng), Duration::from_secs(86_400));

        let huge = SlideDurations::new(1e30, Some(1e31));
        assert_eq!(huge.effective_seconds(&mut rng), MAX_SLIDE_SECONDS);

        let mut timer = SlideTimer::default();
        timer.schedule(Duration::MAX);
        assert_eq!(timer.period(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn no_jitter_when_max_matches_base() {
        let durations = SlideDurations::new(7.5, Some(7.5));
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(durations.effective_seconds(&mut rng), 7.5);
        }
    }

    #[test]
    fn jitter_is_whole_seconds_within_range() {
        let durations = SlideDurations::new(4.5, Some(8.0));
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            let secs = durations.effective_seconds(&mut rng);
            let offset = secs - 4.5;
            assert!((0.0..=3.0).contains(&offset), "offset {offset} out of range");
            assert_eq!(offset.fract(), 0.0);
            seen.insert(offset as i64);
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn override_applies_after_jitter() {
        let mut durations = SlideDurations::new(5.0, None);
        durations.override_seconds = 2.5;
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(durations.effective_seconds(&mut rng), 7.5);
    }

    #[test]
    fn schedule_replaces_previous_deadline() {
        let mut timer = SlideTimer::default();
        assert!(!timer.is_armed());
        timer.schedule(Duration::from_secs(60));
        let first = timer.deadline();
        timer.schedule(Duration::from_secs(1));
        assert!(timer.deadline() < first);
        assert_eq!(timer.period(), Some(Duration::from_secs(1)));
        timer.cancel();
        assert!(!timer.is_armed());
        assert_eq!(timer.period(), None);
    }
}
