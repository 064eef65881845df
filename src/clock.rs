//! Phase clock and suspension.
//!
//! Every timestamp in a trial record is taken from a [`PhaseClock`]. The
//! clock reads a pluggable [`TimeSource`] so that collaborators stamping
//! their own events (e.g. a response `time` field) can share the same
//! time base as the trial.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Source of "now" in milliseconds.
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds on this source's time base.
    fn now_ms(&self) -> i64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Milliseconds since the source was created, on tokio's clock.
///
/// Follows paused and advanced time in `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Creates a source whose zero is the current tokio instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioClock {
    fn now_ms(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Trial clock: remembers the trial start and reports elapsed time.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    source: Arc<dyn TimeSource>,
    start: Option<i64>,
}

impl PhaseClock {
    /// Creates a clock over the given source.
    #[must_use]
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            source,
            start: None,
        }
    }

    /// Clock over wall time.
    #[must_use]
    pub fn wall() -> Self {
        Self::new(Arc::new(WallClock))
    }

    /// The underlying source, for collaborators that need the same time base.
    #[must_use]
    pub fn source(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&self.source)
    }

    /// Current time on the source's time base.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.source.now_ms()
    }

    /// Marks the trial start and returns it.
    ///
    /// The start is only ever set once; later calls return the first value.
    pub fn start(&mut self) -> i64 {
        *self.start.get_or_insert_with(|| self.source.now_ms())
    }

    /// The start mark, if the trial has begun.
    #[must_use]
    pub const fn started_at(&self) -> Option<i64> {
        self.start
    }

    /// Milliseconds elapsed since the start mark (0 before the start).
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.start.map_or(0, |start| self.now_ms() - start)
    }
}

/// Suspends for `duration`, yielding to the scheduler.
///
/// `None` and zero durations return immediately.
pub async fn wait(duration: Option<Duration>) {
    if let Some(duration) = duration.filter(|d| !d.is_zero()) {
        tokio::time::sleep(duration).await;
    }
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_is_set_once() {
        let mut clock = PhaseClock::new(Arc::new(TokioClock::new()));
        assert_eq!(clock.started_at(), None);
        let first = clock.start();

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(clock.start(), first);
        assert_eq!(clock.started_at(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_tracks_tokio_time() {
        let mut clock = PhaseClock::new(Arc::new(TokioClock::new()));
        assert_eq!(clock.elapsed_ms(), 0);
        clock.start();

        tokio::time::advance(Duration::from_millis(125)).await;
        assert_eq!(clock.elapsed_ms(), 125);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_duration() {
        let before = Instant::now();
        wait(Some(Duration::from_millis(500))).await;
        assert!(before.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_none_returns_immediately() {
        let before = Instant::now();
        wait(None).await;
        wait(Some(Duration::ZERO)).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_wall_clock_is_epoch_millis() {
        // 2020-01-01T00:00:00Z
        assert!(WallClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(42)), 42);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
