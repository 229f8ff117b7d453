//! Liveness watchdog for a "live but silent" engine.
//!
//! [`Watchdog`] owns a periodic tokio task that invokes a tick callback while
//! armed.  The decision itself is the pure function [`check`], so it can be
//! tested without timers: a session is stalled when it has produced nothing
//! for longer than the dead time, or has simply been running longer than the
//! maximum session duration.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ---------------------------------------------------------------------------
// Stall detection
// ---------------------------------------------------------------------------

/// Why the watchdog decided to recycle a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// No result for longer than the dead time.
    Silent { since_last_result: Duration },
    /// Session older than the maximum duration.
    Expired { since_start: Duration },
}

impl std::fmt::Display for StallReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StallReason::Silent { since_last_result } => {
                write!(f, "no result for {} ms", since_last_result.as_millis())
            }
            StallReason::Expired { since_start } => {
                write!(f, "session running for {} ms", since_start.as_millis())
            }
        }
    }
}

/// Evaluate one watchdog tick.
///
/// Both thresholds are strict: exactly `dead_time` of silence is still fine.
pub fn check(
    now: Instant,
    started_at: Instant,
    last_result_at: Instant,
    dead_time: Duration,
    max_session: Duration,
) -> Option<StallReason> {
    let since_last_result = now.saturating_duration_since(last_result_at);
    let since_start = now.saturating_duration_since(started_at);

    if since_last_result > dead_time {
        Some(StallReason::Silent { since_last_result })
    } else if since_start > max_session {
        Some(StallReason::Expired { since_start })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Periodic ticker, armed for one session at a time.
#[derive(Debug, Default)]
pub struct Watchdog {
    task: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `period`, replacing any previous ticker.
    ///
    /// The first tick fires one period from now.  The ticker stops by itself
    /// once `on_tick` returns `false`.
    pub fn arm<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.disarm();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));
    }

    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DEAD: Duration = Duration::from_millis(3_000);
    const MAX: Duration = Duration::from_millis(60_000);

    #[test]
    fn healthy_session_passes() {
        let t0 = Instant::now();
        let now = t0 + Duration::from_millis(2_000);
        assert_eq!(check(now, t0, t0, DEAD, MAX), None);
    }

    #[test]
    fn dead_time_is_strict() {
        let t0 = Instant::now();
        assert_eq!(check(t0 + DEAD, t0, t0, DEAD, MAX), None);

        let now = t0 + Duration::from_millis(3_001);
        assert_eq!(
            check(now, t0, t0, DEAD, MAX),
            Some(StallReason::Silent {
                since_last_result: Duration::from_millis(3_001)
            })
        );
    }

    #[test]
    fn long_session_expires_even_with_results() {
        let t0 = Instant::now();
        let now = t0 + Duration::from_millis(60_001);
        let last = now - Duration::from_millis(10);
        assert!(matches!(
            check(now, t0, last, DEAD, MAX),
            Some(StallReason::Expired { .. })
        ));
    }

    #[test]
    fn reason_display() {
        let reason = StallReason::Silent {
            since_last_result: Duration::from_millis(3_001),
        };
        assert_eq!(reason.to_string(), "no result for 3001 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_disarmed() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut watchdog = Watchdog::new();

        watchdog.arm(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(watchdog.is_armed());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        watchdog.disarm();
        assert!(!watchdog.is_armed());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_callback_declines() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut watchdog = Watchdog::new();

        watchdog.arm(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 1
        });

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(!watchdog.is_armed());
    }
}
