//! Interruptible waiting for the next capture slot.

use chrono::{Duration, Local, NaiveDateTime};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

/// Below this many seconds remaining, re-check every second instead of
/// halving the wait.
const COARSE_SECS: i64 = 5;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The deadline was reached.
    Elapsed,
    /// Shutdown was requested before the deadline.
    Cancelled,
}

/// Wait until `deadline` on the local wall clock.
///
/// The remaining time is re-read from the clock every iteration, so the wait
/// converges geometrically (half the remaining time per sleep) until 5 s
/// remain, then polls at 1 s granularity. Overshoot past the deadline is
/// bounded by that final granularity.
///
/// Each sleep races `shutdown`; a `true` value or a dropped sender cancels
/// the wait.
pub async fn wait_until(
    deadline: NaiveDateTime,
    mut shutdown: watch::Receiver<bool>,
) -> WaitOutcome {
    if *shutdown.borrow() {
        return WaitOutcome::Cancelled;
    }

    loop {
        let now = Local::now().naive_local();
        if now >= deadline {
            return WaitOutcome::Elapsed;
        }

        let remaining = deadline - now;
        let step = sleep_increment(remaining);
        debug!(
            remaining_secs = remaining.num_seconds(),
            sleep_secs = step.num_seconds(),
            "waiting for next slot"
        );

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return WaitOutcome::Cancelled;
                }
            }
            _ = sleep(step.to_std().unwrap_or_default()) => {}
        }
    }
}

/// Sleep step for a given remaining duration: half of it while more than
/// [`COARSE_SECS`] remain, otherwise one second.
fn sleep_increment(remaining: Duration) -> Duration {
    if remaining > Duration::seconds(COARSE_SECS) {
        remaining / 2
    } else {
        Duration::seconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_while_far_from_deadline() {
        assert_eq!(
            sleep_increment(Duration::seconds(3600)),
            Duration::seconds(1800)
        );
        assert_eq!(sleep_increment(Duration::seconds(10)), Duration::seconds(5));
        assert_eq!(
            sleep_increment(Duration::seconds(6)),
            Duration::seconds(3)
        );
    }

    #[test]
    fn polls_each_second_near_deadline() {
        assert_eq!(sleep_increment(Duration::seconds(5)), Duration::seconds(1));
        assert_eq!(sleep_increment(Duration::seconds(2)), Duration::seconds(1));
        assert_eq!(
            sleep_increment(Duration::milliseconds(400)),
            Duration::seconds(1)
        );
    }

    #[test]
    fn converges_in_logarithmic_steps() {
        // Simulated wait over 12 hours: halving must reach the 1 s polling
        // band in O(log) iterations.
        let mut remaining = Duration::hours(12);
        let mut halvings = 0;
        while remaining > Duration::seconds(COARSE_SECS) {
            remaining = remaining - sleep_increment(remaining);
            halvings += 1;
            assert!(halvings < 32, "halving failed to converge");
        }
        assert!(halvings <= 16);
    }

    #[tokio::test]
    async fn past_deadline_elapses_immediately() {
        let (_tx, rx) = watch::channel(false);
        let deadline = Local::now().naive_local() - Duration::seconds(1);
        assert_eq!(wait_until(deadline, rx).await, WaitOutcome::Elapsed);
    }

    #[tokio::test]
    async fn already_requested_shutdown_cancels() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let deadline = Local::now().naive_local() + Duration::hours(1);
        assert_eq!(wait_until(deadline, rx).await, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn shutdown_during_wait_cancels() {
        let (tx, rx) = watch::channel(false);
        let deadline = Local::now().naive_local() + Duration::hours(1);

        let wait = tokio::spawn(wait_until(deadline, rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        assert_eq!(wait.await.unwrap(), WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn dropped_sender_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let deadline = Local::now().naive_local() + Duration::hours(1);
        assert_eq!(wait_until(deadline, rx).await, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn returns_only_once_deadline_passed() {
        let (_tx, rx) = watch::channel(false);
        let deadline = Local::now().naive_local() + Duration::milliseconds(1200);

        assert_eq!(wait_until(deadline, rx).await, WaitOutcome::Elapsed);
        assert!(Local::now().naive_local() >= deadline);
    }
}
