use etude_ports::types::{PositionIndex, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub due_at: Timestamp,
    pub for_position: PositionIndex,
}

/// Owns the single live deadline of a session.
///
/// Timestamps are offsets from the session origin; nothing here reads a
/// clock.
#[derive(Debug, Default)]
pub struct TimingScheduler {
    live: Option<Deadline>,
}

impl TimingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any live deadline.
    pub fn schedule(&mut self, now: Timestamp, duration: Duration, position: PositionIndex) -> Deadline {
        let deadline = Deadline {
            due_at: now.saturating_add(duration),
            for_position: position,
        };
        self.live = Some(deadline);
        deadline
    }

    pub fn cancel(&mut self) -> Option<Deadline> {
        self.live.take()
    }

    /// Returns the deadline once when `now` reaches it, and clears it.
    pub fn poll(&mut self, now: Timestamp) -> Option<Deadline> {
        match self.live {
            Some(deadline) if now >= deadline.due_at => self.live.take(),
            _ => None,
        }
    }

    /// Time left on the live deadline, zero once it is due.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        self.live
            .map(|deadline| deadline.due_at.saturating_sub(now))
    }

    pub fn live(&self) -> Option<Deadline> {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_fires_once_at_due_time() {
        let mut timing = TimingScheduler::new();
        timing.schedule(Duration::from_millis(200), Duration::from_millis(1000), 1);

        assert_eq!(timing.poll(Duration::from_millis(1199)), None);
        assert_eq!(
            timing.remaining(Duration::from_millis(1000)),
            Some(Duration::from_millis(200))
        );

        let fired = timing.poll(Duration::from_millis(1200)).expect("due");
        assert_eq!(fired.for_position, 1);
        assert_eq!(timing.poll(Duration::from_millis(1300)), None);
        assert_eq!(timing.remaining(Duration::from_millis(1300)), None);
    }

    #[test]
    fn schedule_replaces_live_deadline() {
        let mut timing = TimingScheduler::new();
        timing.schedule(Duration::ZERO, Duration::from_millis(500), 0);
        timing.schedule(Duration::from_millis(100), Duration::from_millis(500), 1);

        assert_eq!(
            timing.live(),
            Some(Deadline {
                due_at: Duration::from_millis(600),
                for_position: 1,
            })
        );
        assert!(timing.cancel().is_some());
        assert!(timing.cancel().is_none());
    }
}
