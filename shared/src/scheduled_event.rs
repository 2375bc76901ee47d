use std::time::Duration;

use crate::types::TimeMs;

/// A fixed-cadence callback slot polled by the owning tick loop.
///
/// The event rings on its first poll and then once per `interval` of game
/// time. Missed intervals are not replayed: after a long stall it rings once
/// and re-anchors on the current time.
pub struct ScheduledEvent {
    interval_ms: TimeMs,
    next_due: Option<TimeMs>,
}

impl ScheduledEvent {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: duration_to_ms(interval),
            next_due: None,
        }
    }

    /// Returns true if the event is due at `now`, and schedules the next run
    pub fn poll(&mut self, now: TimeMs) -> bool {
        if !self.ringing(now) {
            return false;
        }
        self.next_due = Some(now.saturating_add(self.interval_ms));
        true
    }

    pub fn ringing(&self, now: TimeMs) -> bool {
        match self.next_due {
            None => true,
            Some(due) => now >= due,
        }
    }

    /// Forces the event to ring on the next poll
    pub fn ring_manual(&mut self) {
        self.next_due = None;
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval_ms = duration_to_ms(interval);
    }

    pub fn interval_ms(&self) -> TimeMs {
        self.interval_ms
    }
}

pub(crate) fn duration_to_ms(duration: Duration) -> TimeMs {
    TimeMs::try_from(duration.as_millis()).unwrap_or(TimeMs::MAX)
}
