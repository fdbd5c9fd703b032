//! Retry timers, one per datapoint number

use crate::ListenerId;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
struct RetryTimer {
    owner: ListenerId,
    interval: Duration,
    deadline: Instant,
    generation: u64,
}

/// A timer that reached its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    /// Datapoint number the timer belongs to
    pub number: u8,
    /// Listener that armed it
    pub owner: ListenerId,
    /// Generation at the time it fired
    pub generation: u64,
}

/// Periodic acknowledgement timers keyed by datapoint number
///
/// A timer keeps firing at its interval until canceled. Scheduling a number
/// that already has a timer replaces it; the replaced timer never fires again.
#[derive(Debug, Default)]
pub struct RetryTimers {
    timers: BTreeMap<u8, RetryTimer>,
    next_generation: u64,
}

impl RetryTimers {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for `number`, first firing at `now + interval`
    pub fn schedule(&mut self, number: u8, owner: ListenerId, interval: Duration, now: Instant) {
        self.next_generation += 1;
        let replaced = self
            .timers
            .insert(
                number,
                RetryTimer {
                    owner,
                    interval,
                    deadline: now + interval,
                    generation: self.next_generation,
                },
            )
            .is_some();
        trace!(dp = number, replaced, "Retry timer armed");
    }

    /// Cancel the timer for `number`; returns whether one was armed
    pub fn cancel(&mut self, number: u8) -> bool {
        let canceled = self.timers.remove(&number).is_some();
        if canceled {
            trace!(dp = number, "Retry timer canceled");
        }
        canceled
    }

    /// Whether a timer is armed for `number`
    pub fn is_armed(&self, number: u8) -> bool {
        self.timers.contains_key(&number)
    }

    /// Whether `generation` is still the live timer for `number`
    pub fn is_current(&self, number: u8, generation: u64) -> bool {
        self.timers
            .get(&number)
            .is_some_and(|t| t.generation == generation)
    }

    /// Earliest deadline among armed timers
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timer is armed
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Collect the timers due at `now` and advance them to their next deadline
    ///
    /// Deadlines advance by whole intervals so the cadence stays fixed; ticks
    /// missed because polling ran late are skipped, not replayed.
    pub fn take_due(&mut self, now: Instant) -> Vec<DueTimer> {
        let mut due = Vec::new();
        for (number, timer) in self.timers.iter_mut() {
            if timer.deadline > now {
                continue;
            }
            due.push(DueTimer {
                number: *number,
                owner: timer.owner,
                generation: timer.generation,
            });

            let mut next = timer.deadline + timer.interval;
            if next <= now {
                next = now + timer.interval;
            }
            timer.deadline = next;
        }
        due
    }
}
