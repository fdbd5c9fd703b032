//! Acknowledgement-driven resend of outbound writes

use tracing::{debug, error, warn};
use uyat_core::RetryConfig;
use uyat_dispatch::DatapointSink;

/// What the owner of a retry timer has to do when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Resend the last attempted value with `already_in_retry_sequence` set
    Resend,
    /// No retries left; the timer has been canceled
    Exhausted,
    /// Nothing outstanding
    Idle,
}

/// Retry coordinator for one write-capable datapoint
///
/// `Idle -> Armed -> {Canceled | Exhausted}`. The timer armed by
/// [`schedule_if_needed`](Self::schedule_if_needed) fires at a fixed
/// interval; each fire spends one retry until none are left.
#[derive(Debug, Clone)]
pub struct DatapointRetry {
    number: u8,
    config: RetryConfig,
    retries_left: u8,
    armed: bool,
}

impl DatapointRetry {
    pub fn new(number: u8, config: RetryConfig) -> Self {
        Self {
            number,
            config,
            retries_left: 0,
            armed: false,
        }
    }

    /// Arm the timer for a fresh write
    ///
    /// Does nothing for resends, when retries are off, or when the write
    /// does not change the last confirmed value. Returns whether it armed.
    pub fn schedule_if_needed(
        &mut self,
        sink: &mut dyn DatapointSink,
        already_in_retry_sequence: bool,
        value_changed: bool,
    ) -> bool {
        if already_in_retry_sequence || !self.config.is_active() || !value_changed {
            return false;
        }

        self.retries_left = self.config.count;
        self.armed = true;
        debug!(
            dp = self.number,
            "Scheduling retry timeout: {}ms ({} retries left)",
            self.config.timeout.as_millis(),
            self.retries_left
        );
        sink.schedule_retry_timeout(self.number, self.config.timeout);
        true
    }

    /// Stop the outstanding sequence, if any
    pub fn cancel(&mut self, sink: &mut dyn DatapointSink) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.retries_left = 0;
        sink.cancel_retry_timeout(self.number);
        debug!(dp = self.number, "Canceled retry timeout");
    }

    /// The timer fired
    pub fn on_timeout(&mut self, sink: &mut dyn DatapointSink) -> RetryStep {
        if !self.armed {
            return RetryStep::Idle;
        }

        if self.retries_left == 0 {
            error!(dp = self.number, "Retry timeout: no retries left");
            self.armed = false;
            sink.cancel_retry_timeout(self.number);
            return RetryStep::Exhausted;
        }

        self.retries_left -= 1;
        warn!(
            dp = self.number,
            "MCU did not confirm value, retrying send ({} retries left)", self.retries_left
        );
        RetryStep::Resend
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn retries_left(&self) -> u8 {
        self.retries_left
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use std::time::Duration;

    fn enabled(count: u8) -> RetryConfig {
        RetryConfig::enabled(count, Duration::from_millis(100))
    }

    #[test]
    fn test_schedule_arms_timer() {
        let mut sink = RecordingSink::default();
        let mut retry = DatapointRetry::new(4, enabled(2));

        assert!(retry.schedule_if_needed(&mut sink, false, true));

        assert!(retry.is_armed());
        assert_eq!(retry.retries_left(), 2);
        assert_eq!(sink.scheduled, vec![(4, Duration::from_millis(100))]);
    }

    #[test]
    fn test_schedule_skipped() {
        let mut sink = RecordingSink::default();

        let mut retry = DatapointRetry::new(4, enabled(2));
        assert!(!retry.schedule_if_needed(&mut sink, true, true));
        assert!(!retry.schedule_if_needed(&mut sink, false, false));

        let mut disabled = DatapointRetry::new(4, RetryConfig::disabled());
        assert!(!disabled.schedule_if_needed(&mut sink, false, true));

        let mut zero = DatapointRetry::new(4, enabled(0));
        assert!(!zero.schedule_if_needed(&mut sink, false, true));

        assert!(sink.scheduled.is_empty());
    }

    #[test]
    fn test_exactly_count_resends() {
        let mut sink = RecordingSink::default();
        let mut retry = DatapointRetry::new(4, enabled(3));
        retry.schedule_if_needed(&mut sink, false, true);

        let steps: Vec<RetryStep> = (0..6).map(|_| retry.on_timeout(&mut sink)).collect();

        assert_eq!(
            steps,
            vec![
                RetryStep::Resend,
                RetryStep::Resend,
                RetryStep::Resend,
                RetryStep::Exhausted,
                RetryStep::Idle,
                RetryStep::Idle,
            ]
        );
        assert_eq!(sink.canceled, vec![4]);
        assert!(!retry.is_armed());
    }

    #[test]
    fn test_cancel_only_when_armed() {
        let mut sink = RecordingSink::default();
        let mut retry = DatapointRetry::new(9, enabled(3));

        retry.cancel(&mut sink);
        assert!(sink.canceled.is_empty());

        retry.schedule_if_needed(&mut sink, false, true);
        retry.cancel(&mut sink);
        assert_eq!(sink.canceled, vec![9]);
        assert_eq!(retry.on_timeout(&mut sink), RetryStep::Idle);
    }

    #[test]
    fn test_new_write_resets_budget() {
        let mut sink = RecordingSink::default();
        let mut retry = DatapointRetry::new(1, enabled(2));
        retry.schedule_if_needed(&mut sink, false, true);
        retry.on_timeout(&mut sink);
        assert_eq!(retry.retries_left(), 1);

        retry.schedule_if_needed(&mut sink, false, true);
        assert_eq!(retry.retries_left(), 2);
    }
}
