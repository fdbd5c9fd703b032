//! Retry policy for outbound datapoint writes

use crate::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Acknowledgement-driven retry policy, fixed at adapter construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether unacknowledged writes are resent at all
    pub enabled: bool,
    /// Maximum number of resends per write
    pub count: u8,
    /// Interval between resends
    pub timeout: Duration,
}

impl RetryConfig {
    /// Retries switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            count: DEFAULT_RETRY_COUNT,
            timeout: Duration::from_millis(DEFAULT_RETRY_TIMEOUT_MS),
        }
    }

    /// Retries switched on with the given count and interval
    pub fn enabled(count: u8, timeout: Duration) -> Self {
        Self {
            enabled: true,
            count,
            timeout,
        }
    }

    /// Whether a write under this policy can ever be resent
    pub fn is_active(&self) -> bool {
        self.enabled && self.count > 0
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.count, 3);
        assert_eq!(config.timeout, Duration::from_millis(300));
        assert!(!config.is_active());
    }

    #[test]
    fn test_zero_count_is_inactive() {
        assert!(!RetryConfig::enabled(0, Duration::from_millis(100)).is_active());
        assert!(RetryConfig::enabled(1, Duration::from_millis(100)).is_active());
    }
}
