//! Core types for the uyat datapoint bridge
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: the datapoint value model exchanged with the appliance MCU,
//! the matcher that binds a logical entity to a datapoint, the retry policy
//! for outbound writes and the entity identifiers used by the host framework.

mod datapoint;
mod entity_id;
mod error;
mod matching;
mod retry;

pub use datapoint::{DatapointRecord, DatapointType, DatapointValue};
pub use entity_id::{EntityId, EntityIdError, EntityKind};
pub use error::DatapointError;
pub use matching::{MatchingDatapoint, TypeResolution};
pub use retry::RetryConfig;

/// Number of resends attempted when retries are enabled without an explicit count
pub const DEFAULT_RETRY_COUNT: u8 = 3;

/// Acknowledgement timeout used when retries are enabled without an explicit timeout
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 300;
