//! Datapoint handler for the uyat bridge
//!
//! This crate provides the DatapointHandler, the process-wide router between
//! the serial transport and the hosted entities. It:
//! - Routes every inbound datapoint record to the entities registered for
//!   its number, in registration order
//! - Forwards outbound records to the transport
//! - Runs one retry timer per datapoint number for acknowledgement timeouts
//! - Routes control calls from the host framework to the target entity
//!
//! Everything runs on one task; entities are never called concurrently.

mod entity;
mod error;
mod handler;
mod timers;
mod transport;

pub use entity::{
    ControlCall, DatapointSink, Entity, EntityContext, ListenerId, ListenerRegistry,
};
pub use error::DispatchError;
pub use handler::{DatapointHandler, HandlerConfig};
pub use timers::{DueTimer, RetryTimers};
pub use transport::{ChannelTransport, Transport};

/// Default tick of the cooperative loop used for polled inputs
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
