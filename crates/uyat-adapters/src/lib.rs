//! Generic datapoint adapters for the uyat bridge
//!
//! Each adapter binds one logical value to one datapoint number. Adapters
//! are plain values owned by their entity:
//! - `init` registers the datapoint number with the handler
//! - `handle` validates, resolves and decodes an inbound record and returns
//!   the accepted value for the entity to react to
//! - `set_value` encodes and sends a write, arming the retry coordinator
//! - `on_retry_timeout` resends the last write until it is acknowledged
//!
//! Nothing here is fatal: type mismatches and decode failures are logged
//! and the record is dropped, keeping the previously known value.

mod color;
mod dimmer;
mod number;
mod retry;
mod sensor;
mod switch;
mod text_sensor;
mod vap;

#[cfg(test)]
mod testing;

pub use color::{ColorEncoding, DpColor, Rgb};
pub use dimmer::DpDimmer;
pub use number::DpNumber;
pub use retry::{DatapointRetry, RetryStep};
pub use sensor::DpSensor;
pub use switch::DpSwitch;
pub use text_sensor::DpTextSensor;
pub use vap::{DpVap, VapValue};
