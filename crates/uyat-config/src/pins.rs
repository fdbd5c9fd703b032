//! Digital pin provisioning for climate state pins

use dashmap::DashMap;
use uyat_climate::{DigitalInput, SimulatedPin};

/// Hands out digital inputs by pin number
///
/// The host implements this for its GPIO layer; the builder asks for one
/// input per configured pin.
pub trait PinFactory {
    fn input_pin(&self, pin: u8) -> Box<dyn DigitalInput>;
}

/// Pin factory backed by simulated pins
///
/// Every request for the same pin number shares one level, so callers can
/// drive a pin through [`SimulatedPinFactory::pin`] after the entities are built.
#[derive(Debug, Default)]
pub struct SimulatedPinFactory {
    pins: DashMap<u8, SimulatedPin>,
}

impl SimulatedPinFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on a pin, created low on first use
    pub fn pin(&self, pin: u8) -> SimulatedPin {
        self.pins
            .entry(pin)
            .or_insert_with(|| SimulatedPin::new(pin))
            .clone()
    }

    /// Number of distinct pins handed out
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl PinFactory for SimulatedPinFactory {
    fn input_pin(&self, pin: u8) -> Box<dyn DigitalInput> {
        Box::new(self.pin(pin))
    }
}
