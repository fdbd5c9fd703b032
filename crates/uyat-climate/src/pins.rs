//! Digital sensing inputs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A digital input pin provided by the host
pub trait DigitalInput: Send {
    /// Prepare the pin for reading
    fn setup(&mut self) {}

    /// Current logic level
    fn digital_read(&mut self) -> bool;

    /// Short description for config dumps
    fn describe(&self) -> String;
}

/// Input backed by a shared flag
///
/// Clones share the level, so one copy can be handed to a climate while
/// another drives it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPin {
    pin: u8,
    level: Arc<AtomicBool>,
}

impl SimulatedPin {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Drive the level
    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::SeqCst);
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

impl DigitalInput for SimulatedPin {
    fn digital_read(&mut self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        format!("GPIO{} (simulated)", self.pin)
    }
}

/// Heating and cooling sensing pins, either optional
#[derive(Default)]
pub struct StatePins {
    pub heating: Option<Box<dyn DigitalInput>>,
    pub cooling: Option<Box<dyn DigitalInput>>,
}

/// A sensing pin and the level it was last read at
pub(crate) struct StatePin {
    name: &'static str,
    input: Box<dyn DigitalInput>,
    level: bool,
}

impl StatePin {
    pub(crate) fn new(name: &'static str, input: Box<dyn DigitalInput>) -> Self {
        Self {
            name,
            input,
            level: false,
        }
    }

    pub(crate) fn setup(&mut self) {
        self.input.setup();
        self.level = self.input.digital_read();
    }

    /// Read the pin; returns whether the level changed
    pub(crate) fn poll(&mut self) -> bool {
        let level = self.input.digital_read();
        if level == self.level {
            return false;
        }
        debug!("{} state pin changed to {}", self.name, if level { "ON" } else { "OFF" });
        self.level = level;
        true
    }

    pub(crate) fn level(&self) -> bool {
        self.level
    }

    pub(crate) fn describe(&self) -> String {
        self.input.describe()
    }
}
