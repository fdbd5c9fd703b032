//! On/off switch entity

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uyat_adapters::DpSwitch;
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    pub state: bool,
}

impl EntityState for SwitchState {
    fn kind() -> EntityKind {
        EntityKind::Switch
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

/// A relay or any other on/off datapoint
pub struct Switch {
    id: EntityId,
    switch: DpSwitch,
}

impl Switch {
    pub fn new(id: EntityId, switch: DpSwitch) -> Self {
        Self { id, switch }
    }

    /// Last state reported by the MCU
    pub fn state(&self) -> Option<bool> {
        self.switch.last_received_value()
    }
}

impl Entity for Switch {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.switch.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if let Some(state) = self.switch.handle(record, ctx) {
            debug!(entity_id = %self.id, "MCU reported switch is: {}", if state { "ON" } else { "OFF" });
            ctx.publish(&self.id, &SwitchState { state });
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        self.switch.on_retry_timeout(number, ctx);
    }

    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: SwitchCall = call.parse()?;
        if let Some(state) = call.state {
            self.switch.set_value(state, ctx);
        }
        Ok(())
    }

    fn dump_config(&self) {
        info!("Uyat Switch '{}': {}", self.id, self.switch);
    }
}
