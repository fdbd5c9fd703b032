//! Read-only text entity

use serde::{Deserialize, Serialize};
use tracing::info;
use uyat_adapters::DpTextSensor;
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSensorState {
    pub value: String,
}

impl EntityState for TextSensorState {
    fn kind() -> EntityKind {
        EntityKind::TextSensor
    }
}

pub struct TextSensor {
    id: EntityId,
    text: DpTextSensor,
}

impl TextSensor {
    pub fn new(id: EntityId, text: DpTextSensor) -> Self {
        Self { id, text }
    }

    pub fn value(&self) -> Option<&str> {
        self.text.last_value()
    }
}

impl Entity for TextSensor {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.text.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if let Some(value) = self.text.handle(record) {
            ctx.publish(&self.id, &TextSensorState { value });
        }
    }

    fn on_retry_timeout(&mut self, _number: u8, _ctx: &mut EntityContext<'_>) {}

    fn control(&mut self, call: &ControlCall, _ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        Err(crate::read_only(call))
    }

    fn dump_config(&self) {
        info!("Uyat Text Sensor '{}': {}", self.id, self.text);
    }
}
