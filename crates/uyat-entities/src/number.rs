//! Settable numeric entity

use serde::{Deserialize, Serialize};
use tracing::info;
use uyat_adapters::DpNumber;
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberState {
    pub value: f32,
}

impl EntityState for NumberState {
    fn kind() -> EntityKind {
        EntityKind::Number
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
}

pub struct Number {
    id: EntityId,
    number: DpNumber,
}

impl Number {
    pub fn new(id: EntityId, number: DpNumber) -> Self {
        Self { id, number }
    }

    pub fn value(&self) -> Option<f32> {
        self.number.last_received_value()
    }
}

impl Entity for Number {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.number.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if let Some(value) = self.number.handle(record, ctx) {
            ctx.publish(&self.id, &NumberState { value });
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        self.number.on_retry_timeout(number, ctx);
    }

    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: NumberCall = call.parse()?;
        if let Some(value) = call.value {
            self.number.set_value(value, ctx);
        }
        Ok(())
    }

    fn dump_config(&self) {
        info!("Uyat Number '{}': {}", self.id, self.number);
    }
}
