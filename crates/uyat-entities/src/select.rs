//! Option select over an enum or uint datapoint

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uyat_adapters::DpNumber;
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectState {
    pub option: String,
}

impl EntityState for SelectState {
    fn kind() -> EntityKind {
        EntityKind::Select
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
}

/// Maps device codes to named options
pub struct Select {
    id: EntityId,
    number: DpNumber,
    /// `(code, option)` in configuration order
    options: Vec<(u32, String)>,
    /// Publish the requested option without waiting for the MCU
    optimistic: bool,
    option: Option<String>,
}

impl Select {
    pub fn new(id: EntityId, number: DpNumber, options: Vec<(u32, String)>) -> Self {
        Self {
            id,
            number,
            options,
            optimistic: false,
            option: None,
        }
    }

    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(_, option)| option.as_str())
    }

    /// Currently selected option
    pub fn option(&self) -> Option<&str> {
        self.option.as_deref()
    }

    fn option_for(&self, code: u32) -> Option<&str> {
        self.options
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, option)| option.as_str())
    }

    fn code_for(&self, option: &str) -> Option<u32> {
        self.options
            .iter()
            .find(|(_, o)| o == option)
            .map(|(code, _)| *code)
    }
}

impl Entity for Select {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.number.init(registry);
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        if self.number.handle(record, ctx).is_none() {
            return;
        }
        let Some(code) = self.number.last_received_raw() else {
            return;
        };
        match self.option_for(code).map(str::to_string) {
            Some(option) => {
                debug!(entity_id = %self.id, "MCU reported select option {} ({})", option, code);
                ctx.publish(&self.id, &SelectState { option: option.clone() });
                self.option = Some(option);
            }
            None => warn!(entity_id = %self.id, "Invalid select code {}", code),
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        self.number.on_retry_timeout(number, ctx);
    }

    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: SelectCall = call.parse()?;
        let Some(option) = call.option else {
            return Ok(());
        };
        let Some(code) = self.code_for(&option) else {
            warn!(entity_id = %self.id, "Invalid select option '{}'", option);
            return Ok(());
        };

        debug!(entity_id = %self.id, "Setting select option {} ({})", option, code);
        self.number.set_raw(code, ctx);
        if self.optimistic {
            ctx.publish(&self.id, &SelectState { option: option.clone() });
            self.option = Some(option);
        }
        Ok(())
    }

    fn dump_config(&self) {
        info!("Uyat Select '{}': {}", self.id, self.number);
        for (code, option) in &self.options {
            info!("  {} = {}", code, option);
        }
        if self.optimistic {
            info!("  Optimistic: YES");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uyat_core::{DatapointType, MatchingDatapoint, RetryConfig};

    #[test]
    fn test_option_lookup() {
        let select = Select::new(
            EntityId::new(EntityKind::Select, "program").unwrap(),
            DpNumber::plain(
                MatchingDatapoint::single(7, DatapointType::Enum),
                RetryConfig::disabled(),
            ),
            vec![(0, "eco".to_string()), (1, "comfort".to_string())],
        );

        assert_eq!(select.option_for(1), Some("comfort"));
        assert_eq!(select.option_for(2), None);
        assert_eq!(select.code_for("eco"), Some(0));
        assert_eq!(select.code_for("turbo"), None);
        assert_eq!(select.options().collect::<Vec<_>>(), vec!["eco", "comfort"]);
        assert_eq!(select.option(), None);
    }
}
