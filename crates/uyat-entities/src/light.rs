//! Light entity: binary, dimmable, tunable white and color lights
//!
//! A light always has a switch. A brightness dimmer, a white temperature
//! dimmer and a color datapoint are added on top; which of them are present
//! decides the color modes the light reports.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uyat_adapters::{DpColor, DpDimmer, DpNumber, DpSwitch, Rgb};
use uyat_core::{DatapointRecord, EntityId, EntityKind};
use uyat_dispatch::{ControlCall, DispatchError, Entity, EntityContext, ListenerRegistry};
use uyat_state_bus::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    OnOff,
    Brightness,
    ColorTemperature,
    Rgb,
    RgbColorTemperature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    pub state: bool,
    /// `0.0..=1.0`
    pub brightness: Option<f32>,
    /// Mireds
    pub color_temperature: Option<f32>,
    pub rgb: Option<Rgb>,
}

impl EntityState for LightState {
    fn kind() -> EntityKind {
        EntityKind::Light
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightTraits {
    pub color_modes: Vec<ColorMode>,
    pub min_mireds: Option<f32>,
    pub max_mireds: Option<f32>,
}

/// White temperature dimmer spanning cold to warm white
///
/// Level `0.0` is the cold end; the dimmer's own `inverted` flag flips the
/// wire range if the device counts the other way.
#[derive(Debug, Clone)]
pub struct WhiteTemperature {
    dimmer: DpDimmer,
    cold_mireds: f32,
    warm_mireds: f32,
}

impl WhiteTemperature {
    /// `cold_mireds` must be below `warm_mireds`
    pub fn new(dimmer: DpDimmer, cold_mireds: f32, warm_mireds: f32) -> Self {
        Self {
            dimmer,
            cold_mireds,
            warm_mireds,
        }
    }

    pub fn mireds_for(&self, level: f32) -> f32 {
        self.cold_mireds + (self.warm_mireds - self.cold_mireds) * level
    }

    pub fn level_for(&self, mireds: f32) -> f32 {
        let span = self.warm_mireds - self.cold_mireds;
        if span <= 0.0 {
            return 0.0;
        }
        ((mireds - self.cold_mireds) / span).max(0.0).min(1.0)
    }
}

/// Brightness datapoint plus the optional datapoint holding its floor
#[derive(Debug, Clone)]
struct Brightness {
    dimmer: DpDimmer,
    min_value: Option<(DpNumber, u32)>,
    min_value_sent: bool,
}

pub struct Light {
    id: EntityId,
    switch: DpSwitch,
    brightness: Option<Brightness>,
    white: Option<WhiteTemperature>,
    color: Option<DpColor>,
    color_interlock: bool,
}

impl Light {
    /// An on/off light
    pub fn new(id: EntityId, switch: DpSwitch) -> Self {
        Self {
            id,
            switch,
            brightness: None,
            white: None,
            color: None,
            color_interlock: false,
        }
    }

    pub fn with_dimmer(mut self, dimmer: DpDimmer) -> Self {
        self.brightness = Some(Brightness {
            dimmer,
            min_value: None,
            min_value_sent: false,
        });
        self
    }

    /// Datapoint the dimmer floor `min_value` is written to once running
    ///
    /// Only takes effect together with a dimmer.
    pub fn with_min_value_datapoint(mut self, number: DpNumber, min_value: u32) -> Self {
        match &mut self.brightness {
            Some(brightness) => brightness.min_value = Some((number, min_value)),
            None => warn!(entity_id = %self.id, "Min value datapoint without a dimmer, ignored"),
        }
        self
    }

    pub fn with_white_temperature(mut self, white: WhiteTemperature) -> Self {
        self.white = Some(white);
        self
    }

    pub fn with_color(mut self, color: DpColor) -> Self {
        self.color = Some(color);
        self
    }

    /// Report color and white as separate modes
    pub fn with_color_interlock(mut self, interlock: bool) -> Self {
        self.color_interlock = interlock;
        self
    }

    pub fn traits(&self) -> LightTraits {
        let color_modes = match (&self.color, &self.white, &self.brightness) {
            (Some(_), Some(_), _) if self.color_interlock => {
                vec![ColorMode::Rgb, ColorMode::ColorTemperature]
            }
            (Some(_), Some(_), _) => vec![ColorMode::RgbColorTemperature],
            (Some(_), None, _) => vec![ColorMode::Rgb],
            (None, Some(_), _) => vec![ColorMode::ColorTemperature],
            (None, None, Some(_)) => vec![ColorMode::Brightness],
            (None, None, None) => vec![ColorMode::OnOff],
        };
        LightTraits {
            color_modes,
            min_mireds: self.white.as_ref().map(|w| w.cold_mireds),
            max_mireds: self.white.as_ref().map(|w| w.warm_mireds),
        }
    }

    /// State assembled from the last reported values
    pub fn state(&self) -> LightState {
        LightState {
            state: self.switch.last_received_value().unwrap_or(false),
            brightness: self
                .brightness
                .as_ref()
                .and_then(|b| b.dimmer.last_received_level()),
            color_temperature: self
                .white
                .as_ref()
                .and_then(|w| w.dimmer.last_received_level().map(|l| w.mireds_for(l))),
            rgb: self.color.as_ref().and_then(DpColor::last_received_value),
        }
    }

    fn write_min_value(brightness: &mut Brightness, ctx: &mut EntityContext<'_>) {
        if let Some((number, min_value)) = &mut brightness.min_value {
            if number.matcher().single_type().is_none() {
                return;
            }
            number.set_raw(*min_value, ctx);
            brightness.min_value_sent = true;
        }
    }
}

impl Entity for Light {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }

    fn setup(&mut self, registry: &mut dyn ListenerRegistry) {
        self.switch.init(registry);
        if let Some(brightness) = &mut self.brightness {
            brightness.dimmer.init(registry);
            if let Some((number, _)) = &mut brightness.min_value {
                number.init(registry);
            }
        }
        if let Some(white) = &mut self.white {
            white.dimmer.init(registry);
        }
        if let Some(color) = &mut self.color {
            color.init(registry);
        }
    }

    fn on_datapoint(&mut self, record: &DatapointRecord, ctx: &mut EntityContext<'_>) {
        let mut accepted = self.switch.handle(record, ctx).is_some();
        if let Some(brightness) = &mut self.brightness {
            accepted |= brightness.dimmer.handle(record, ctx).is_some();
            if let Some((number, min_value)) = &mut brightness.min_value {
                if number.handle(record, ctx).is_some()
                    && number.last_received_raw() != Some(*min_value)
                {
                    debug!(entity_id = %self.id, "MCU reported a different dimmer floor, rewriting {}", min_value);
                    number.set_raw(*min_value, ctx);
                    brightness.min_value_sent = true;
                }
            }
        }
        if let Some(white) = &mut self.white {
            accepted |= white.dimmer.handle(record, ctx).is_some();
        }
        if let Some(color) = &mut self.color {
            accepted |= color.handle(record, ctx).is_some();
        }

        if accepted {
            let state = self.state();
            debug!(entity_id = %self.id, ?state, "Light state");
            ctx.publish(&self.id, &state);
        }
    }

    fn on_retry_timeout(&mut self, number: u8, ctx: &mut EntityContext<'_>) {
        if self.switch.on_retry_timeout(number, ctx) {
            return;
        }
        if let Some(brightness) = &mut self.brightness {
            if brightness.dimmer.on_retry_timeout(number, ctx) {
                return;
            }
            if let Some((min_number, _)) = &mut brightness.min_value {
                if min_number.on_retry_timeout(number, ctx) {
                    return;
                }
            }
        }
        if let Some(white) = &mut self.white {
            if white.dimmer.on_retry_timeout(number, ctx) {
                return;
            }
        }
        if let Some(color) = &mut self.color {
            color.on_retry_timeout(number, ctx);
        }
    }

    /// Turning off only writes the switch
    fn control(&mut self, call: &ControlCall, ctx: &mut EntityContext<'_>) -> Result<(), DispatchError> {
        let call: LightCall = call.parse()?;

        if call.state == Some(false) {
            self.switch.set_value(false, ctx);
            return Ok(());
        }

        if let Some(level) = call.brightness {
            match &mut self.brightness {
                Some(brightness) => brightness.dimmer.set_level(level, ctx),
                None => warn!(entity_id = %self.id, "Light dimmer datapoint not configured"),
            }
        }
        if let Some(mireds) = call.color_temperature {
            match &mut self.white {
                Some(white) if mireds.is_finite() => {
                    let level = white.level_for(mireds);
                    white.dimmer.set_level(level, ctx);
                }
                Some(_) => warn!(entity_id = %self.id, "Ignoring color temperature {}", mireds),
                None => warn!(entity_id = %self.id, "Light white temperature datapoint not configured"),
            }
        }
        if let Some(rgb) = call.rgb {
            match &mut self.color {
                Some(color) => color.set_value(rgb, ctx),
                None => warn!(entity_id = %self.id, "Light color datapoint not configured"),
            }
        }
        if call.state == Some(true) {
            self.switch.set_value(true, ctx);
        }
        Ok(())
    }

    /// Writes the dimmer floor once its datapoint type is known
    fn poll(&mut self, ctx: &mut EntityContext<'_>) {
        if let Some(brightness) = &mut self.brightness {
            if !brightness.min_value_sent {
                Self::write_min_value(brightness, ctx);
            }
        }
    }

    fn dump_config(&self) {
        info!("Uyat Light '{}'", self.id);
        info!("  Switch is {}", self.switch);
        if let Some(brightness) = &self.brightness {
            info!("  Dimmer is {}", brightness.dimmer);
            if let Some((number, min_value)) = &brightness.min_value {
                info!("  Dimmer floor {} written to {}", min_value, number.matcher());
            }
        }
        if let Some(white) = &self.white {
            info!(
                "  White temperature is {}, {} to {} mireds",
                white.dimmer, white.cold_mireds, white.warm_mireds
            );
        }
        if let Some(color) = &self.color {
            info!("  Color is {}", color);
        }
    }
}
