//! RGB color carried as a hex string datapoint

use crate::retry::{DatapointRetry, RetryStep};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, trace, warn};
use uyat_core::{
    DatapointError, DatapointRecord, DatapointType, DatapointValue, MatchingDatapoint, RetryConfig,
};
use uyat_dispatch::{DatapointSink, ListenerRegistry};

/// Wire layout of the color string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorEncoding {
    /// `rrggbb`
    #[serde(alias = "RGB")]
    Rgb,
    /// `hhhhssssvvvv`: hue in degrees, saturation and value in `0..=1000`
    #[serde(alias = "HSV")]
    Hsv,
    /// `rrggbbhhhhssvv`: saturation and value in `0..=255`
    #[serde(alias = "RGBHSV")]
    RgbHsv,
}

impl ColorEncoding {
    fn byte_len(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Hsv => 6,
            Self::RgbHsv => 7,
        }
    }
}

impl fmt::Display for ColorEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rgb => "RGB",
            Self::Hsv => "HSV",
            Self::RgbHsv => "RGBHSV",
        })
    }
}

/// Color channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    fn clamped(self) -> Self {
        let c = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::new(c(self.red), c(self.green), c(self.blue))
    }

    fn to_bytes(self) -> [u8; 3] {
        let b = |v: f32| (v * 255.0).round() as u8;
        [b(self.red), b(self.green), b(self.blue)]
    }

    fn from_bytes(bytes: [u8; 3]) -> Self {
        let c = |v: u8| f32::from(v) / 255.0;
        Self::new(c(bytes[0]), c(bytes[1]), c(bytes[2]))
    }

    /// Hue in degrees, saturation and value in `0.0..=1.0`
    fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == self.red {
            60.0 * ((self.green - self.blue) / delta).rem_euclid(6.0)
        } else if max == self.green {
            60.0 * ((self.blue - self.red) / delta + 2.0)
        } else {
            60.0 * ((self.red - self.green) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };
        (hue, saturation, max)
    }

    fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let chroma = value * saturation;
        let sector = (hue.rem_euclid(360.0)) / 60.0;
        let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
        let (r, g, b) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = value - chroma;
        Self::new(r + m, g + m, b + m)
    }
}

fn encode(encoding: ColorEncoding, rgb: Rgb) -> String {
    let rgb = rgb.clamped();
    let (hue, saturation, value) = rgb.to_hsv();
    let hue = (hue.round() as u16).min(360);
    match encoding {
        ColorEncoding::Rgb => hex::encode(rgb.to_bytes()),
        ColorEncoding::Hsv => {
            let scaled = |v: f32| (v * 1000.0).round() as u16;
            let mut bytes = Vec::with_capacity(6);
            bytes.extend(hue.to_be_bytes());
            bytes.extend(scaled(saturation).to_be_bytes());
            bytes.extend(scaled(value).to_be_bytes());
            hex::encode(bytes)
        }
        ColorEncoding::RgbHsv => {
            let scaled = |v: f32| (v * 255.0).round() as u8;
            let mut bytes = rgb.to_bytes().to_vec();
            bytes.extend(hue.to_be_bytes());
            bytes.push(scaled(saturation));
            bytes.push(scaled(value));
            hex::encode(bytes)
        }
    }
}

fn decode(number: u8, encoding: ColorEncoding, text: &str) -> Result<Rgb, DatapointError> {
    let bytes = hex::decode(text).map_err(|e| DatapointError::Decode {
        number,
        reason: format!("color '{text}': {e}"),
    })?;
    if bytes.len() != encoding.byte_len() {
        return Err(DatapointError::Decode {
            number,
            reason: format!(
                "{} color needs {} hex digits, got {}",
                encoding,
                encoding.byte_len() * 2,
                text.len()
            ),
        });
    }
    Ok(match encoding {
        ColorEncoding::Rgb | ColorEncoding::RgbHsv => Rgb::from_bytes([bytes[0], bytes[1], bytes[2]]),
        ColorEncoding::Hsv => {
            let word = |at: usize| f32::from(u16::from_be_bytes([bytes[at], bytes[at + 1]]));
            Rgb::from_hsv(
                word(0),
                (word(2) / 1000.0).min(1.0),
                (word(4) / 1000.0).min(1.0),
            )
        }
    })
}

/// Adapter for a color written as a hex string
#[derive(Debug, Clone)]
pub struct DpColor {
    matcher: MatchingDatapoint,
    encoding: ColorEncoding,
    retry: DatapointRetry,
    bound: bool,
    last_received: Option<Rgb>,
    last_received_wire: Option<String>,
    last_set: Option<Rgb>,
    last_set_wire: Option<String>,
}

impl DpColor {
    pub fn new(matcher: MatchingDatapoint, encoding: ColorEncoding, retry: RetryConfig) -> Self {
        Self {
            retry: DatapointRetry::new(matcher.number, retry),
            matcher,
            encoding,
            bound: false,
            last_received: None,
            last_received_wire: None,
            last_set: None,
            last_set_wire: None,
        }
    }

    pub fn init(&mut self, registry: &mut dyn ListenerRegistry) {
        registry.register_listener(self.matcher.number);
        self.bound = true;
    }

    pub fn number(&self) -> u8 {
        self.matcher.number
    }

    pub fn encoding(&self) -> ColorEncoding {
        self.encoding
    }

    pub fn handle(&mut self, record: &DatapointRecord, sink: &mut dyn DatapointSink) -> Option<Rgb> {
        if record.number != self.matcher.number {
            return None;
        }
        trace!("{} processing as color", record);

        let (wire, rgb) = match self.decode(record) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };
        if self.last_set_wire.as_deref() == Some(wire.as_str()) && self.retry.is_armed() {
            debug!(dp = self.matcher.number, "MCU confirmed color, canceling retry");
            self.retry.cancel(sink);
        }
        self.last_received_wire = Some(wire);
        self.last_received = Some(rgb);
        Some(rgb)
    }

    pub fn set_value(&mut self, rgb: Rgb, sink: &mut dyn DatapointSink) {
        self.send_value(rgb, false, sink);
    }

    pub fn on_retry_timeout(&mut self, number: u8, sink: &mut dyn DatapointSink) -> bool {
        if number != self.matcher.number {
            return false;
        }
        if self.retry.on_timeout(sink) == RetryStep::Resend {
            match self.last_set {
                Some(rgb) => self.send_value(rgb, true, sink),
                None => error!(dp = number, "Retry timeout: no color to resend"),
            }
        }
        true
    }

    pub fn last_received_value(&self) -> Option<Rgb> {
        self.last_received
    }

    pub fn last_set_value(&self) -> Option<Rgb> {
        self.last_set
    }

    pub fn matcher(&self) -> &MatchingDatapoint {
        &self.matcher
    }

    fn send_value(&mut self, rgb: Rgb, already_in_retry_sequence: bool, sink: &mut dyn DatapointSink) {
        if !self.bound {
            error!("{}", DatapointError::Unbound { number: self.matcher.number });
            return;
        }
        if self.matcher.single_type() != Some(DatapointType::String) {
            warn!("Cannot set color, {} is not a string datapoint", self.matcher);
            return;
        }

        let wire = encode(self.encoding, rgb);
        let value_changed = self.last_received_wire.as_deref() != Some(wire.as_str());
        self.last_set = Some(rgb);
        self.last_set_wire = Some(wire.clone());
        sink.send(
            DatapointRecord::new(self.matcher.number, DatapointValue::String(wire)),
            already_in_retry_sequence,
        );
        self.retry
            .schedule_if_needed(sink, already_in_retry_sequence, value_changed);
    }

    fn decode(&mut self, record: &DatapointRecord) -> Result<(String, Rgb), DatapointError> {
        let observed = record.datapoint_type();
        self.matcher.check(observed)?;
        let DatapointValue::String(text) = &record.value else {
            return Err(DatapointError::UnsupportedType {
                number: record.number,
                observed,
            });
        };
        let rgb = decode(record.number, self.encoding, text)?;
        self.matcher.resolve(observed);
        Ok((text.to_ascii_lowercase(), rgb))
    }
}

impl fmt::Display for DpColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.matcher, self.encoding)
    }
}
