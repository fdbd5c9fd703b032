//! Entity identifiers: an entity kind plus an object id

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("expected '<kind>.<name>', got '{0}'")]
    InvalidFormat(String),

    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    #[error("invalid object id '{object_id}': {reason}")]
    InvalidObjectId {
        object_id: String,
        reason: &'static str,
    },
}

/// The kinds of entity the bridge can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Climate,
    Fan,
    Light,
    Number,
    Select,
    Sensor,
    Switch,
    TextSensor,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        Self::Climate,
        Self::Fan,
        Self::Light,
        Self::Number,
        Self::Select,
        Self::Sensor,
        Self::Switch,
        Self::TextSensor,
    ];

    /// Prefix used in entity ids and configuration sections
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Climate => "climate",
            Self::Fan => "fan",
            Self::Light => "light",
            Self::Number => "number",
            Self::Select => "select",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::TextSensor => "text_sensor",
        }
    }
}

impl FromStr for EntityKind {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EntityIdError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `name` cannot be an object id, if it cannot
fn object_id_problem(name: &str) -> Option<&'static str> {
    match name.as_bytes() {
        [] => Some("empty"),
        [b'_', ..] | [.., b'_'] => Some("leading or trailing underscore"),
        bytes if bytes
            .iter()
            .any(|b| !matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_')) =>
        {
            Some("only a-z, 0-9 and '_' are allowed")
        }
        _ => None,
    }
}

/// One hosted entity, e.g. `climate.living_room`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    kind: EntityKind,
    object_id: String,
}

impl EntityId {
    pub fn new(kind: EntityKind, object_id: impl Into<String>) -> Result<Self, EntityIdError> {
        let object_id = object_id.into();
        match object_id_problem(&object_id) {
            Some(reason) => Err(EntityIdError::InvalidObjectId { object_id, reason }),
            None => Ok(Self { kind, object_id }),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((kind, object_id)) if !object_id.contains('.') => {
                Self::new(kind.parse()?, object_id)
            }
            _ => Err(EntityIdError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.object_id)
    }
}
