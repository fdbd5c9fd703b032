//! Errors surfaced by the datapoint handler

use thiserror::Error;
use uyat_core::EntityId;

/// Errors that can occur when hosting entities or routing control calls
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("entity not found: {0}")]
    UnknownEntity(EntityId),

    #[error("entity already registered: {0}")]
    DuplicateEntity(EntityId),

    #[error("invalid control data for {entity_id}: {reason}")]
    InvalidControl { entity_id: EntityId, reason: String },
}
