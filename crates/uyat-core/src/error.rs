//! Error taxonomy for datapoint handling
//!
//! None of these are fatal. Adapters produce them from their decode and
//! encode helpers and log them where the record enters the adapter; the
//! record is dropped and the previously known state is kept.

use crate::DatapointType;
use thiserror::Error;

/// Errors produced while decoding or encoding datapoint values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DatapointError {
    /// Wire type disagrees with what the matcher accepts
    #[error("datapoint {number}: type mismatch, expected {expected}, got {observed}")]
    TypeMismatch {
        number: u8,
        expected: String,
        observed: DatapointType,
    },

    /// Wire type the adapter has no decoding for
    #[error("datapoint {number}: unhandled type {observed}")]
    UnsupportedType { number: u8, observed: DatapointType },

    /// Structurally invalid payload
    #[error("datapoint {number}: decode failed: {reason}")]
    Decode { number: u8, reason: String },

    /// Value cannot be represented in the datapoint's wire type
    #[error("datapoint {number}: cannot encode {value} as {datapoint_type}")]
    Encode {
        number: u8,
        value: String,
        datapoint_type: DatapointType,
    },

    /// Adapter used before it was bound to a handler
    #[error("datapoint {number}: adapter not bound to a handler")]
    Unbound { number: u8 },

    /// Write attempted before the wire type is known
    #[error("datapoint {number}: wire type not yet known")]
    UnresolvedType { number: u8 },
}

impl DatapointError {
    /// Datapoint number the error refers to
    pub fn number(&self) -> u8 {
        match self {
            Self::TypeMismatch { number, .. }
            | Self::UnsupportedType { number, .. }
            | Self::Decode { number, .. }
            | Self::Encode { number, .. }
            | Self::Unbound { number }
            | Self::UnresolvedType { number } => *number,
        }
    }
}
