//! Matcher binding a logical entity to a datapoint number and wire type(s)

use crate::{DatapointError, DatapointType};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// What a matcher knows about the wire type of its datapoint
///
/// Resolution is monotone: `Unresolved` may become `Resolved` exactly once,
/// and neither `Resolved` nor `Multiple` ever changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeResolution {
    /// Type not known yet; any value matches
    Unresolved,
    /// Exactly one type, configured or learned from the first value
    Resolved(DatapointType),
    /// Several types allowed by configuration; never narrowed
    Multiple(Vec<DatapointType>),
}

/// Which datapoint a logical entity accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingDatapoint {
    /// Datapoint number
    pub number: u8,
    resolution: TypeResolution,
}

impl MatchingDatapoint {
    /// A matcher whose type will be learned from the first received value
    pub fn unresolved(number: u8) -> Self {
        Self {
            number,
            resolution: TypeResolution::Unresolved,
        }
    }

    /// A matcher for exactly one wire type
    pub fn single(number: u8, datapoint_type: DatapointType) -> Self {
        Self {
            number,
            resolution: TypeResolution::Resolved(datapoint_type),
        }
    }

    /// A matcher from a configured type list
    ///
    /// An empty list is unresolved, one entry is resolved, and several entries
    /// form a static multi-type matcher.
    pub fn with_types(number: u8, types: impl IntoIterator<Item = DatapointType>) -> Self {
        let mut types: Vec<DatapointType> = types.into_iter().collect();
        types.sort();
        types.dedup();

        let resolution = match types.len() {
            0 => TypeResolution::Unresolved,
            1 => TypeResolution::Resolved(types[0]),
            _ => TypeResolution::Multiple(types),
        };
        Self { number, resolution }
    }

    /// Current type knowledge
    pub fn resolution(&self) -> &TypeResolution {
        &self.resolution
    }

    /// Check if a value of `observed` type is acceptable
    pub fn matches(&self, observed: DatapointType) -> bool {
        match &self.resolution {
            TypeResolution::Unresolved => true,
            TypeResolution::Resolved(t) => *t == observed,
            TypeResolution::Multiple(types) => types.contains(&observed),
        }
    }

    /// Check if exactly one wire type is known, so values can be encoded
    pub fn allows_single_type(&self) -> bool {
        matches!(self.resolution, TypeResolution::Resolved(_))
    }

    /// The single known wire type, if any
    pub fn single_type(&self) -> Option<DatapointType> {
        match self.resolution {
            TypeResolution::Resolved(t) => Some(t),
            _ => None,
        }
    }

    /// Like [`matches`](Self::matches) but reports the mismatch as an error
    pub fn check(&self, observed: DatapointType) -> Result<(), DatapointError> {
        if self.matches(observed) {
            Ok(())
        } else {
            Err(DatapointError::TypeMismatch {
                number: self.number,
                expected: self.to_string(),
                observed,
            })
        }
    }

    /// Narrow an unresolved matcher to the observed type
    ///
    /// Returns true if this call performed the resolution. Resolved and
    /// multi-type matchers are left untouched.
    pub fn resolve(&mut self, observed: DatapointType) -> bool {
        if self.resolution != TypeResolution::Unresolved {
            return false;
        }

        self.resolution = TypeResolution::Resolved(observed);
        info!(dp = self.number, "Resolved {}", self);
        true
    }
}

impl fmt::Display for MatchingDatapoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Datapoint {}: ", self.number)?;
        match &self.resolution {
            TypeResolution::Unresolved => f.write_str("DETECT"),
            TypeResolution::Resolved(t) => write!(f, "{}", t),
            TypeResolution::Multiple(types) => {
                let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}
