//! Business aggregates that propagate to a form engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of business entity an outbox record belongs to.
///
/// Stored as text (`form_version`, `submission`) so rows written by newer
/// producers with kinds this build does not know still load and fail per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    FormVersion,
    Submission,
}

impl AggregateType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FormVersion => "form_version",
            Self::Submission => "submission",
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported aggregate type: {0}")]
pub struct UnknownAggregateType(pub String);

impl FromStr for AggregateType {
    type Err = UnknownAggregateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form_version" => Ok(Self::FormVersion),
            "submission" => Ok(Self::Submission),
            other => Err(UnknownAggregateType(other.to_owned())),
        }
    }
}
