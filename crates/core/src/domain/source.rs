use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::operator::OperatorId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub i64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSource {
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSource {
    pub fn into_source(self, id: SourceId) -> Source {
        Source { id, name: self.name, description: self.description, created_at: self.created_at }
    }
}

/// Routing preference of one operator for one source.
///
/// Presence of an entry is what makes the operator eligible for the source;
/// the value only scales the selection probability, so a zero weight keeps the
/// operator eligible but never selectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSourceWeight {
    pub operator_id: OperatorId,
    pub source_id: SourceId,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
}
