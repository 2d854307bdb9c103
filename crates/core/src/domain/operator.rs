use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub i64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Active,
    Inactive,
}

impl OperatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl std::str::FromStr for OperatorStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| DomainError::InvalidStatus {
            kind: "operator",
            value: value.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub status: OperatorStatus,
    pub max_active_leads: u32,
    pub created_at: DateTime<Utc>,
}

impl Operator {
    pub fn is_active(&self) -> bool {
        self.status == OperatorStatus::Active
    }

    /// True while the operator can take one more active contact.
    pub fn has_capacity(&self, active_contacts: u32) -> bool {
        active_contacts < self.max_active_leads
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOperator {
    pub name: String,
    pub status: OperatorStatus,
    pub max_active_leads: u32,
    pub created_at: DateTime<Utc>,
}

impl NewOperator {
    pub fn into_operator(self, id: OperatorId) -> Operator {
        Operator {
            id,
            name: self.name,
            status: self.status,
            max_active_leads: self.max_active_leads,
            created_at: self.created_at,
        }
    }
}
