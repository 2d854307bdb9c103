use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;
use crate::domain::operator::OperatorId;
use crate::domain::source::SourceId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    InProgress,
    Closed,
}

impl ContactStatus {
    /// Statuses counted against an operator's capacity.
    pub const ACTIVE: [ContactStatus; 2] = [ContactStatus::New, ContactStatus::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "in_progress" => Some(Self::InProgress),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::New | Self::InProgress)
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
            .ok_or_else(|| DomainError::InvalidStatus { kind: "contact", value: value.to_string() })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub lead_id: LeadId,
    pub source_id: SourceId,
    pub operator_id: Option<OperatorId>,
    pub message: Option<String>,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn is_assigned(&self) -> bool {
        self.operator_id.is_some()
    }
}

/// Contact about to be recorded. Always starts in `new`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewContact {
    pub lead_id: LeadId,
    pub source_id: SourceId,
    pub operator_id: Option<OperatorId>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewContact {
    pub fn new(
        lead_id: LeadId,
        source_id: SourceId,
        operator_id: Option<OperatorId>,
        message: Option<String>,
    ) -> Self {
        Self { lead_id, source_id, operator_id, message, created_at: Utc::now() }
    }

    pub fn into_contact(self, id: ContactId) -> Contact {
        Contact {
            id,
            lead_id: self.lead_id,
            source_id: self.source_id,
            operator_id: self.operator_id,
            message: self.message,
            status: ContactStatus::New,
            created_at: self.created_at,
        }
    }
}
