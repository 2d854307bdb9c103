use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub i64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub external_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lead that has not been persisted yet; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLead {
    pub external_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewLead {
    pub fn bare(external_id: impl Into<String>) -> Self {
        Self { external_id: external_id.into(), email: None, phone: None, created_at: Utc::now() }
    }

    pub fn into_lead(self, id: LeadId) -> Lead {
        Lead {
            id,
            external_id: self.external_id,
            email: self.email,
            phone: self.phone,
            created_at: self.created_at,
        }
    }
}
