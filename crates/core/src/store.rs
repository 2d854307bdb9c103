//! Persistence contracts consumed by the routing engine and the admin use cases.
//!
//! Each entity gets its own narrow trait so any backend can be substituted.
//! The SQLite and in-memory implementations live in `leadflow-db`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::contact::{Contact, ContactId, ContactStatus, NewContact};
use crate::domain::lead::{Lead, LeadId, NewLead};
use crate::domain::operator::{NewOperator, Operator, OperatorId};
use crate::domain::source::{NewSource, OperatorSourceWeight, Source, SourceId};
use crate::errors::StoreError;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Lead>, StoreError>;

    /// Inserts a lead. Returns [`StoreError::Conflict`] when the external id is taken.
    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError>;
}

#[async_trait]
pub trait OperatorStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Operator>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Operator>, StoreError>;
    async fn find_by_id(&self, id: OperatorId) -> Result<Option<Operator>, StoreError>;
    async fn insert(&self, operator: NewOperator) -> Result<Operator, StoreError>;

    /// Overwrites name, status and capacity. `None` when the operator does not exist.
    async fn update(&self, operator: Operator) -> Result<Option<Operator>, StoreError>;
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Source>, StoreError>;
    async fn insert(&self, source: NewSource) -> Result<Source, StoreError>;
}

#[async_trait]
pub trait WeightStore: Send + Sync {
    async fn weights_for_source(
        &self,
        source_id: SourceId,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError>;

    /// Replaces the whole weight set of a source. Readers observe either the
    /// previous set or the new one, never a mix.
    async fn replace_for_source(
        &self,
        source_id: SourceId,
        weights: Vec<(OperatorId, u32)>,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert(&self, contact: NewContact) -> Result<Contact, StoreError>;

    /// Inserts the contact only if its operator currently holds fewer than
    /// `max_active_leads` active contacts. The count and the insert are one
    /// atomic step; `None` means the operator was full at write time.
    async fn insert_within_capacity(
        &self,
        contact: NewContact,
        max_active_leads: u32,
    ) -> Result<Option<Contact>, StoreError>;

    async fn count_active_by_operator(&self, operator_id: OperatorId) -> Result<u32, StoreError>;
    async fn list_by_lead(&self, lead_id: LeadId) -> Result<Vec<Contact>, StoreError>;
    async fn update_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Option<Contact>, StoreError>;
}

/// The full set of stores a running service is wired with.
#[derive(Clone)]
pub struct Stores {
    pub leads: Arc<dyn LeadStore>,
    pub operators: Arc<dyn OperatorStore>,
    pub sources: Arc<dyn SourceStore>,
    pub weights: Arc<dyn WeightStore>,
    pub contacts: Arc<dyn ContactStore>,
}
