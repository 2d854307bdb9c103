use crate::domain::contact::{Contact, NewContact};
use crate::domain::lead::LeadId;
use crate::domain::operator::Operator;
use crate::domain::source::SourceId;
use crate::errors::StoreError;
use crate::store::ContactStore;

/// Persists the routing outcome as a `new` contact.
pub struct AssignmentRecorder<'a> {
    contacts: &'a dyn ContactStore,
}

impl<'a> AssignmentRecorder<'a> {
    pub fn new(contacts: &'a dyn ContactStore) -> Self {
        Self { contacts }
    }

    /// Records a contact nobody could take. Never refused.
    pub async fn record_unassigned(
        &self,
        lead_id: LeadId,
        source_id: SourceId,
        message: Option<String>,
    ) -> Result<Contact, StoreError> {
        self.contacts.insert(NewContact::new(lead_id, source_id, None, message)).await
    }

    /// Records a contact bound to `operator`, provided the operator still has
    /// room at write time. `None` means someone else took the last slot.
    pub async fn record_assigned(
        &self,
        lead_id: LeadId,
        source_id: SourceId,
        operator: &Operator,
        message: Option<String>,
    ) -> Result<Option<Contact>, StoreError> {
        let contact = NewContact::new(lead_id, source_id, Some(operator.id), message);
        self.contacts.insert_within_capacity(contact, operator.max_active_leads).await
    }
}
