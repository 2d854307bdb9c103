use std::sync::Arc;

use serde::Serialize;

use crate::domain::contact::{Contact, ContactId, ContactStatus};
use crate::domain::lead::Lead;
use crate::errors::ApplicationError;
use crate::store::{ContactStore, LeadStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeadWithContacts {
    pub lead: Lead,
    pub contacts: Vec<Contact>,
}

/// Read access to leads and the status workflow that frees operator capacity.
#[derive(Clone)]
pub struct ContactDirectory {
    leads: Arc<dyn LeadStore>,
    contacts: Arc<dyn ContactStore>,
}

impl ContactDirectory {
    pub fn new(leads: Arc<dyn LeadStore>, contacts: Arc<dyn ContactStore>) -> Self {
        Self { leads, contacts }
    }

    pub async fn lead_with_contacts(
        &self,
        external_id: &str,
    ) -> Result<LeadWithContacts, ApplicationError> {
        let lead = self
            .leads
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("lead", external_id))?;
        let contacts = self.contacts.list_by_lead(lead.id).await?;
        Ok(LeadWithContacts { lead, contacts })
    }

    pub async fn update_contact_status(
        &self,
        id: ContactId,
        status: &str,
    ) -> Result<Contact, ApplicationError> {
        let status = status.parse::<ContactStatus>()?;
        let contact = self
            .contacts
            .update_status(id, status)
            .await?
            .ok_or_else(|| ApplicationError::not_found("contact", id))?;

        tracing::info!(
            event_name = "admin.contact.status_changed",
            contact_id = contact.id.0,
            status = contact.status.as_str(),
            "contact status updated"
        );
        Ok(contact)
    }
}
