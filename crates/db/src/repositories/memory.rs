use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use leadflow_core::domain::contact::{Contact, ContactId, ContactStatus, NewContact};
use leadflow_core::domain::lead::{Lead, LeadId, NewLead};
use leadflow_core::domain::operator::{NewOperator, Operator, OperatorId};
use leadflow_core::domain::source::{NewSource, OperatorSourceWeight, Source, SourceId};
use leadflow_core::errors::StoreError;
use leadflow_core::store::{ContactStore, LeadStore, OperatorStore, SourceStore, WeightStore};

fn next_id<T>(rows: &BTreeMap<i64, T>) -> i64 {
    rows.keys().next_back().map_or(1, |last| last + 1)
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<BTreeMap<i64, Lead>>,
}

#[async_trait]
impl LeadStore for InMemoryLeadRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Lead>, StoreError> {
        let leads = self.leads.read().await;
        Ok(leads.values().find(|lead| lead.external_id == external_id).cloned())
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut leads = self.leads.write().await;
        if leads.values().any(|existing| existing.external_id == lead.external_id) {
            return Err(StoreError::Conflict(format!("leads.external_id = {}", lead.external_id)));
        }
        let lead = lead.into_lead(LeadId(next_id(&leads)));
        leads.insert(lead.id.0, lead.clone());
        Ok(lead)
    }
}

#[derive(Default)]
pub struct InMemoryOperatorRepository {
    operators: RwLock<BTreeMap<i64, Operator>>,
}

#[async_trait]
impl OperatorStore for InMemoryOperatorRepository {
    async fn list_active(&self) -> Result<Vec<Operator>, StoreError> {
        let operators = self.operators.read().await;
        Ok(operators.values().filter(|operator| operator.is_active()).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Operator>, StoreError> {
        let operators = self.operators.read().await;
        Ok(operators.values().cloned().collect())
    }

    async fn find_by_id(&self, id: OperatorId) -> Result<Option<Operator>, StoreError> {
        let operators = self.operators.read().await;
        Ok(operators.get(&id.0).cloned())
    }

    async fn insert(&self, operator: NewOperator) -> Result<Operator, StoreError> {
        let mut operators = self.operators.write().await;
        let operator = operator.into_operator(OperatorId(next_id(&operators)));
        operators.insert(operator.id.0, operator.clone());
        Ok(operator)
    }

    async fn update(&self, operator: Operator) -> Result<Option<Operator>, StoreError> {
        let mut operators = self.operators.write().await;
        match operators.get_mut(&operator.id.0) {
            Some(existing) => {
                *existing = operator.clone();
                Ok(Some(operator))
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct InMemorySourceRepository {
    sources: RwLock<BTreeMap<i64, Source>>,
}

#[async_trait]
impl SourceStore for InMemorySourceRepository {
    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>, StoreError> {
        let sources = self.sources.read().await;
        Ok(sources.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Source>, StoreError> {
        let sources = self.sources.read().await;
        Ok(sources.values().cloned().collect())
    }

    async fn insert(&self, source: NewSource) -> Result<Source, StoreError> {
        let mut sources = self.sources.write().await;
        let source = source.into_source(SourceId(next_id(&sources)));
        sources.insert(source.id.0, source.clone());
        Ok(source)
    }
}

#[derive(Default)]
pub struct InMemoryWeightRepository {
    weights: RwLock<Vec<OperatorSourceWeight>>,
}

#[async_trait]
impl WeightStore for InMemoryWeightRepository {
    async fn weights_for_source(
        &self,
        source_id: SourceId,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError> {
        let weights = self.weights.read().await;
        let mut matching: Vec<_> =
            weights.iter().filter(|entry| entry.source_id == source_id).cloned().collect();
        matching.sort_by_key(|entry| entry.operator_id);
        Ok(matching)
    }

    async fn replace_for_source(
        &self,
        source_id: SourceId,
        replacement: Vec<(OperatorId, u32)>,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError> {
        let mut seen = Vec::with_capacity(replacement.len());
        for (operator_id, _) in &replacement {
            if seen.contains(operator_id) {
                return Err(StoreError::Conflict(format!(
                    "operator_source_weights ({operator_id}, {source_id})"
                )));
            }
            seen.push(*operator_id);
        }

        let created_at = Utc::now();
        let stored: Vec<_> = replacement
            .into_iter()
            .map(|(operator_id, weight)| OperatorSourceWeight {
                operator_id,
                source_id,
                weight,
                created_at,
            })
            .collect();

        let mut weights = self.weights.write().await;
        weights.retain(|entry| entry.source_id != source_id);
        weights.extend(stored.iter().cloned());
        Ok(stored)
    }
}

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: RwLock<BTreeMap<i64, Contact>>,
}

fn active_for(contacts: &BTreeMap<i64, Contact>, operator_id: OperatorId) -> usize {
    contacts
        .values()
        .filter(|contact| contact.operator_id == Some(operator_id) && contact.status.is_active())
        .count()
}

#[async_trait]
impl ContactStore for InMemoryContactRepository {
    async fn insert(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let mut contacts = self.contacts.write().await;
        let contact = contact.into_contact(ContactId(next_id(&contacts)));
        contacts.insert(contact.id.0, contact.clone());
        Ok(contact)
    }

    async fn insert_within_capacity(
        &self,
        contact: NewContact,
        max_active_leads: u32,
    ) -> Result<Option<Contact>, StoreError> {
        let mut contacts = self.contacts.write().await;
        if let Some(operator_id) = contact.operator_id {
            let active = u64::try_from(active_for(&contacts, operator_id)).unwrap_or(u64::MAX);
            if active >= u64::from(max_active_leads) {
                return Ok(None);
            }
        }
        let contact = contact.into_contact(ContactId(next_id(&contacts)));
        contacts.insert(contact.id.0, contact.clone());
        Ok(Some(contact))
    }

    async fn count_active_by_operator(&self, operator_id: OperatorId) -> Result<u32, StoreError> {
        let contacts = self.contacts.read().await;
        u32::try_from(active_for(&contacts, operator_id))
            .map_err(|_| StoreError::Decode("active contact count exceeds u32".to_string()))
    }

    async fn list_by_lead(&self, lead_id: LeadId) -> Result<Vec<Contact>, StoreError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.values().filter(|contact| contact.lead_id == lead_id).cloned().collect())
    }

    async fn update_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Option<Contact>, StoreError> {
        let mut contacts = self.contacts.write().await;
        Ok(contacts.get_mut(&id.0).map(|contact| {
            contact.status = status;
            contact.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadflow_core::domain::contact::{ContactStatus, NewContact};
    use leadflow_core::domain::lead::{LeadId, NewLead};
    use leadflow_core::domain::operator::OperatorId;
    use leadflow_core::domain::source::SourceId;
    use leadflow_core::errors::StoreError;
    use leadflow_core::store::{ContactStore, LeadStore, WeightStore};

    use super::{InMemoryContactRepository, InMemoryLeadRepository, InMemoryWeightRepository};

    #[tokio::test]
    async fn in_memory_lead_insert_enforces_unique_external_id() {
        let repo = InMemoryLeadRepository::default();

        repo.insert(NewLead::bare("crm-1")).await.expect("first insert");
        let duplicate = repo.insert(NewLead::bare("crm-1")).await;

        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn in_memory_capped_inserts_never_exceed_capacity_under_contention() {
        let repo = Arc::new(InMemoryContactRepository::default());
        let operator = OperatorId(1);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert_within_capacity(
                    NewContact::new(LeadId(1), SourceId(1), Some(operator), None),
                    3,
                )
                .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.expect("join").expect("insert").is_some() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 3);
        assert_eq!(repo.count_active_by_operator(operator).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn in_memory_status_updates_change_active_count() {
        let repo = InMemoryContactRepository::default();
        let operator = OperatorId(4);
        let contact = repo
            .insert(NewContact::new(LeadId(1), SourceId(1), Some(operator), None))
            .await
            .expect("insert");

        repo.update_status(contact.id, ContactStatus::Closed).await.expect("close");

        assert_eq!(repo.count_active_by_operator(operator).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn in_memory_weight_replacement_rejects_duplicates_atomically() {
        let repo = InMemoryWeightRepository::default();
        let source = SourceId(1);
        repo.replace_for_source(source, vec![(OperatorId(1), 2)]).await.expect("initial");

        let duplicate =
            repo.replace_for_source(source, vec![(OperatorId(2), 1), (OperatorId(2), 4)]).await;

        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
        let current = repo.weights_for_source(source).await.expect("read");
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].weight, 2);
    }
}
