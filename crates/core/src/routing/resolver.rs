use crate::domain::lead::{Lead, NewLead};
use crate::errors::{ApplicationError, DomainError, StoreError};
use crate::store::LeadStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLead {
    pub lead: Lead,
    pub created: bool,
}

/// Finds the lead for `external_id`, creating a bare one if none exists.
/// The id is matched exactly as given; only blank ids are rejected.
///
/// Losing an insert race to a concurrent caller surfaces as a store conflict,
/// which is answered by re-reading the winner's row.
pub async fn resolve_lead(
    leads: &dyn LeadStore,
    external_id: &str,
) -> Result<ResolvedLead, ApplicationError> {
    if external_id.trim().is_empty() {
        return Err(DomainError::InvariantViolation(
            "lead external id must not be empty".to_string(),
        )
        .into());
    }

    if let Some(lead) = leads.find_by_external_id(external_id).await? {
        return Ok(ResolvedLead { lead, created: false });
    }

    match leads.insert(NewLead::bare(external_id)).await {
        Ok(lead) => {
            tracing::info!(
                event_name = "routing.lead.created",
                lead_id = lead.id.0,
                external_id = %lead.external_id,
                "lead created"
            );
            Ok(ResolvedLead { lead, created: true })
        }
        Err(StoreError::Conflict(detail)) => {
            tracing::debug!(
                event_name = "routing.lead.create_conflict",
                external_id,
                detail = %detail,
                "lead inserted concurrently, re-reading"
            );
            leads
                .find_by_external_id(external_id)
                .await?
                .map(|lead| ResolvedLead { lead, created: false })
                .ok_or_else(|| StoreError::Conflict(detail).into())
        }
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::resolve_lead;
    use crate::domain::lead::{Lead, LeadId, NewLead};
    use crate::errors::{ApplicationError, DomainError, StoreError};
    use crate::store::LeadStore;

    /// Simulates a concurrent writer that inserts the same lead between our
    /// lookup and our insert.
    struct RacingLeadStore {
        winner: Lead,
        lookups: AtomicUsize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl LeadStore for RacingLeadStore {
        async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<Lead>, StoreError> {
            let call = self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((call > 0).then(|| self.winner.clone()))
        }

        async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict(format!("leads.external_id = {}", lead.external_id)))
        }
    }

    #[derive(Default)]
    struct VecLeadStore {
        leads: Mutex<Vec<Lead>>,
    }

    #[async_trait]
    impl LeadStore for VecLeadStore {
        async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Lead>, StoreError> {
            let leads = self.leads.lock().map_err(|_| StoreError::Backend("poisoned".into()))?;
            Ok(leads.iter().find(|lead| lead.external_id == external_id).cloned())
        }

        async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
            let mut leads = self.leads.lock().map_err(|_| StoreError::Backend("poisoned".into()))?;
            let lead = lead.into_lead(LeadId(leads.len() as i64 + 1));
            leads.push(lead.clone());
            Ok(lead)
        }
    }

    #[tokio::test]
    async fn lost_insert_race_rereads_existing_lead() {
        let winner = Lead {
            id: LeadId(9),
            external_id: "lead-42".to_string(),
            email: None,
            phone: None,
            created_at: Utc::now(),
        };
        let store = RacingLeadStore {
            winner: winner.clone(),
            lookups: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
        };

        let resolved = resolve_lead(&store, "lead-42").await.expect("conflict is recovered");

        assert_eq!(resolved.lead, winner);
        assert!(!resolved.created);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_resolution_converges_on_one_lead() {
        let store = VecLeadStore::default();

        let first = resolve_lead(&store, "lead-7").await.expect("first resolve");
        let second = resolve_lead(&store, "lead-7").await.expect("second resolve");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.lead.id, second.lead.id);
        assert_eq!(store.leads.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn blank_external_id_is_rejected_without_writes() {
        let store = VecLeadStore::default();

        let error = resolve_lead(&store, "   ").await.expect_err("blank id");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvariantViolation(_))));
        assert!(store.leads.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_part_of_the_id() {
        let store = VecLeadStore::default();

        let plain = resolve_lead(&store, "lead-7").await.expect("plain id");
        let padded = resolve_lead(&store, " lead-7").await.expect("padded id");

        assert!(padded.created);
        assert_ne!(plain.lead.id, padded.lead.id);
        assert_eq!(padded.lead.external_id, " lead-7");
    }
}
