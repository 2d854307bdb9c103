//! Lead assignment engine.
//!
//! `assign` runs lead resolution, candidate filtering, weighted selection and
//! recording in that order and always yields a contact, assigned or not.

pub mod candidates;
pub mod recorder;
pub mod resolver;
pub mod selector;

use std::sync::Arc;

use crate::config::RoutingConfig;
use crate::domain::contact::Contact;
use crate::domain::operator::Operator;
use crate::domain::source::SourceId;
use crate::errors::ApplicationError;
use crate::store::Stores;

pub use candidates::{eligible_operators, weighted_operator_ids};
pub use recorder::AssignmentRecorder;
pub use resolver::{resolve_lead, ResolvedLead};
pub use selector::{CumulativeWeights, RandomSource, SeededRandom, ThreadRandom, WeightedSelector};

#[derive(Clone)]
pub struct LeadDistributor {
    stores: Stores,
    selector: WeightedSelector,
    max_attempts: u32,
}

impl LeadDistributor {
    pub fn new(stores: Stores, selector: WeightedSelector, max_attempts: u32) -> Self {
        Self { stores, selector, max_attempts: max_attempts.max(1) }
    }

    pub fn from_config(stores: Stores, config: &RoutingConfig) -> Self {
        let selector = match config.rng_seed {
            Some(seed) => WeightedSelector::seeded(seed),
            None => WeightedSelector::default(),
        };
        Self::new(stores, selector, config.max_assignment_attempts)
    }

    pub fn with_random(stores: Stores, random: Arc<dyn RandomSource>) -> Self {
        let max_attempts = RoutingConfig::default().max_assignment_attempts;
        Self::new(stores, WeightedSelector::new(random), max_attempts)
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Operators that could take a contact from `source_id` right now.
    pub async fn eligible(&self, source_id: SourceId) -> Result<Vec<Operator>, ApplicationError> {
        let weights = self.stores.weights.weights_for_source(source_id).await?;
        let eligible = eligible_operators(
            self.stores.operators.as_ref(),
            self.stores.contacts.as_ref(),
            &weights,
        )
        .await?;
        Ok(eligible)
    }

    /// Routes one inbound contact request.
    ///
    /// Fails only on malformed input (empty lead id, unknown source) or store
    /// errors; an empty candidate set produces an unassigned contact.
    ///
    /// Malformed input is rejected before anything is written. A store error
    /// raised after lead resolution leaves the newly created lead in place; a
    /// retry with the same external id reuses it.
    pub async fn assign(
        &self,
        external_lead_id: &str,
        source_id: SourceId,
        message: Option<String>,
    ) -> Result<Contact, ApplicationError> {
        if self.stores.sources.find_by_id(source_id).await?.is_none() {
            return Err(ApplicationError::not_found("source", source_id));
        }

        let resolved = resolve_lead(self.stores.leads.as_ref(), external_lead_id).await?;
        let lead_id = resolved.lead.id;

        // One snapshot feeds both the filter and the selector.
        let weights = self.stores.weights.weights_for_source(source_id).await?;
        let mut candidates = eligible_operators(
            self.stores.operators.as_ref(),
            self.stores.contacts.as_ref(),
            &weights,
        )
        .await?;
        let eligible_count = candidates.len();

        let recorder = AssignmentRecorder::new(self.stores.contacts.as_ref());
        let mut attempts = 0u32;

        while attempts < self.max_attempts {
            let Some(selected) = self.selector.select(&candidates, &weights) else {
                break;
            };
            attempts += 1;

            let Some(position) = candidates.iter().position(|operator| operator.id == selected)
            else {
                break;
            };
            let operator = candidates.remove(position);

            if let Some(contact) =
                recorder.record_assigned(lead_id, source_id, &operator, message.clone()).await?
            {
                tracing::info!(
                    event_name = "routing.assign.completed",
                    contact_id = contact.id.0,
                    lead_id = lead_id.0,
                    source_id = source_id.0,
                    operator_id = operator.id.0,
                    eligible_count,
                    attempts,
                    lead_created = resolved.created,
                    "contact assigned"
                );
                return Ok(contact);
            }

            tracing::warn!(
                event_name = "routing.capacity.conflict",
                lead_id = lead_id.0,
                source_id = source_id.0,
                operator_id = operator.id.0,
                attempts,
                "operator filled up before insert, retrying with remaining candidates"
            );
        }

        let contact = recorder.record_unassigned(lead_id, source_id, message).await?;
        tracing::info!(
            event_name = "routing.assign.unassigned",
            contact_id = contact.id.0,
            lead_id = lead_id.0,
            source_id = source_id.0,
            eligible_count,
            attempts,
            lead_created = resolved.created,
            "no operator available, contact recorded unassigned"
        );
        Ok(contact)
    }
}
