use std::collections::HashSet;

use crate::domain::operator::{Operator, OperatorId};
use crate::domain::source::OperatorSourceWeight;
use crate::errors::StoreError;
use crate::store::{ContactStore, OperatorStore};

/// Operators configured for a source, regardless of weight value.
pub fn weighted_operator_ids(weights: &[OperatorSourceWeight]) -> HashSet<OperatorId> {
    weights.iter().map(|entry| entry.operator_id).collect()
}

/// Operators that may receive a new contact from the source the weights belong to.
///
/// An operator qualifies when it is active, has a weight entry for the source
/// (a zero weight still counts) and holds fewer active contacts than its
/// capacity. Store order of the active operators is preserved.
pub async fn eligible_operators(
    operators: &dyn OperatorStore,
    contacts: &dyn ContactStore,
    weights: &[OperatorSourceWeight],
) -> Result<Vec<Operator>, StoreError> {
    let configured = weighted_operator_ids(weights);
    if configured.is_empty() {
        return Ok(Vec::new());
    }

    let mut eligible = Vec::new();
    for operator in operators.list_active().await? {
        if !operator.is_active() || !configured.contains(&operator.id) {
            continue;
        }

        let active_contacts = contacts.count_active_by_operator(operator.id).await?;
        if operator.has_capacity(active_contacts) {
            eligible.push(operator);
        } else {
            tracing::debug!(
                event_name = "routing.candidate.at_capacity",
                operator_id = operator.id.0,
                active_contacts,
                max_active_leads = operator.max_active_leads,
                "operator skipped: at capacity"
            );
        }
    }

    Ok(eligible)
}
