use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::admin::{non_negative, required_name};
use crate::domain::operator::OperatorId;
use crate::domain::source::{NewSource, OperatorSourceWeight, Source, SourceId};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{OperatorStore, SourceStore, WeightStore};

/// One requested weight entry, as received from an administrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightAssignment {
    pub operator_id: OperatorId,
    pub weight: i64,
}

#[derive(Clone)]
pub struct SourceAdmin {
    sources: Arc<dyn SourceStore>,
    operators: Arc<dyn OperatorStore>,
    weights: Arc<dyn WeightStore>,
}

impl SourceAdmin {
    pub fn new(
        sources: Arc<dyn SourceStore>,
        operators: Arc<dyn OperatorStore>,
        weights: Arc<dyn WeightStore>,
    ) -> Self {
        Self { sources, operators, weights }
    }

    pub async fn create_source(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Source, ApplicationError> {
        let name = required_name("source name", name)?;
        let description = description.filter(|value| !value.trim().is_empty());
        let source =
            self.sources.insert(NewSource { name, description, created_at: Utc::now() }).await?;

        tracing::info!(
            event_name = "admin.source.created",
            source_id = source.id.0,
            "source created"
        );
        Ok(source)
    }

    pub async fn get_source(&self, id: SourceId) -> Result<Source, ApplicationError> {
        self.sources.find_by_id(id).await?.ok_or_else(|| ApplicationError::not_found("source", id))
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, ApplicationError> {
        Ok(self.sources.list_all().await?)
    }

    pub async fn source_weights(
        &self,
        source_id: SourceId,
    ) -> Result<Vec<OperatorSourceWeight>, ApplicationError> {
        self.get_source(source_id).await?;
        Ok(self.weights.weights_for_source(source_id).await?)
    }

    /// Replaces the full weight set of a source.
    ///
    /// Rejects negative weights, duplicate operators and unknown operators
    /// before anything is written. An empty request clears the source.
    pub async fn replace_source_weights(
        &self,
        source_id: SourceId,
        requested: Vec<WeightAssignment>,
    ) -> Result<Vec<OperatorSourceWeight>, ApplicationError> {
        self.get_source(source_id).await?;

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(requested.len());
        for entry in requested {
            if !seen.insert(entry.operator_id) {
                return Err(DomainError::InvariantViolation(format!(
                    "operator {} appears more than once in the weight set",
                    entry.operator_id
                ))
                .into());
            }
            validated.push((entry.operator_id, non_negative("weight", entry.weight)?));
        }

        for (operator_id, _) in &validated {
            if self.operators.find_by_id(*operator_id).await?.is_none() {
                return Err(ApplicationError::not_found("operator", operator_id));
            }
        }

        let stored = self.weights.replace_for_source(source_id, validated).await?;
        tracing::info!(
            event_name = "admin.source.weights_replaced",
            source_id = source_id.0,
            weight_count = stored.len(),
            "source weights replaced"
        );
        Ok(stored)
    }
}
