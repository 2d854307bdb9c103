use std::sync::Arc;

use chrono::Utc;

use crate::admin::{non_negative, required_name};
use crate::domain::operator::{NewOperator, Operator, OperatorId, OperatorStatus};
use crate::errors::ApplicationError;
use crate::store::OperatorStore;

/// Partial update of an operator. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperatorChanges {
    pub name: Option<String>,
    pub status: Option<String>,
    pub max_active_leads: Option<i64>,
}

#[derive(Clone)]
pub struct OperatorAdmin {
    operators: Arc<dyn OperatorStore>,
    default_max_active_leads: u32,
}

impl OperatorAdmin {
    pub fn new(operators: Arc<dyn OperatorStore>, default_max_active_leads: u32) -> Self {
        Self { operators, default_max_active_leads }
    }

    pub async fn create_operator(
        &self,
        name: &str,
        max_active_leads: Option<i64>,
    ) -> Result<Operator, ApplicationError> {
        let name = required_name("operator name", name)?;
        let max_active_leads = match max_active_leads {
            Some(value) => non_negative("max_active_leads", value)?,
            None => self.default_max_active_leads,
        };

        let operator = self
            .operators
            .insert(NewOperator {
                name,
                status: OperatorStatus::Active,
                max_active_leads,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            event_name = "admin.operator.created",
            operator_id = operator.id.0,
            max_active_leads = operator.max_active_leads,
            "operator created"
        );
        Ok(operator)
    }

    pub async fn get_operator(&self, id: OperatorId) -> Result<Operator, ApplicationError> {
        self.operators
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("operator", id))
    }

    pub async fn list_operators(&self) -> Result<Vec<Operator>, ApplicationError> {
        Ok(self.operators.list_all().await?)
    }

    pub async fn update_operator_status(
        &self,
        id: OperatorId,
        status: &str,
    ) -> Result<Operator, ApplicationError> {
        self.update_operator(
            id,
            OperatorChanges { status: Some(status.to_string()), ..OperatorChanges::default() },
        )
        .await
    }

    /// Validates every field before touching the store.
    pub async fn update_operator(
        &self,
        id: OperatorId,
        changes: OperatorChanges,
    ) -> Result<Operator, ApplicationError> {
        let status = changes.status.as_deref().map(str::parse::<OperatorStatus>).transpose()?;
        let max_active_leads = changes
            .max_active_leads
            .map(|value| non_negative("max_active_leads", value))
            .transpose()?;
        let name =
            changes.name.as_deref().map(|value| required_name("operator name", value)).transpose()?;

        let mut operator = self.get_operator(id).await?;
        if let Some(name) = name {
            operator.name = name;
        }
        if let Some(status) = status {
            operator.status = status;
        }
        if let Some(max_active_leads) = max_active_leads {
            operator.max_active_leads = max_active_leads;
        }

        let updated = self
            .operators
            .update(operator)
            .await?
            .ok_or_else(|| ApplicationError::not_found("operator", id))?;

        tracing::info!(
            event_name = "admin.operator.updated",
            operator_id = updated.id.0,
            status = updated.status.as_str(),
            max_active_leads = updated.max_active_leads,
            "operator updated"
        );
        Ok(updated)
    }
}
