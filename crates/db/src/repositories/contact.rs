use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use leadflow_core::domain::contact::{Contact, ContactId, ContactStatus, NewContact};
use leadflow_core::domain::lead::LeadId;
use leadflow_core::domain::operator::OperatorId;
use leadflow_core::domain::source::SourceId;
use leadflow_core::errors::StoreError;
use leadflow_core::store::ContactStore;

use super::{column, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

const CONTACT_COLUMNS: &str = "id, lead_id, source_id, operator_id, message, status, created_at";

/// Inserts only while the operator holds fewer active contacts than the cap.
/// The count and the insert run as one statement inside an immediate
/// transaction, so concurrent writers queue on the database write lock.
const INSERT_WITHIN_CAPACITY: &str = "
    INSERT INTO contacts (lead_id, source_id, operator_id, message, status, created_at)
    SELECT ?, ?, ?, ?, 'new', ?
    WHERE (
        SELECT COUNT(*) FROM contacts
        WHERE operator_id = ? AND status IN ('new', 'in_progress')
    ) < ?
    RETURNING id";

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_capped(
        &self,
        contact: &NewContact,
        operator_id: OperatorId,
        max_active_leads: u32,
    ) -> Result<Option<i64>, RepositoryError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let inserted = sqlx::query_scalar::<_, i64>(INSERT_WITHIN_CAPACITY)
            .bind(contact.lead_id.0)
            .bind(contact.source_id.0)
            .bind(operator_id.0)
            .bind(&contact.message)
            .bind(contact.created_at.to_rfc3339())
            .bind(operator_id.0)
            .bind(i64::from(max_active_leads))
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(inserted)
    }
}

fn row_to_contact(row: &SqliteRow) -> Result<Contact, RepositoryError> {
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;
    let operator_id: Option<i64> = column(row, "operator_id")?;
    Ok(Contact {
        id: ContactId(column(row, "id")?),
        lead_id: LeadId(column(row, "lead_id")?),
        source_id: SourceId(column(row, "source_id")?),
        operator_id: operator_id.map(OperatorId),
        message: column(row, "message")?,
        status: ContactStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("contacts.status `{status}`")))?,
        created_at: parse_timestamp("contacts.created_at", &created_at)?,
    })
}

#[async_trait]
impl ContactStore for SqlContactRepository {
    async fn insert(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO contacts (lead_id, source_id, operator_id, message, status, created_at)
             VALUES (?, ?, ?, ?, 'new', ?)
             RETURNING id",
        )
        .bind(contact.lead_id.0)
        .bind(contact.source_id.0)
        .bind(contact.operator_id.map(|id| id.0))
        .bind(&contact.message)
        .bind(contact.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(contact.into_contact(ContactId(id)))
    }

    async fn insert_within_capacity(
        &self,
        contact: NewContact,
        max_active_leads: u32,
    ) -> Result<Option<Contact>, StoreError> {
        let Some(operator_id) = contact.operator_id else {
            return self.insert(contact).await.map(Some);
        };

        let inserted = self.insert_capped(&contact, operator_id, max_active_leads).await?;
        Ok(inserted.map(|id| contact.into_contact(ContactId(id))))
    }

    async fn count_active_by_operator(&self, operator_id: OperatorId) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contacts
             WHERE operator_id = ? AND status IN ('new', 'in_progress')",
        )
        .bind(operator_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(parse_u32("contacts.active_count", count)?)
    }

    async fn list_by_lead(&self, lead_id: LeadId) -> Result<Vec<Contact>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE lead_id = ? ORDER BY id"
        ))
        .bind(lead_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_contact).collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE contacts SET status = ? WHERE id = ? RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_contact).transpose()?)
    }
}
