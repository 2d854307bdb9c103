use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use leadflow_core::domain::lead::{Lead, LeadId, NewLead};
use leadflow_core::errors::StoreError;
use leadflow_core::store::LeadStore;

use super::{column, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_lead(row: &SqliteRow) -> Result<Lead, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    Ok(Lead {
        id: LeadId(column(row, "id")?),
        external_id: column(row, "external_id")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        created_at: parse_timestamp("leads.created_at", &created_at)?,
    })
}

#[async_trait]
impl LeadStore for SqlLeadRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Lead>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_id, email, phone, created_at FROM leads WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_lead).transpose()?)
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO leads (external_id, email, phone, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&lead.external_id)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(lead.into_lead(LeadId(id)))
    }
}

#[cfg(test)]
mod tests {
    use leadflow_core::domain::lead::NewLead;
    use leadflow_core::errors::StoreError;
    use leadflow_core::store::LeadStore;

    use super::SqlLeadRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn duplicate_external_id_is_reported_as_conflict() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlLeadRepository::new(pool.clone());

        let first = repo.insert(NewLead::bare("crm-1001")).await.expect("insert");
        let duplicate = repo.insert(NewLead::bare("crm-1001")).await;

        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
        let found = repo.find_by_external_id("crm-1001").await.expect("lookup");
        assert_eq!(found, Some(first));
        assert_eq!(repo.find_by_external_id("crm-404").await.expect("lookup"), None);

        pool.close().await;
    }
}
