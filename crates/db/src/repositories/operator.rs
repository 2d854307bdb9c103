use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use leadflow_core::domain::operator::{NewOperator, Operator, OperatorId, OperatorStatus};
use leadflow_core::errors::StoreError;
use leadflow_core::store::OperatorStore;

use super::{column, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

const OPERATOR_COLUMNS: &str = "id, name, status, max_active_leads, created_at";

pub struct SqlOperatorRepository {
    pool: DbPool,
}

impl SqlOperatorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        filter: &str,
        status: Option<OperatorStatus>,
    ) -> Result<Vec<Operator>, RepositoryError> {
        let sql = format!("SELECT {OPERATOR_COLUMNS} FROM operators {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_operator).collect()
    }
}

fn row_to_operator(row: &SqliteRow) -> Result<Operator, RepositoryError> {
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;
    let max_active_leads: i64 = column(row, "max_active_leads")?;
    Ok(Operator {
        id: OperatorId(column(row, "id")?),
        name: column(row, "name")?,
        status: OperatorStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("operators.status `{status}`")))?,
        max_active_leads: parse_u32("operators.max_active_leads", max_active_leads)?,
        created_at: parse_timestamp("operators.created_at", &created_at)?,
    })
}

#[async_trait]
impl OperatorStore for SqlOperatorRepository {
    async fn list_active(&self) -> Result<Vec<Operator>, StoreError> {
        Ok(self.fetch_where("WHERE status = ?", Some(OperatorStatus::Active)).await?)
    }

    async fn list_all(&self) -> Result<Vec<Operator>, StoreError> {
        Ok(self.fetch_where("", None).await?)
    }

    async fn find_by_id(&self, id: OperatorId) -> Result<Option<Operator>, StoreError> {
        let row =
            sqlx::query(&format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_operator).transpose()?)
    }

    async fn insert(&self, operator: NewOperator) -> Result<Operator, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO operators (name, status, max_active_leads, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&operator.name)
        .bind(operator.status.as_str())
        .bind(i64::from(operator.max_active_leads))
        .bind(operator.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(operator.into_operator(OperatorId(id)))
    }

    async fn update(&self, operator: Operator) -> Result<Option<Operator>, StoreError> {
        let result = sqlx::query(
            "UPDATE operators SET name = ?, status = ?, max_active_leads = ? WHERE id = ?",
        )
        .bind(&operator.name)
        .bind(operator.status.as_str())
        .bind(i64::from(operator.max_active_leads))
        .bind(operator.id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok((result.rows_affected() > 0).then_some(operator))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use leadflow_core::domain::operator::{NewOperator, OperatorId, OperatorStatus};
    use leadflow_core::store::OperatorStore;

    use super::SqlOperatorRepository;
    use crate::{connect_with_settings, migrations};

    fn new_operator(name: &str, status: OperatorStatus) -> NewOperator {
        NewOperator { name: name.to_string(), status, max_active_leads: 4, created_at: Utc::now() }
    }

    #[tokio::test]
    async fn active_listing_excludes_inactive_operators() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlOperatorRepository::new(pool.clone());

        let alice = repo.insert(new_operator("Alice", OperatorStatus::Active)).await.expect("a");
        let bob = repo.insert(new_operator("Bob", OperatorStatus::Inactive)).await.expect("b");

        let active = repo.list_active().await.expect("list active");
        assert_eq!(active, vec![alice.clone()]);
        assert_eq!(repo.list_all().await.expect("list all"), vec![alice, bob]);

        pool.close().await;
    }

    #[tokio::test]
    async fn update_persists_changes_and_reports_missing_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlOperatorRepository::new(pool.clone());

        let mut operator =
            repo.insert(new_operator("Alice", OperatorStatus::Active)).await.expect("insert");
        operator.status = OperatorStatus::Inactive;
        operator.max_active_leads = 0;

        let updated = repo.update(operator.clone()).await.expect("update");
        assert_eq!(updated.as_ref(), Some(&operator));
        assert_eq!(repo.find_by_id(operator.id).await.expect("find"), Some(operator.clone()));

        operator.id = OperatorId(999);
        assert_eq!(repo.update(operator).await.expect("update missing"), None);

        pool.close().await;
    }
}
