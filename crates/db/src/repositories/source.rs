use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use leadflow_core::domain::operator::OperatorId;
use leadflow_core::domain::source::{NewSource, OperatorSourceWeight, Source, SourceId};
use leadflow_core::errors::StoreError;
use leadflow_core::store::{SourceStore, WeightStore};

use super::{column, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

pub struct SqlSourceRepository {
    pool: DbPool,
}

impl SqlSourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_source(row: &SqliteRow) -> Result<Source, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    Ok(Source {
        id: SourceId(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        created_at: parse_timestamp("sources.created_at", &created_at)?,
    })
}

fn row_to_weight(row: &SqliteRow) -> Result<OperatorSourceWeight, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    Ok(OperatorSourceWeight {
        operator_id: OperatorId(column(row, "operator_id")?),
        source_id: SourceId(column(row, "source_id")?),
        weight: parse_u32("operator_source_weights.weight", column(row, "weight")?)?,
        created_at: parse_timestamp("operator_source_weights.created_at", &created_at)?,
    })
}

#[async_trait]
impl SourceStore for SqlSourceRepository {
    async fn find_by_id(&self, id: SourceId) -> Result<Option<Source>, StoreError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM sources WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_source).transpose()?)
    }

    async fn list_all(&self) -> Result<Vec<Source>, StoreError> {
        let rows =
            sqlx::query("SELECT id, name, description, created_at FROM sources ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_source).collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, source: NewSource) -> Result<Source, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sources (name, description, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&source.name)
        .bind(&source.description)
        .bind(source.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(source.into_source(SourceId(id)))
    }
}

pub struct SqlWeightRepository {
    pool: DbPool,
}

impl SqlWeightRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn replace(
        &self,
        source_id: SourceId,
        weights: Vec<(OperatorId, u32)>,
    ) -> Result<Vec<OperatorSourceWeight>, RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM operator_source_weights WHERE source_id = ?")
            .bind(source_id.0)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(weights.len());
        for (operator_id, weight) in weights {
            sqlx::query(
                "INSERT INTO operator_source_weights (operator_id, source_id, weight, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(operator_id.0)
            .bind(source_id.0)
            .bind(i64::from(weight))
            .bind(created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            stored.push(OperatorSourceWeight { operator_id, source_id, weight, created_at });
        }

        tx.commit().await?;
        Ok(stored)
    }
}

#[async_trait]
impl WeightStore for SqlWeightRepository {
    async fn weights_for_source(
        &self,
        source_id: SourceId,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError> {
        let rows = sqlx::query(
            "SELECT operator_id, source_id, weight, created_at
             FROM operator_source_weights
             WHERE source_id = ?
             ORDER BY operator_id",
        )
        .bind(source_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_weight).collect::<Result<Vec<_>, _>>()?)
    }

    async fn replace_for_source(
        &self,
        source_id: SourceId,
        weights: Vec<(OperatorId, u32)>,
    ) -> Result<Vec<OperatorSourceWeight>, StoreError> {
        let stored = self.replace(source_id, weights).await?;
        tracing::debug!(
            event_name = "db.weights.replaced",
            source_id = source_id.0,
            entries = stored.len(),
            "operator weights replaced"
        );
        Ok(stored)
    }
}
