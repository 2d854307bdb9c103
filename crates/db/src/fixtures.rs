use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected rows in the demo dataset, keyed by table.
const SEEDED_SOURCE_IDS: &[i64] = &[1, 2];
const SEEDED_OPERATOR_IDS: &[i64] = &[1, 2, 3];
const SEEDED_WEIGHTS: &[(i64, i64, i64)] = &[(1, 1, 2), (2, 1, 1), (2, 2, 3), (3, 2, 1)];

/// Demo routing setup used by `leadflow seed` and the end-to-end tests.
///
/// Two sources, two active operators and one inactive operator. The website
/// source splits 2:1 between Alice and Bogdan; partner referrals go to
/// Bogdan, with Chen weighted but inactive.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            sources: SEEDED_SOURCE_IDS.len(),
            operators: SEEDED_OPERATOR_IDS.len(),
            weights: SEEDED_WEIGHTS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for id in SEEDED_SOURCE_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sources WHERE id = ?)")
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("source-{id}"), exists == 1));
        }

        for id in SEEDED_OPERATOR_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM operators WHERE id = ?)")
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("operator-{id}"), exists == 1));
        }

        for (operator_id, source_id, weight) in SEEDED_WEIGHTS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM operator_source_weights
                 WHERE operator_id = ? AND source_id = ? AND weight = ?)",
            )
            .bind(operator_id)
            .bind(source_id)
            .bind(weight)
            .fetch_one(pool)
            .await?;
            checks.push((format!("weight-{operator_id}-{source_id}"), exists == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub sources: usize,
    pub operators: usize,
    pub weights: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
