use leadflow_core::config::{AppConfig, ConfigError, LoadOptions};
use leadflow_core::LeadDistributor;
use leadflow_db::{connect_with_config, migrations, sql_stores, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let stores = sql_stores(&db_pool);
    let distributor = LeadDistributor::from_config(stores.clone(), &config.routing);
    let api = ApiState::new(stores, distributor, &config.routing);
    info!(
        event_name = "system.bootstrap.routing_ready",
        correlation_id = "bootstrap",
        seeded = config.routing.rng_seed.is_some(),
        max_assignment_attempts = config.routing.max_assignment_attempts,
        "assignment engine initialized"
    );

    Ok(Application { config, db_pool, api })
}

#[cfg(test)]
mod tests {
    use leadflow_core::config::{ConfigOverrides, LoadOptions};
    use leadflow_core::SourceId;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                rng_seed: Some(5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database_urls() {
        let result = bootstrap(overrides("postgres://localhost/leads")).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_applies_schema_and_wires_the_assignment_engine() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' \
             AND name IN ('leads', 'operators', 'sources', 'operator_source_weights', 'contacts')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 5);

        let operator = app.api.operators.create_operator("Alice", Some(2)).await.expect("op");
        let source = app.api.sources.create_source("website", None).await.expect("source");
        app.api
            .sources
            .replace_source_weights(
                source.id,
                vec![leadflow_core::WeightAssignment { operator_id: operator.id, weight: 1 }],
            )
            .await
            .expect("weights");

        let contact =
            app.api.distributor.assign("lead-1", source.id, None).await.expect("assign");
        assert_eq!(contact.operator_id, Some(operator.id));

        let missing = app.api.distributor.assign("lead-2", SourceId(99), None).await;
        assert!(missing.is_err());

        app.db_pool.close().await;
    }
}
