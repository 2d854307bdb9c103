pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

use std::sync::Arc;

use leadflow_core::store::Stores;

pub use connection::{connect, connect_with_config, connect_with_settings, ping, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use repositories::RepositoryError;

/// Store set backed by the SQLite pool.
pub fn sql_stores(pool: &DbPool) -> Stores {
    use repositories::{
        SqlContactRepository, SqlLeadRepository, SqlOperatorRepository, SqlSourceRepository,
        SqlWeightRepository,
    };

    Stores {
        leads: Arc::new(SqlLeadRepository::new(pool.clone())),
        operators: Arc::new(SqlOperatorRepository::new(pool.clone())),
        sources: Arc::new(SqlSourceRepository::new(pool.clone())),
        weights: Arc::new(SqlWeightRepository::new(pool.clone())),
        contacts: Arc::new(SqlContactRepository::new(pool.clone())),
    }
}

/// Process-local store set, used by tests and dry runs.
pub fn memory_stores() -> Stores {
    use repositories::{
        InMemoryContactRepository, InMemoryLeadRepository, InMemoryOperatorRepository,
        InMemorySourceRepository, InMemoryWeightRepository,
    };

    Stores {
        leads: Arc::new(InMemoryLeadRepository::default()),
        operators: Arc::new(InMemoryOperatorRepository::default()),
        sources: Arc::new(InMemorySourceRepository::default()),
        weights: Arc::new(InMemoryWeightRepository::default()),
        contacts: Arc::new(InMemoryContactRepository::default()),
    }
}
