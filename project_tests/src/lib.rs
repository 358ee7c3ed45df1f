//! Helpers shared by the integration test targets of this crate.

use std::sync::Arc;
use std::time::Duration;

use lib_mediation::connections::db_postgres::{PgPriorityStore, PostgresSettings, create_pool};
use lib_mediation::{InMemoryPriorityStore, MediationService, NetworkScore};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Builds request entries from `(name, score)` pairs.
pub fn scores(entries: &[(&str, f32)]) -> Vec<NetworkScore> {
    entries
        .iter()
        .map(|(name, score)| NetworkScore::new(name, *score))
        .collect()
}

/// A fresh in-memory store and the engines over it.
pub fn in_memory_service() -> (
    Arc<InMemoryPriorityStore>,
    MediationService<InMemoryPriorityStore>,
) {
    let store = Arc::new(InMemoryPriorityStore::new());
    let service = MediationService::new(Arc::clone(&store), TIMEOUT);
    (store, service)
}

/// Postgres store for the database named by `DATABASE_URL`.
pub fn postgres_store_from_env() -> anyhow::Result<PgPriorityStore> {
    let url = std::env::var("DATABASE_URL")?;
    let pool = create_pool(&PostgresSettings {
        url: Some(url),
        pool_size: 4,
        ..Default::default()
    })?;
    Ok(PgPriorityStore::new(pool))
}
