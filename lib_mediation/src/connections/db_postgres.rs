//! # PostgreSQL Priority Store
//!
//! Provides a managed connection pool for PostgreSQL using `deadpool-postgres`
//! and `tokio-postgres`, and implements [`PriorityStore`] on top of it.
//! Supports connection pooling, health checks and idempotent schema setup.

use std::collections::BTreeSet;

use deadpool_postgres::{
    Config as DeadpoolConfig, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use thiserror::Error;
use tokio_postgres::NoTls;
use tracing::{debug, info, warn};

use super::sql_builder::DeleteNotInQuery;
use crate::priority::error::{MediationError, Result};
use crate::priority::models::{ListId, NetworkScore, PriorityListRow};
use crate::priority::store::{PriorityStore, PriorityTransaction};

/// Custom error types for connection setup and maintenance.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),
    #[error("Query execution failed: {0}")]
    QueryError(String),
}

/// Tables, constraints and the ordered-read index. Safe to run on every start.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS priority_lists (
    id SERIAL PRIMARY KEY,
    country_code TEXT NOT NULL,
    ad_type TEXT NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (country_code, ad_type)
);
CREATE TABLE IF NOT EXISTS priority_networks (
    id SERIAL PRIMARY KEY,
    priority_list_id INTEGER NOT NULL REFERENCES priority_lists (id) ON DELETE CASCADE,
    network_name TEXT NOT NULL,
    score REAL NOT NULL,
    UNIQUE (priority_list_id, network_name)
);
CREATE INDEX IF NOT EXISTS priority_networks_list_score_idx
    ON priority_networks (priority_list_id, score DESC);
";

const UPSERT_LIST_SQL: &str = "
INSERT INTO priority_lists (country_code, ad_type, last_updated)
VALUES ($1, $2, NOW())
ON CONFLICT (country_code, ad_type)
DO UPDATE SET last_updated = EXCLUDED.last_updated
RETURNING id";

const UPSERT_NETWORK_SQL: &str = "
INSERT INTO priority_networks (priority_list_id, network_name, score)
VALUES ($1, $2, $3)
ON CONFLICT (priority_list_id, network_name)
DO UPDATE SET score = EXCLUDED.score";

const SELECT_NETWORKS_SQL: &str = "
SELECT network.network_name, network.score
FROM priority_networks network
JOIN priority_lists list ON list.id = network.priority_list_id
WHERE list.country_code = $1 AND list.ad_type = $2
ORDER BY network.score DESC, network.network_name ASC";

const SELECT_DASHBOARD_SQL: &str = "
SELECT list.country_code, list.ad_type, list.last_updated, network.network_name, network.score
FROM priority_lists list
LEFT JOIN priority_networks network ON list.id = network.priority_list_id
ORDER BY list.country_code ASC, list.ad_type ASC, network.score DESC, network.network_name ASC";

/// Connection parameters. `url` wins over the individual fields when set.
#[derive(Debug, Clone, Default)]
pub struct PostgresSettings {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub pool_size: usize,
}

/// Creates the pool without opening a connection; use [`PgPriorityStore::ping`]
/// to verify the database is reachable.
pub fn create_pool(settings: &PostgresSettings) -> std::result::Result<Pool, DbError> {
    let mut cfg = DeadpoolConfig::new();
    match &settings.url {
        Some(url) => cfg.url = Some(url.clone()),
        None => {
            cfg.host = settings.host.clone();
            cfg.port = Some(settings.port);
            cfg.user = settings.user.clone();
            cfg.password = settings.password.clone();
            cfg.dbname = settings.dbname.clone();
        }
    }
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(settings.pool_size));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| DbError::ConnectionError(format!("Failed to create database pool: {}", e)))
}

/// [`PriorityStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgPriorityStore {
    pool: Pool,
}

impl PgPriorityStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Checks the health of the database connection by running a simple query.
    pub async fn ping(&self) -> std::result::Result<(), DbError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(())
    }

    /// Creates the tables and index if they are missing.
    pub async fn ensure_schema(&self) -> std::result::Result<(), DbError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        info!("Database schema is in place.");
        Ok(())
    }

    async fn client(&self, operation: &'static str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MediationError::storage(operation, e))
    }
}

impl PriorityStore for PgPriorityStore {
    type Transaction = PgPriorityTransaction;

    async fn begin(&self) -> Result<PgPriorityTransaction> {
        // Owned by the transaction before BEGIN is sent, so a cancelled or
        // failed start detaches the connection instead of pooling it.
        let tx = PgPriorityTransaction {
            client: Some(self.client("begin").await?),
        };
        tx.client("begin")?
            .batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")
            .await
            .map_err(|e| MediationError::storage("begin", e))?;
        debug!("Transaction started.");
        Ok(tx)
    }

    async fn list_networks_ordered_by_score_desc(
        &self,
        country_code: &str,
        ad_type: &str,
    ) -> Result<Vec<NetworkScore>> {
        const OP: &str = "list_networks_ordered_by_score_desc";
        let client = self.client(OP).await?;
        let stmt = client
            .prepare_cached(SELECT_NETWORKS_SQL)
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        let rows = client
            .query(&stmt, &[&country_code, &ad_type])
            .await
            .map_err(|e| MediationError::storage(OP, e))?;

        rows.iter()
            .map(|row| {
                Ok(NetworkScore {
                    network_name: row.try_get(0).map_err(|e| MediationError::storage(OP, e))?,
                    score: row.try_get(1).map_err(|e| MediationError::storage(OP, e))?,
                })
            })
            .collect()
    }

    async fn list_priority_rows(&self) -> Result<Vec<PriorityListRow>> {
        const OP: &str = "list_priority_rows";
        let client = self.client(OP).await?;
        let stmt = client
            .prepare_cached(SELECT_DASHBOARD_SQL)
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        let rows = client
            .query(&stmt, &[])
            .await
            .map_err(|e| MediationError::storage(OP, e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.try_get(3).map_err(|e| MediationError::storage(OP, e))?;
            let score: Option<f32> = row.try_get(4).map_err(|e| MediationError::storage(OP, e))?;
            out.push(PriorityListRow {
                country_code: row.try_get(0).map_err(|e| MediationError::storage(OP, e))?,
                ad_type: row.try_get(1).map_err(|e| MediationError::storage(OP, e))?,
                last_updated: row.try_get(2).map_err(|e| MediationError::storage(OP, e))?,
                network: name.zip(score).map(|(network_name, score)| NetworkScore {
                    network_name,
                    score,
                }),
            });
        }
        Ok(out)
    }
}

/// An open transaction holding its pooled connection.
///
/// Dropped without `commit`/`rollback` (e.g. when a timeout cancels the
/// upsert) the connection is detached from the pool and closed, and the
/// server rolls the transaction back.
pub struct PgPriorityTransaction {
    client: Option<Object>,
}

impl PgPriorityTransaction {
    fn client(&self, operation: &'static str) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| MediationError::storage(operation, "transaction already finished"))
    }

    /// Sends COMMIT or ROLLBACK. The connection stays owned by `self` until
    /// the server has answered, so dropping this future mid-statement
    /// detaches it through `Drop`. After an error the transaction state is
    /// unknown and `Drop` detaches it as well.
    async fn finish(mut self, statement: &'static str, operation: &'static str) -> Result<()> {
        self.client(operation)?
            .batch_execute(statement)
            .await
            .map_err(|e| MediationError::storage(operation, e))?;

        // Back to the pool only once the transaction is closed.
        drop(self.client.take());
        debug!(statement, "Transaction finished.");
        Ok(())
    }
}

impl PriorityTransaction for PgPriorityTransaction {
    async fn find_or_create_list(&mut self, country_code: &str, ad_type: &str) -> Result<ListId> {
        const OP: &str = "find_or_create_list";
        let client = self.client(OP)?;
        let stmt = client
            .prepare_cached(UPSERT_LIST_SQL)
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        let row = client
            .query_one(&stmt, &[&country_code, &ad_type])
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        row.try_get(0).map_err(|e| MediationError::storage(OP, e))
    }

    async fn upsert_network(&mut self, list_id: ListId, network_name: &str, score: f32) -> Result<()> {
        const OP: &str = "upsert_network";
        let client = self.client(OP)?;
        let stmt = client
            .prepare_cached(UPSERT_NETWORK_SQL)
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        client
            .execute(&stmt, &[&list_id, &network_name, &score])
            .await
            .map_err(|e| MediationError::storage(OP, e))?;
        Ok(())
    }

    async fn delete_networks_not_in(
        &mut self,
        list_id: ListId,
        keep_names: &BTreeSet<String>,
    ) -> Result<u64> {
        const OP: &str = "delete_networks_not_in";
        let client = self.client(OP)?;
        let query = DeleteNotInQuery::new(&list_id, keep_names);
        client
            .execute(query.sql(), query.params())
            .await
            .map_err(|e| MediationError::storage(OP, e))
    }

    async fn commit(self) -> Result<()> {
        self.finish("COMMIT", "commit").await
    }

    async fn rollback(self) -> Result<()> {
        self.finish("ROLLBACK", "rollback").await
    }
}

impl Drop for PgPriorityTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("Transaction left open; closing its connection.");
            drop(Object::take(client));
        }
    }
}
