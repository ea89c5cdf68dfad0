use crate::model::error::DatabaseResult;
use sqlx::PgPool;

/// Handle to the shared Postgres pool. Cloning is cheap, the pool is a
/// wrapper around `Arc<>`.
#[derive(Debug, Clone)]
pub struct DbConnection {
    pool: PgPool,
}

impl DbConnection {
    /// Lazy connection: the first query, not this call, establishes the
    /// actual link to the store.
    pub fn connect(connection_str: &str) -> DatabaseResult<Self> {
        let pool = PgPool::connect_lazy(connection_str)?;
        Ok(Self { pool })
    }

    /// Wraps an already-connected pool; used by the test harness.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
