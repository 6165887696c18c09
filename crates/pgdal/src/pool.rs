//! Connection pool utilities

use crate::client::{Connection, Connector, execute_client, query_client};
use crate::config::DbConfig;
use crate::error::{OrmError, OrmResult};
use crate::row::ResultSet;
use crate::value::Value;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a connection pool from a [`DbConfig`] (no TLS).
///
/// # Example
///
/// ```ignore
/// let pool = pgdal::create_pool(&DbConfig::from_env()?)?;
/// let executor = Executor::new(PoolConnector::new(pool));
/// ```
pub fn create_pool(config: &DbConfig) -> OrmResult<Pool> {
    let max_size = config.pool_max_size;
    create_pool_with_manager_config(config, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a connection pool with a custom TLS connector and pool tuning.
pub fn create_pool_with_manager_config<T>(
    config: &DbConfig,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> OrmResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let mgr = Manager::from_config(config.to_pg_config(), tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

/// Checks out one pooled connection per call; dropping it returns it to the pool.
#[derive(Clone)]
pub struct PoolConnector {
    pool: Pool,
}

impl PoolConnector {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the pool from `config` and wrap it.
    pub fn from_config(config: &DbConfig) -> OrmResult<Self> {
        Ok(Self::new(create_pool(config)?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl std::fmt::Debug for PoolConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnector")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl Connector for PoolConnector {
    type Conn = Object;

    async fn open(&self) -> OrmResult<Self::Conn> {
        Ok(self.pool.get().await?)
    }
}

impl Connection for Object {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<ResultSet> {
        query_client(self, sql, values).await
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> OrmResult<u64> {
        execute_client(self, sql, values).await
    }
}
