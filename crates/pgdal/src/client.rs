//! Connection traits and the tokio-postgres implementations.
//!
//! The executor never shares a connection between calls: each operation asks
//! a [`Connector`] for a fresh [`Connection`] and drops it before returning.
//! Dropping is the release (a plain client closes its socket, a pooled one
//! goes back to the pool).

use crate::config::DbConfig;
use crate::error::{OrmError, OrmResult};
use crate::row::ResultSet;
use crate::value::Value;
use std::sync::Arc;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

/// A live database connection, held for one operation.
pub trait Connection: Send + Sync {
    /// Execute a query and return its columns and rows.
    ///
    /// Column names come from the statement description, so they are known
    /// even when no row matches.
    fn query(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<ResultSet>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

/// Opens connections. Implementations hold only configuration or a pool
/// handle, so a connector can be used from many tasks at once.
pub trait Connector: Send + Sync {
    type Conn: Connection;

    fn open(&self) -> impl std::future::Future<Output = OrmResult<Self::Conn>> + Send;
}

impl<C: Connector> Connector for Arc<C> {
    type Conn = C::Conn;

    fn open(&self) -> impl std::future::Future<Output = OrmResult<Self::Conn>> + Send {
        C::open(self)
    }
}

pub(crate) fn bind(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn decode_row(row: &tokio_postgres::Row, columns: &[String]) -> OrmResult<Vec<Value>> {
    (0..row.len())
        .map(|i| {
            row.try_get::<_, Value>(i).map_err(|e| {
                let column = columns.get(i).map_or("?", String::as_str);
                OrmError::decode(column, e.to_string())
            })
        })
        .collect()
}

pub(crate) async fn query_client(
    client: &tokio_postgres::Client,
    sql: &str,
    values: &[Value],
) -> OrmResult<ResultSet> {
    let stmt = client
        .prepare(sql)
        .await
        .map_err(OrmError::from_db_error)?;
    let columns: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let params = bind(values);
    let rows = client
        .query(&stmt, &params)
        .await
        .map_err(OrmError::from_db_error)?;

    let rows = rows
        .iter()
        .map(|row| decode_row(row, &columns))
        .collect::<OrmResult<Vec<_>>>()?;
    Ok(ResultSet::new(columns, rows))
}

pub(crate) async fn execute_client(
    client: &tokio_postgres::Client,
    sql: &str,
    values: &[Value],
) -> OrmResult<u64> {
    let params = bind(values);
    client
        .execute(sql, &params)
        .await
        .map_err(OrmError::from_db_error)
}

impl Connection for tokio_postgres::Client {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<ResultSet> {
        query_client(self, sql, values).await
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> OrmResult<u64> {
        execute_client(self, sql, values).await
    }
}

/// Opens a dedicated connection per call (no pooling).
///
/// The connection driver runs on a spawned tokio task that ends when the
/// returned client is dropped.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: tokio_postgres::Config,
}

impl PgConnector {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            config: config.to_pg_config(),
        }
    }

    /// Use an already-built driver configuration.
    pub fn from_pg_config(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

impl Connector for PgConnector {
    type Conn = tokio_postgres::Client;

    async fn open(&self) -> OrmResult<Self::Conn> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "pgdal", error = %e, "connection closed with error");
            }
        });

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn bind_keeps_order_and_length() {
        let values = values!["a", 1, None::<i64>];
        let params = bind(&values);
        assert_eq!(params.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_failure() {
        let config = DbConfig::default()
            .host("127.0.0.1")
            .port(1)
            .connect_timeout(std::time::Duration::from_millis(200));
        let err = PgConnector::new(&config).open().await.unwrap_err();
        assert!(err.is_connection_failure());
    }
}
