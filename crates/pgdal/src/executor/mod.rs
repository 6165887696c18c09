//! Statement execution.
//!
//! Every [`Executor`] operation follows the same path: build a [`Template`]
//! from the location and clauses, rewrite LIKE markers, render `$n` SQL, then
//! open one connection, run the statement and drop the connection. Malformed
//! input (slot/value mismatches, missing WHERE or SET) is rejected before a
//! connection is opened.
//!
//! Failures come back as [`OrmError`] and are logged once here, on target
//! `pgdal`. A query that matches nothing is not a failure. Callers that want
//! the old silent behaviour can go through [`Executor::lenient`].

use crate::client::{Connection, Connector};
use crate::clause::{self, Clause};
use crate::config::ExecutorConfig;
use crate::error::{OrmError, OrmResult};
use crate::ident::Location;
use crate::rewrite::Statement;
use crate::row::{ResultSet, Row};
use crate::template::Template;
use crate::value::Value;

/// Runs statements built from clauses against connections from `C`.
#[derive(Debug, Clone)]
pub struct Executor<C> {
    connector: C,
    config: ExecutorConfig,
}

impl<C: Connector> Executor<C> {
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, ExecutorConfig::default())
    }

    pub fn with_config(connector: C, config: ExecutorConfig) -> Self {
        Self { connector, config }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// A view with absent/empty/false/zero results in place of errors.
    pub fn lenient(&self) -> Lenient<'_, C> {
        Lenient { executor: self }
    }

    // ==================== Reads ====================

    /// `SELECT * FROM <location> WHERE <filter> LIMIT 1`
    pub async fn select_one(
        &self,
        location: &Location,
        filter: &Clause,
        values: Vec<Value>,
    ) -> OrmResult<Option<Row>> {
        let result: OrmResult<Option<Row>> = async {
            let mut t = select_from(location, filter, "SELECT")?;
            t.push(" LIMIT 1");
            let set = self.run_query("select_one", t, values).await?;
            Ok(set.into_rows()?.into_iter().next())
        }
        .await;
        log_failure("select_one", location, result)
    }

    /// `select_one` on `"field"=?`.
    pub async fn select_one_by(
        &self,
        location: &Location,
        field: &str,
        value: impl Into<Value>,
    ) -> OrmResult<Option<Row>> {
        self.select_one(location, &clause::where_eq(field), vec![value.into()])
            .await
    }

    /// `SELECT * FROM <location> WHERE <filter>`; empty when nothing matches.
    pub async fn select_many(
        &self,
        location: &Location,
        filter: &Clause,
        values: Vec<Value>,
    ) -> OrmResult<Vec<Row>> {
        let result: OrmResult<Vec<Row>> = async {
            let t = select_from(location, filter, "SELECT")?;
            self.run_query("select_many", t, values).await?.into_rows()
        }
        .await;
        log_failure("select_many", location, result)
    }

    /// `select_many` on `"field"=?`.
    pub async fn select_many_by(
        &self,
        location: &Location,
        field: &str,
        value: impl Into<Value>,
    ) -> OrmResult<Vec<Row>> {
        self.select_many(location, &clause::where_eq(field), vec![value.into()])
            .await
    }

    /// `SELECT * FROM <location>`
    pub async fn select_all(&self, location: &Location) -> OrmResult<Vec<Row>> {
        let result: OrmResult<Vec<Row>> = async {
            let mut t = Template::new("SELECT * FROM ");
            t.push_location(location);
            self.run_query("select_all", t, Vec::new())
                .await?
                .into_rows()
        }
        .await;
        log_failure("select_all", location, result)
    }

    /// `SELECT COUNT(*) AS count FROM <location> WHERE <filter>`
    pub async fn count(
        &self,
        location: &Location,
        filter: &Clause,
        values: Vec<Value>,
    ) -> OrmResult<i64> {
        let result: OrmResult<i64> = async {
            let mut t = Template::new("SELECT COUNT(*) AS count FROM ");
            t.push_location(location).push(" WHERE ");
            require_filter(filter, "SELECT COUNT")?;
            t.push_clause(filter);
            match self.run_query("count", t, values).await?.into_scalar() {
                Some(Value::Int(n)) => Ok(n),
                Some(other) => Err(OrmError::decode(
                    "count",
                    format!("expected integer, got {}", other.kind()),
                )),
                None => Err(OrmError::decode("count", "COUNT(*) returned no row")),
            }
        }
        .await;
        log_failure("count", location, result)
    }

    // ==================== Writes ====================

    /// `UPDATE <location> SET <set> WHERE <filter>`.
    ///
    /// `set_values` are bound before `filter_values`. Returns whether at
    /// least one row was affected.
    pub async fn update(
        &self,
        location: &Location,
        set: &Clause,
        set_values: Vec<Value>,
        filter: &Clause,
        filter_values: Vec<Value>,
    ) -> OrmResult<bool> {
        let result: OrmResult<bool> = async {
            if set.is_empty() {
                return Err(OrmError::validation("UPDATE requires at least one SET field"));
            }
            require_filter(filter, "UPDATE")?;
            check_slots(set, &set_values)?;
            check_slots(filter, &filter_values)?;

            let mut t = Template::new("UPDATE ");
            t.push_location(location).push(" SET ");
            t.push_clause(set).push(" WHERE ").push_clause(filter);

            let mut values = set_values;
            values.extend(filter_values);
            Ok(self.run_execute("update", t, values).await? > 0)
        }
        .await;
        log_failure("update", location, result)
    }

    /// `DELETE FROM <location> WHERE <filter>`
    pub async fn delete(
        &self,
        location: &Location,
        filter: &Clause,
        values: Vec<Value>,
    ) -> OrmResult<bool> {
        let result: OrmResult<bool> = async {
            let mut t = Template::new("DELETE FROM ");
            t.push_location(location).push(" WHERE ");
            require_filter(filter, "DELETE")?;
            t.push_clause(filter);
            Ok(self.run_execute("delete", t, values).await? > 0)
        }
        .await;
        log_failure("delete", location, result)
    }

    /// `INSERT INTO <location> ("f0",...) VALUES ($1,...)`
    pub async fn insert<S: AsRef<str>>(
        &self,
        location: &Location,
        fields: &[S],
        values: Vec<Value>,
    ) -> OrmResult<bool> {
        let result: OrmResult<bool> = async {
            let t = insert_into(location, fields, &values)?;
            Ok(self.run_execute("insert", t, values).await? > 0)
        }
        .await;
        log_failure("insert", location, result)
    }

    /// `insert` plus `RETURNING "<column>"`; yields the returned value.
    pub async fn insert_returning<S: AsRef<str>>(
        &self,
        location: &Location,
        fields: &[S],
        values: Vec<Value>,
        column: &str,
    ) -> OrmResult<Option<Value>> {
        let result: OrmResult<Option<Value>> = async {
            let mut t = insert_into(location, fields, &values)?;
            t.push(" RETURNING ").push_ident(column);
            Ok(self
                .run_query("insert_returning", t, values)
                .await?
                .into_scalar())
        }
        .await;
        log_failure("insert_returning", location, result)
    }

    // ==================== Plumbing ====================

    async fn run_query(
        &self,
        op: &'static str,
        template: Template,
        values: Vec<Value>,
    ) -> OrmResult<ResultSet> {
        let stmt = Statement::prepare(template, values)?;
        self.trace(op, &stmt);
        let conn = self.connector.open().await?;
        conn.query(stmt.sql(), stmt.values()).await
    }

    async fn run_execute(
        &self,
        op: &'static str,
        template: Template,
        values: Vec<Value>,
    ) -> OrmResult<u64> {
        let stmt = Statement::prepare(template, values)?;
        self.trace(op, &stmt);
        let conn = self.connector.open().await?;
        conn.execute(stmt.sql(), stmt.values()).await
    }

    fn trace(&self, op: &'static str, stmt: &Statement) {
        let sql = match self.config.max_logged_sql {
            Some(max) if stmt.sql().len() > max => {
                format!("{}...", truncate_sql_bytes(stmt.sql(), max))
            }
            _ => stmt.sql().to_string(),
        };
        tracing::debug!(
            target: "pgdal.sql",
            op,
            param_count = stmt.values().len(),
            sql = %sql,
            "executing statement"
        );
    }
}

fn select_from(location: &Location, filter: &Clause, what: &str) -> OrmResult<Template> {
    require_filter(filter, what)?;
    let mut t = Template::new("SELECT * FROM ");
    t.push_location(location).push(" WHERE ").push_clause(filter);
    Ok(t)
}

fn insert_into<S: AsRef<str>>(
    location: &Location,
    fields: &[S],
    values: &[Value],
) -> OrmResult<Template> {
    if fields.is_empty() {
        return Err(OrmError::validation("INSERT requires at least one field"));
    }
    if fields.len() != values.len() {
        return Err(OrmError::param_count(fields.len(), values.len()));
    }

    let mut t = Template::new("INSERT INTO ");
    t.push_location(location).push(" (");
    t.push_ident_list(fields).push(") VALUES (");
    for i in 0..fields.len() {
        if i > 0 {
            t.push(",");
        }
        t.push_param();
    }
    t.push(")");
    Ok(t)
}

fn require_filter(filter: &Clause, what: &str) -> OrmResult<()> {
    if filter.is_empty() {
        return Err(OrmError::validation(format!("{what} requires a WHERE clause")));
    }
    Ok(())
}

fn check_slots(clause: &Clause, values: &[Value]) -> OrmResult<()> {
    let expected = clause.slot_count();
    if expected != values.len() {
        return Err(OrmError::param_count(expected, values.len()));
    }
    Ok(())
}

fn log_failure<T>(op: &'static str, location: &Location, result: OrmResult<T>) -> OrmResult<T> {
    if let Err(e) = &result {
        if e.is_malformed_input() {
            tracing::error!(target: "pgdal", op, location = %location, error = %e, "rejected malformed statement");
        } else {
            tracing::error!(target: "pgdal", op, location = %location, error = %e, "statement failed");
        }
    }
    result
}

/// Cut `sql` to at most `max` bytes on a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max: usize) -> &str {
    if sql.len() <= max {
        return sql;
    }
    let mut end = max;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Executor view with the silent-degradation contract: any failure becomes
/// `None`, an empty vector, `false` or `0`.
///
/// The failure itself has already been logged by the executor, so a caller
/// cannot tell "no match" from "query failed" here.
#[derive(Debug, Clone, Copy)]
pub struct Lenient<'a, C> {
    executor: &'a Executor<C>,
}

impl<C: Connector> Lenient<'_, C> {
    pub async fn select_one(&self, location: &Location, filter: &Clause, values: Vec<Value>) -> Option<Row> {
        self.executor
            .select_one(location, filter, values)
            .await
            .ok()
            .flatten()
    }

    pub async fn select_many(&self, location: &Location, filter: &Clause, values: Vec<Value>) -> Vec<Row> {
        self.executor
            .select_many(location, filter, values)
            .await
            .unwrap_or_default()
    }

    pub async fn select_all(&self, location: &Location) -> Vec<Row> {
        self.executor.select_all(location).await.unwrap_or_default()
    }

    pub async fn count(&self, location: &Location, filter: &Clause, values: Vec<Value>) -> i64 {
        self.executor
            .count(location, filter, values)
            .await
            .unwrap_or(0)
    }

    pub async fn update(
        &self,
        location: &Location,
        set: &Clause,
        set_values: Vec<Value>,
        filter: &Clause,
        filter_values: Vec<Value>,
    ) -> bool {
        self.executor
            .update(location, set, set_values, filter, filter_values)
            .await
            .unwrap_or(false)
    }

    pub async fn delete(&self, location: &Location, filter: &Clause, values: Vec<Value>) -> bool {
        self.executor
            .delete(location, filter, values)
            .await
            .unwrap_or(false)
    }

    pub async fn insert<S: AsRef<str>>(&self, location: &Location, fields: &[S], values: Vec<Value>) -> bool {
        self.executor
            .insert(location, fields, values)
            .await
            .unwrap_or(false)
    }

    pub async fn insert_returning<S: AsRef<str>>(
        &self,
        location: &Location,
        fields: &[S],
        values: Vec<Value>,
        column: &str,
    ) -> Option<Value> {
        self.executor
            .insert_returning(location, fields, values, column)
            .await
            .ok()
            .flatten()
    }
}
