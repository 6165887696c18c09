//! In-memory connector for tests.
//!
//! [`ScriptedConnector`] hands out connections that answer from a shared
//! queue of scripted replies and record every statement they receive. It lets
//! executor and repository code run without a database.
//!
//! ```ignore
//! let conn = ScriptedConnector::new();
//! conn.push_rows(&["UserID"], vec![values![id]]);
//! let exec = Executor::new(conn.clone());
//! exec.select_one_by(&loc, "Username", "alice").await?;
//! assert_eq!(conn.statements()[0].values, values!["alice"]);
//! ```

use crate::client::{Connection, Connector};
use crate::error::{OrmError, OrmResult};
use crate::row::ResultSet;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A statement as received by a scripted connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug)]
enum Reply {
    Rows(ResultSet),
    Affected(u64),
    Fail(OrmError),
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<Reply>,
    log: Vec<Recorded>,
    opened: usize,
    refuse: Option<String>,
}

/// Connector whose connections replay scripted replies in order.
///
/// Clones share the same script and log. With the queue empty a query yields
/// no rows and an execute affects nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<State>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Queue a query reply.
    pub fn push_rows(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.lock()
            .replies
            .push_back(Reply::Rows(ResultSet::new(columns, rows)));
        self
    }

    /// Queue a query reply with columns but no rows.
    pub fn push_empty(&self, columns: &[&str]) -> &Self {
        self.push_rows(columns, Vec::new())
    }

    /// Queue an execute reply.
    pub fn push_affected(&self, count: u64) -> &Self {
        self.lock().replies.push_back(Reply::Affected(count));
        self
    }

    /// Queue a failure for the next statement.
    pub fn push_error(&self, err: OrmError) -> &Self {
        self.lock().replies.push_back(Reply::Fail(err));
        self
    }

    /// Make every following `open` fail with a connection error.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        self.lock().refuse = Some(reason.into());
    }

    /// Every statement received so far, oldest first.
    pub fn statements(&self) -> Vec<Recorded> {
        self.lock().log.clone()
    }

    /// SQL of every statement received so far.
    pub fn sql(&self) -> Vec<String> {
        self.lock().log.iter().map(|r| r.sql.clone()).collect()
    }

    /// How many connections were opened.
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }
}

impl Connector for ScriptedConnector {
    type Conn = ScriptedConnection;

    async fn open(&self) -> OrmResult<Self::Conn> {
        let mut state = self.lock();
        if let Some(reason) = &state.refuse {
            return Err(OrmError::Connection(reason.clone()));
        }
        state.opened += 1;
        Ok(ScriptedConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection handed out by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedConnection {
    state: Arc<Mutex<State>>,
}

impl ScriptedConnection {
    fn next_reply(&self, sql: &str, values: &[Value]) -> Option<Reply> {
        let mut state = lock(&self.state);
        state.log.push(Recorded {
            sql: sql.to_string(),
            values: values.to_vec(),
        });
        state.replies.pop_front()
    }
}

impl Connection for ScriptedConnection {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<ResultSet> {
        match self.next_reply(sql, values) {
            Some(Reply::Rows(set)) => Ok(set),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Affected(_)) => Err(OrmError::Other(format!(
                "scripted execute reply consumed by query: {sql}"
            ))),
            None => Ok(ResultSet::default()),
        }
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> OrmResult<u64> {
        match self.next_reply(sql, values) {
            Some(Reply::Affected(count)) => Ok(count),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Rows(_)) => Err(OrmError::Other(format!(
                "scripted query reply consumed by execute: {sql}"
            ))),
            None => Ok(0),
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
