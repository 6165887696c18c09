//! Configuration for connectors and the executor.
//!
//! Configuration is always an explicit value handed to a constructor; there is
//! no process-wide state.

use crate::error::{OrmError, OrmResult};
use std::time::Duration;

/// Environment variable read by [`DbConfig::from_env`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Where and how to connect.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub application_name: Option<String>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Option<Duration>,
    /// Maximum pool size, used by the pooled connector.
    pub pool_max_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5433,
            dbname: "Polyopus".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            application_name: None,
            connect_timeout: Some(Duration::from_secs(10)),
            pool_max_size: 16,
        }
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_max_size", &self.pool_max_size)
            .finish()
    }
}

impl DbConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `postgres://` URL or a `key=value` connection string.
    ///
    /// Fields the string leaves out keep their defaults.
    pub fn from_url(url: &str) -> OrmResult<Self> {
        let parsed: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| OrmError::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(tokio_postgres::config::Host::Tcp(host)) = parsed.get_hosts().first() {
            config.host = host.clone();
        }
        if let Some(port) = parsed.get_ports().first() {
            config.port = *port;
        }
        if let Some(dbname) = parsed.get_dbname() {
            config.dbname = dbname.to_string();
        }
        if let Some(user) = parsed.get_user() {
            config.user = user.to_string();
        }
        if let Some(password) = parsed.get_password() {
            config.password = String::from_utf8(password.to_vec())
                .map_err(|_| OrmError::Config("password is not valid UTF-8".to_string()))?;
        }
        if let Some(name) = parsed.get_application_name() {
            config.application_name = Some(name.to_string());
        }
        if let Some(timeout) = parsed.get_connect_timeout() {
            config.connect_timeout = Some(*timeout);
        }
        Ok(config)
    }

    /// Read `DATABASE_URL`, loading a `.env` file first if one exists.
    pub fn from_env() -> OrmResult<Self> {
        let _ = dotenvy::dotenv();
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| OrmError::Config(format!("{DATABASE_URL_ENV} is not set")))?;
        Self::from_url(&url)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Set the login role and password.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn pool_max_size(mut self, size: usize) -> Self {
        self.pool_max_size = size;
        self
    }

    /// Build the driver configuration.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user);
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        if let Some(name) = &self.application_name {
            pg.application_name(name);
        }
        if let Some(timeout) = self.connect_timeout {
            pg.connect_timeout(timeout);
        }
        pg
    }
}

/// Executor behaviour that is not about connecting.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Truncate SQL in debug logs to this many bytes. `None` logs it whole.
    pub max_logged_sql: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_logged_sql: Some(200),
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum SQL length to log.
    pub fn max_logged_sql(mut self, len: usize) -> Self {
        self.max_logged_sql = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_logged_sql = None;
        self
    }
}
