//! # pgdal
//!
//! A small PostgreSQL data-access layer.
//!
//! ## Features
//!
//! - **Clause builders**: SET lists, WHERE equality, AND/OR chains and LIKE
//!   predicates as token streams with known slot counts
//! - **LIKE rewriting**: wildcard placement is declared on the clause
//!   (`PatternMode`) and applied to the bound value, never spliced into SQL
//! - **Quoted identifiers**: schema, table and field names are always quoted
//! - **Scoped connections**: one connection per operation, released on drop
//! - **Typed errors**: `OrmResult` everywhere, with a `Lenient` view for
//!   callers that want absent/empty results instead
//! - **User repository**: registration, salted-hash authentication and lookups
//!
//! ## Example
//!
//! ```ignore
//! use pgdal::{DbConfig, Executor, PatternMode, PgConnector, clause, location, values};
//!
//! let exec = Executor::new(PgConnector::new(&DbConfig::from_env()?));
//! let users = location("SiteData", "UserDat");
//!
//! let smiths = exec
//!     .select_many(&users, &clause::like("Username", PatternMode::Anywhere), values!["smith"])
//!     .await?;
//!
//! exec.update(
//!     &users,
//!     &clause::set(["Email"]),
//!     values!["new@example.com"],
//!     &clause::where_eq("Username"),
//!     values!["alice"],
//! )
//! .await?;
//! ```

pub mod clause;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod ident;
pub mod password;
pub mod rewrite;
pub mod row;
pub mod template;
pub mod testing;
pub mod users;
pub mod value;

pub use clause::{BoolOp, ChainItem, Clause, conditionals, like, set, where_eq};
pub use client::{Connection, Connector, PgConnector};
pub use config::{DATABASE_URL_ENV, DbConfig, ExecutorConfig};
pub use error::{OrmError, OrmResult};
pub use executor::{Executor, Lenient};
pub use ident::{Location, location, quote_ident};
pub use password::{PasswordConfig, hash_password, hash_password_with, verify_password};
pub use rewrite::{Statement, rewrite_like};
pub use row::{FromRow, ResultSet, Row};
pub use template::{PatternMode, Template, Token};
pub use users::{InsertUserOutcome, NewUser, User, UserRepository, UserTable};
pub use value::{FromValue, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{PoolConnector, create_pool, create_pool_with_manager_config};
