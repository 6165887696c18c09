//! SQL identifier quoting.
//!
//! Identifiers cannot be bound as parameters, so they are embedded as quoted
//! identifiers: the name is wrapped in `"` and any embedded `"` is doubled. A
//! quoted name is always a single identifier token, whatever characters it holds.
//!
//! # Example
//! ```ignore
//! use pgdal::location;
//!
//! let users = location("SiteData", "UserDat");
//! assert_eq!(users.to_sql(), r#""SiteData"."UserDat""#);
//! ```

use std::fmt;

/// Append `name` to `out` as a quoted identifier.
pub(crate) fn write_quoted(name: &str, out: &mut String) {
    out.reserve(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

/// Render `name` as a quoted identifier.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::new();
    write_quoted(name, &mut out);
    out
}

/// A schema-qualified table: `"schema"."table"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    sql: String,
}

impl Location {
    /// Quote `schema` and `table` independently and join them with `.`.
    pub fn new(schema: &str, table: &str) -> Self {
        let mut sql = String::with_capacity(schema.len() + table.len() + 5);
        write_quoted(schema, &mut sql);
        sql.push('.');
        write_quoted(table, &mut sql);
        Self { sql }
    }

    /// The rendered identifier.
    pub fn to_sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Shorthand for [`Location::new`].
pub fn location(schema: &str, table: &str) -> Location {
    Location::new(schema, table)
}
