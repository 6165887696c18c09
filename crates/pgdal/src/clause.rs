//! Clause builders.
//!
//! Each builder returns a [`Clause`]: a template fragment with a known number
//! of slots, consumed left to right. Field names are emitted as quoted
//! identifiers but must still come from trusted, schema-derived code.
//!
//! # Example
//! ```ignore
//! use pgdal::{BoolOp, PatternMode, clause};
//!
//! let filter = clause::conditionals([
//!     clause::where_eq("Email").into(),
//!     BoolOp::Or.into(),
//!     clause::like("Username", PatternMode::Anywhere).into(),
//! ])?;
//! assert_eq!(filter.to_marked(), r#""Email"=? OR "Username" LIKE 3"#);
//! ```

use crate::error::{OrmError, OrmResult};
use crate::template::{PatternMode, Template};
use std::fmt;

/// A composable SQL fragment with a known slot count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Clause {
    template: Template,
}

impl Clause {
    /// Wrap an existing template.
    pub fn from_template(template: Template) -> Self {
        Self { template }
    }

    /// Raw SQL with no slots. Any `?` inside is literal SQL text.
    pub fn raw(sql: &str) -> Self {
        Self::from_template(Template::new(sql))
    }

    /// Lex a clause written in marked form (`?` slots, `LIKE 1|2|3` markers).
    pub fn parse_marked(text: &str) -> Self {
        Self::from_template(Template::parse_marked(text))
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }

    pub fn slot_count(&self) -> usize {
        self.template.slot_count()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    pub fn to_marked(&self) -> String {
        self.template.to_marked()
    }

    /// `self AND other`
    pub fn and(self, other: Clause) -> Clause {
        self.join(BoolOp::And, other)
    }

    /// `self OR other`
    pub fn or(self, other: Clause) -> Clause {
        self.join(BoolOp::Or, other)
    }

    fn join(mut self, op: BoolOp, other: Clause) -> Clause {
        self.template.push(" ").push(op.as_str()).push(" ");
        self.template.push_template(&other.template);
        self
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.template, f)
    }
}

/// Boolean connective between clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

/// One item of a [`conditionals`] chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainItem {
    Clause(Clause),
    Op(BoolOp),
}

impl From<Clause> for ChainItem {
    fn from(clause: Clause) -> Self {
        ChainItem::Clause(clause)
    }
}

impl From<BoolOp> for ChainItem {
    fn from(op: BoolOp) -> Self {
        ChainItem::Op(op)
    }
}

/// `"f0"=?,"f1"=?,...`, one slot per field.
pub fn set<I, S>(fields: I) -> Clause
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut t = Template::empty();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            t.push(",");
        }
        t.push_ident(field.as_ref()).push("=").push_param();
    }
    Clause::from_template(t)
}

/// `"field"=?`, one slot.
pub fn where_eq(field: &str) -> Clause {
    let mut t = Template::empty();
    t.push_ident(field).push("=").push_param();
    Clause::from_template(t)
}

/// `"field" LIKE <marker>`, one slot tagged with `mode`.
pub fn like(field: &str, mode: PatternMode) -> Clause {
    let mut t = Template::empty();
    t.push_ident(field).push(" ").push_like(mode);
    Clause::from_template(t)
}

/// Join clauses and connectives with single spaces.
///
/// The chain must be non-empty, start and end on a clause, and alternate
/// clause / connective. Anything else is rejected.
pub fn conditionals<I>(items: I) -> OrmResult<Clause>
where
    I: IntoIterator<Item = ChainItem>,
{
    let mut t = Template::empty();
    let mut expect_clause = true;
    let mut len = 0usize;

    for item in items {
        match (item, expect_clause) {
            (ChainItem::Clause(clause), true) => {
                if clause.is_empty() {
                    return Err(OrmError::validation(format!(
                        "conditional chain: empty clause at position {len}"
                    )));
                }
                t.push_template(&clause.template);
            }
            (ChainItem::Op(op), false) => {
                t.push(" ").push(op.as_str()).push(" ");
            }
            (ChainItem::Clause(_), false) => {
                return Err(OrmError::validation(format!(
                    "conditional chain: expected AND/OR at position {len}, got a clause"
                )));
            }
            (ChainItem::Op(op), true) => {
                return Err(OrmError::validation(format!(
                    "conditional chain: expected a clause at position {len}, got {}",
                    op.as_str()
                )));
            }
        }
        expect_clause = !expect_clause;
        len += 1;
    }

    if len == 0 {
        return Err(OrmError::validation("conditional chain is empty"));
    }
    if expect_clause {
        return Err(OrmError::validation(
            "conditional chain ends on a connective",
        ));
    }
    Ok(Clause::from_template(t))
}
