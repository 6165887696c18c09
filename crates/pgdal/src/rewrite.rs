//! LIKE marker rewriting.
//!
//! [`rewrite_like`] walks a template once, left to right. Every LIKE marker
//! becomes `LIKE ` plus an ordinary slot, and the value bound to that slot is
//! replaced by its wildcard-wrapped form. Ordinary slots and raw text pass
//! through untouched, so a template without markers comes back unchanged.

use crate::error::{OrmError, OrmResult};
use crate::template::{Template, Token};
use crate::value::Value;

/// Rewrite LIKE markers into ordinary slots, wrapping their values.
///
/// `values` must hold exactly one value per slot (ordinary or LIKE), in the
/// order the slots appear. A LIKE slot must be bound to [`Value::Text`].
pub fn rewrite_like(template: Template, mut values: Vec<Value>) -> OrmResult<(Template, Vec<Value>)> {
    let expected = template.slot_count();
    if expected != values.len() {
        return Err(OrmError::param_count(expected, values.len()));
    }
    if template.like_count() == 0 {
        return Ok((template, values));
    }

    let mut out = Template::empty();
    // 1-based, matching the `$n` the slot will render as.
    let mut slot: usize = 1;

    for token in template.into_tokens() {
        match token {
            Token::Raw(s) => {
                out.push(&s);
            }
            Token::Param => {
                out.push_param();
                slot += 1;
            }
            Token::Like(mode) => {
                match &mut values[slot - 1] {
                    Value::Text(text) => {
                        let wrapped = mode.wrap(text);
                        *text = wrapped;
                    }
                    other => {
                        return Err(OrmError::validation(format!(
                            "LIKE slot ${slot} must be bound to text, got {}",
                            other.kind()
                        )));
                    }
                }
                out.push("LIKE ").push_param();
                slot += 1;
            }
        }
    }

    Ok((out, values))
}

/// A statement ready for the driver: `$n` SQL plus its values in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    values: Vec<Value>,
}

impl Statement {
    /// Rewrite LIKE markers and render `$n` placeholders.
    pub fn prepare(template: Template, values: Vec<Value>) -> OrmResult<Self> {
        let (template, values) = rewrite_like(template, values)?;
        let sql = template.to_sql()?;
        Ok(Self { sql, values })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.values)
    }
}
