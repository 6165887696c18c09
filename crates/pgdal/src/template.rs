//! Statement templates as token streams.
//!
//! A [`Template`] stores raw SQL text, ordinary placeholder slots and LIKE
//! marker slots as separate tokens, so placeholders are never recovered by
//! scanning SQL text. It has two textual forms:
//!
//! - the *marked* form, where a slot is `?` and a LIKE marker is `LIKE 1`,
//!   `LIKE 2` or `LIKE 3` (see [`PatternMode`]);
//! - the *rendered* form, with PostgreSQL `$1, $2, ...` placeholders. Only
//!   templates without LIKE markers can be rendered.
//!
//! Marked text can be lexed back with [`Template::parse_marked`]. The lexer
//! skips string literals (escape and dollar-quoted ones too), quoted
//! identifiers and comments, so a `?` or a
//! `LIKE 1` inside them stays plain text.

use crate::clause::Clause;
use crate::error::{OrmError, OrmResult};
use crate::ident::{Location, write_quoted};
use std::fmt::{self, Write as _};

/// Where the `%` wildcard goes around a LIKE value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternMode {
    /// `%value`, marker `1`
    Prefix,
    /// `value%`, marker `2`
    Postfix,
    /// `%value%`, marker `3`
    Anywhere,
}

impl PatternMode {
    pub const ALL: [PatternMode; 3] = [
        PatternMode::Prefix,
        PatternMode::Postfix,
        PatternMode::Anywhere,
    ];

    /// The single digit standing in for this mode in marked text.
    pub fn marker(self) -> char {
        match self {
            PatternMode::Prefix => '1',
            PatternMode::Postfix => '2',
            PatternMode::Anywhere => '3',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '1' => Some(PatternMode::Prefix),
            '2' => Some(PatternMode::Postfix),
            '3' => Some(PatternMode::Anywhere),
            _ => None,
        }
    }

    /// Wrap `text` with wildcards for this mode.
    pub fn wrap(self, text: &str) -> String {
        match self {
            PatternMode::Prefix => format!("%{text}"),
            PatternMode::Postfix => format!("{text}%"),
            PatternMode::Anywhere => format!("%{text}%"),
        }
    }
}

/// One element of a [`Template`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// SQL text emitted as-is.
    Raw(String),
    /// An ordinary placeholder slot.
    Param,
    /// A `LIKE` keyword plus a slot whose value still needs wildcard wrapping.
    Like(PatternMode),
}

/// A composed statement template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    /// Create a template from an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let mut t = Self::empty();
        t.push(&initial_sql.into());
        t
    }

    /// Create an empty template.
    pub fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Append raw SQL (no slots).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.tokens.last_mut() {
            Some(Token::Raw(last)) => last.push_str(sql),
            _ => self.tokens.push(Token::Raw(sql.to_string())),
        }
        self
    }

    /// Append an ordinary placeholder slot.
    pub fn push_param(&mut self) -> &mut Self {
        self.tokens.push(Token::Param);
        self
    }

    /// Append a LIKE marker slot.
    pub fn push_like(&mut self, mode: PatternMode) -> &mut Self {
        self.tokens.push(Token::Like(mode));
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, name: &str) -> &mut Self {
        match self.tokens.last_mut() {
            Some(Token::Raw(last)) => write_quoted(name, last),
            _ => {
                let mut s = String::new();
                write_quoted(name, &mut s);
                self.tokens.push(Token::Raw(s));
            }
        }
        self
    }

    /// Append a comma-separated list of quoted identifiers.
    pub fn push_ident_list<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.push_ident(name.as_ref());
        }
        self
    }

    /// Append a schema-qualified table.
    pub fn push_location(&mut self, location: &Location) -> &mut Self {
        self.push(location.to_sql())
    }

    /// Append every token of `other`.
    pub fn push_template(&mut self, other: &Template) -> &mut Self {
        for token in &other.tokens {
            match token {
                Token::Raw(s) => {
                    self.push(s);
                }
                t => self.tokens.push(t.clone()),
            }
        }
        self
    }

    /// Append a clause's tokens.
    pub fn push_clause(&mut self, clause: &Clause) -> &mut Self {
        self.push_template(clause.template())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of values this template consumes (placeholders + LIKE markers).
    pub fn slot_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !matches!(t, Token::Raw(_)))
            .count()
    }

    /// Number of LIKE markers still awaiting rewrite.
    pub fn like_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, Token::Like(_)))
            .count()
    }

    /// Render the marked form (`?` slots, `LIKE <digit>` markers).
    pub fn to_marked(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Raw(s) => out.push_str(s),
                Token::Param => out.push('?'),
                Token::Like(mode) => {
                    out.push_str("LIKE ");
                    out.push(mode.marker());
                }
            }
        }
        out
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    ///
    /// Fails if a LIKE marker has not been rewritten yet.
    pub fn to_sql(&self) -> OrmResult<String> {
        // Pre-size: raw text plus `$` and up to two digits per slot.
        let cap: usize = self
            .tokens
            .iter()
            .map(|t| match t {
                Token::Raw(s) => s.len(),
                _ => 3,
            })
            .sum();

        let mut out = String::with_capacity(cap);
        let mut idx: usize = 0;
        for token in &self.tokens {
            match token {
                Token::Raw(s) => out.push_str(s),
                Token::Param => {
                    idx += 1;
                    // Writing into a String cannot fail.
                    let _ = write!(out, "${idx}");
                }
                Token::Like(mode) => {
                    return Err(OrmError::validation(format!(
                        "template still contains a LIKE {} marker; run rewrite_like first",
                        mode.marker()
                    )));
                }
            }
        }
        Ok(out)
    }

    /// Lex marked text into a template.
    ///
    /// `?` becomes a slot. `LIKE ` directly followed by `1`, `2` or `3` becomes
    /// a LIKE marker; the older `LIKE 1?` spelling (digit then `?`) is accepted
    /// as one marker. Text inside `'...'`, `E'...'`, `"..."`, `$tag$...$tag$`,
    /// `-- ...` and `/* ... */` is copied untouched.
    pub fn parse_marked(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut out = Self::empty();
        let mut raw_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\'' if escape_prefixed(bytes, i) => i = skip_escape_string(bytes, i),
                q @ (b'\'' | b'"') => i = skip_quoted(bytes, i, q),
                b'$' => match dollar_tag_len(bytes, i) {
                    Some(len) => i = skip_dollar_quoted(bytes, i, len),
                    None => i += 1,
                },
                b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line_comment(bytes, i),
                b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
                b'?' => {
                    out.push(&text[raw_start..i]);
                    out.push_param();
                    i += 1;
                    raw_start = i;
                }
                b'L' => match like_marker_at(bytes, i) {
                    Some((mode, end)) => {
                        out.push(&text[raw_start..i]);
                        out.push_like(mode);
                        i = end;
                        raw_start = i;
                    }
                    None => i += 1,
                },
                _ => i += 1,
            }
        }
        out.push(&text[raw_start..]);
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_marked())
    }
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b == b'$' || b.is_ascii_alphanumeric()
}

/// Returns the index just past the closing quote (doubled quotes are escapes).
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// `'` opening an `E'...'` literal: a lone `E`/`e` right before it.
fn escape_prefixed(bytes: &[u8], quote: usize) -> bool {
    match quote.checked_sub(1).map(|p| bytes[p]) {
        Some(b'E' | b'e') => quote < 2 || !is_ident_byte(bytes[quote - 2]),
        _ => false,
    }
}

/// Like [`skip_quoted`] for `'`, but a backslash also escapes the next byte.
fn skip_escape_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Length of a `$tag$` opener at `i` (tag may be empty), if one starts here.
/// `$1` and a `$` inside an identifier are not openers.
fn dollar_tag_len(bytes: &[u8], i: usize) -> Option<usize> {
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return None;
    }
    let mut j = i + 1;
    if bytes.get(j).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while bytes
        .get(j)
        .is_some_and(|&b| b == b'_' || b.is_ascii_alphanumeric())
    {
        j += 1;
    }
    (bytes.get(j) == Some(&b'$')).then_some(j + 1 - i)
}

/// Returns the index just past the closing tag, or the end of input.
fn skip_dollar_quoted(bytes: &[u8], start: usize, tag_len: usize) -> usize {
    let tag = &bytes[start..start + tag_len];
    let body = start + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|w| w == tag)
        .map_or(bytes.len(), |p| body + p + tag_len)
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| start + p + 1)
}

/// PostgreSQL block comments nest.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn like_marker_at(bytes: &[u8], i: usize) -> Option<(PatternMode, usize)> {
    if !bytes[i..].starts_with(b"LIKE ") {
        return None;
    }
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return None;
    }
    let digit = *bytes.get(i + 5)?;
    let mode = PatternMode::from_marker(digit as char)?;
    let mut end = i + 6;
    match bytes.get(end) {
        Some(b'?') => end += 1,
        Some(&b) if is_ident_byte(b) => return None,
        _ => {}
    }
    Some((mode, end))
}
