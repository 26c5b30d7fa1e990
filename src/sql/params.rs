//! Named placeholders to PostgreSQL positional parameters, and JSON values to bindable values.

use crate::error::AppError;
use crate::model::Record;
use std::collections::HashMap;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    PgBindValue::F64(f)
                } else {
                    PgBindValue::String(n.to_string())
                }
            }
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            // Unspecified type: the server infers it from the target column.
            PgBindValue::Null => PgTypeInfo::with_oid(Oid(0)),
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::String(_) => <&str as Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <Value as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

/// Statement rewritten to `$n` placeholders with its values in bind order.
#[derive(Debug, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl BoundStatement {
    pub fn bind_values(&self) -> impl Iterator<Item = PgBindValue> + '_ {
        self.values.iter().map(PgBindValue::from_json)
    }
}

impl BoundStatement {
    /// Follow each listed `$n` with `::text::<type>`, so a text value reaches a
    /// column of another type through the type's input conversion.
    pub fn with_casts(self, casts: &HashMap<usize, String>) -> Self {
        if casts.is_empty() {
            return self;
        }
        let chars: Vec<char> = self.sql.chars().collect();
        let mut out = String::with_capacity(self.sql.len() + casts.len() * 16);
        let mut i = 0;
        while i < chars.len() {
            if let Some(end) = skip_region(&chars, i) {
                out.extend(&chars[i..end]);
                i = end;
                continue;
            }
            if chars[i] == '$' && chars.get(i + 1).map_or(false, char::is_ascii_digit) {
                let mut end = i + 1;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[i + 1..end].iter().collect();
                out.push('$');
                out.push_str(&digits);
                if let Some(ty) = digits.parse::<usize>().ok().and_then(|n| casts.get(&n)) {
                    out.push_str("::text::");
                    out.push_str(ty);
                }
                i = end;
                continue;
            }
            out.push(chars[i]);
            i += 1;
        }
        BoundStatement {
            sql: out,
            values: self.values,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// End (exclusive) of the string literal, quoted identifier or comment starting at `i`.
/// Covers `'..'`, `E'..'` with backslash escapes, `"..."`, `$tag$..$tag$`, `--` and `/* */`.
fn skip_region(chars: &[char], i: usize) -> Option<usize> {
    let next = chars.get(i + 1).copied();
    match chars[i] {
        '-' if next == Some('-') => Some(
            (i + 2..chars.len())
                .find(|&j| chars[j] == '\n')
                .map_or(chars.len(), |j| j + 1),
        ),
        '/' if next == Some('*') => Some(
            (i + 2..chars.len().saturating_sub(1))
                .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
                .map_or(chars.len(), |j| j + 2),
        ),
        q @ ('\'' | '"') => Some(closing_quote(chars, i + 1, q, false)),
        'E' | 'e' if next == Some('\'') && (i == 0 || !is_ident_char(chars[i - 1])) => {
            Some(closing_quote(chars, i + 2, '\'', true))
        }
        '$' => {
            let tag_len = dollar_tag_len(chars, i)?;
            let tag = &chars[i..i + tag_len];
            let body = i + tag_len;
            Some(
                (body..=chars.len().saturating_sub(tag_len))
                    .find(|&j| &chars[j..j + tag_len] == tag)
                    .map_or(chars.len(), |j| j + tag_len),
            )
        }
        _ => None,
    }
}

fn closing_quote(chars: &[char], mut j: usize, quote: char, backslash_escapes: bool) -> usize {
    while j < chars.len() {
        if backslash_escapes && chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] == quote {
            return j + 1;
        }
        j += 1;
    }
    chars.len()
}

/// Length of a `$$` or `$tag$` opener at `i`. `$1` is a parameter, not a tag.
fn dollar_tag_len(chars: &[char], i: usize) -> Option<usize> {
    let mut j = i + 1;
    if chars.get(j) == Some(&'$') {
        return Some(2);
    }
    if !chars.get(j).map_or(false, |c| c.is_ascii_alphabetic() || *c == '_') {
        return None;
    }
    while j < chars.len() && is_ident_char(chars[j]) {
        j += 1;
    }
    (chars.get(j) == Some(&'$')).then_some(j + 1 - i)
}

/// Rewrite `:name` placeholders to `$1..$n`. A name used twice shares one index.
/// String literals, quoted identifiers, dollar-quoted bodies, comments and
/// `::type` casts are left alone. A statement without named placeholders binds
/// `params` values in iteration order. Keys may be given with or without the
/// leading colon.
pub fn bind_named(sql: &str, params: &Record) -> Result<BoundStatement, AppError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if let Some(end) = skip_region(&chars, i) {
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        match chars[i] {
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .map(|n| n.is_ascii_alphabetic() || *n == '_')
                .unwrap_or(false) =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let index = match names.iter().position(|n| *n == name) {
                    Some(pos) => pos + 1,
                    None => {
                        names.push(name);
                        names.len()
                    }
                };
                out.push_str(&format!("${}", index));
                i = end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    let values = if names.is_empty() {
        params.values().cloned().collect()
    } else {
        names
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .or_else(|| params.get(&format!(":{}", name)))
                    .cloned()
                    .ok_or_else(|| AppError::Parameter(format!("no value bound for :{}", name)))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(BoundStatement { sql: out, values })
}
