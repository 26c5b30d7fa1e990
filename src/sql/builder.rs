//! Builds INSERT, SELECT, UPDATE, DELETE with `:name` placeholders.
//!
//! Table and column names are interpolated as given. They must come from code,
//! never from request input; only values are parameterized.

use crate::model::Record;
use serde_json::Value;

pub struct QueryBuf {
    pub sql: String,
    pub params: Record,
}

impl QueryBuf {
    fn new(sql: String) -> Self {
        QueryBuf {
            sql,
            params: Record::new(),
        }
    }

    fn with_params(sql: String, params: Record) -> Self {
        QueryBuf { sql, params }
    }
}

fn placeholder(name: &str) -> String {
    format!(":{}", name)
}

/// INSERT with one column per key of `data`, in iteration order.
pub fn insert(table: &str, data: &Record) -> QueryBuf {
    let fields: Vec<&str> = data.keys().map(String::as_str).collect();
    let values: Vec<String> = fields.iter().map(|f| placeholder(f)).collect();
    QueryBuf::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            fields.join(", "),
            values.join(", ")
        ),
        data.clone(),
    )
}

/// INSERT returning the generated primary key.
pub fn insert_returning(table: &str, primary_key: &str, data: &Record) -> QueryBuf {
    let mut q = insert(table, data);
    q.sql.push_str(&format!(" RETURNING {}", primary_key));
    q
}

pub fn select_by_id(table: &str, primary_key: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new(format!(
        "SELECT * FROM {} WHERE {} = {}",
        table,
        primary_key,
        placeholder(primary_key)
    ));
    q.params.insert(primary_key.to_string(), Value::from(id));
    q
}

/// SELECT every row. Default order is newest first by primary key.
pub fn select_all(table: &str, primary_key: &str, order_by: Option<&str>) -> QueryBuf {
    let order = order_by
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} DESC", primary_key));
    QueryBuf::new(format!("SELECT * FROM {} ORDER BY {}", table, order))
}

/// UPDATE by id: SET every key of `data` except the primary key.
/// Empty `data` leaves the SET list empty; the engine rejects that statement.
pub fn update(table: &str, primary_key: &str, id: i64, data: &Record) -> QueryBuf {
    let mut params = Record::new();
    let mut sets = Vec::new();
    for (k, v) in data {
        if k == primary_key {
            continue;
        }
        sets.push(format!("{} = {}", k, placeholder(k)));
        params.insert(k.clone(), v.clone());
    }
    params.insert(primary_key.to_string(), Value::from(id));
    QueryBuf::with_params(
        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            table,
            sets.join(", "),
            primary_key,
            placeholder(primary_key)
        ),
        params,
    )
}

pub fn delete(table: &str, primary_key: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new(format!(
        "DELETE FROM {} WHERE {} = {}",
        table,
        primary_key,
        placeholder(primary_key)
    ));
    q.params.insert(primary_key.to_string(), Value::from(id));
    q
}
