//! Generic table accessor: create, read, update, delete and raw queries for one (table, primary key) pair.

use crate::database::{Connection, Database};
use crate::error::AppError;
use crate::sql::{self, bind_named, BoundStatement, QueryBuf};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgColumn, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use std::collections::HashMap;

/// Column name to value, in column order.
pub type Record = Map<String, Value>;

/// Result of [`Model::read`]: one row when an id was given, every row otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Fetched {
    One(Record),
    Many(Vec<Record>),
}

/// Result of [`Model::query`].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Record>),
    Executed(bool),
}

/// Table accessor. Table and primary key names must be trusted literals.
#[derive(Clone, Debug)]
pub struct Model {
    conn: Connection,
    table: String,
    primary_key: String,
}

impl Model {
    pub fn new(conn: Connection, table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Model {
            conn,
            table: table.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Bind to the shared handle of `db`, opening it if needed.
    pub async fn connect(
        db: &Database,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Result<Self, AppError> {
        let conn = db.connect_to().await?;
        Ok(Self::new(conn, table, primary_key))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Insert one row. Returns true once the statement executed.
    pub async fn create(&self, data: &Record) -> Result<bool, AppError> {
        let q = sql::insert(&self.table, data);
        self.execute(&q).await
    }

    /// Insert one row and return its generated primary key.
    pub async fn insert_get_id(&self, data: &Record) -> Result<Option<i64>, AppError> {
        let q = sql::insert_returning(&self.table, &self.primary_key, data);
        let row = self.fetch_optional(&q).await?;
        Ok(row.and_then(|r| r.get(&self.primary_key).and_then(Value::as_i64)))
    }

    /// `Some(id)` (non-zero) reads one row; otherwise every row, ordered by
    /// `order_by` or by primary key descending.
    pub async fn read(&self, id: Option<i64>, order_by: Option<&str>) -> Result<Fetched, AppError> {
        match id.filter(|id| *id != 0) {
            Some(id) => Ok(Fetched::One(self.find(id).await?)),
            None => Ok(Fetched::Many(self.all(order_by).await?)),
        }
    }

    /// Row with this primary key, or an empty record.
    pub async fn find(&self, id: i64) -> Result<Record, AppError> {
        let q = sql::select_by_id(&self.table, &self.primary_key, id);
        Ok(self.fetch_optional(&q).await?.unwrap_or_default())
    }

    pub async fn all(&self, order_by: Option<&str>) -> Result<Vec<Record>, AppError> {
        let q = sql::select_all(&self.table, &self.primary_key, order_by);
        self.fetch_all(&q).await
    }

    /// Update the row with this id from the keys of `data`.
    /// Empty `data` produces a statement the engine rejects.
    pub async fn update(&self, id: i64, data: &Record) -> Result<bool, AppError> {
        let q = sql::update(&self.table, &self.primary_key, id, data);
        self.execute(&q).await
    }

    /// Delete by id. True when the statement executed, whether or not a row matched.
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(&self.table, &self.primary_key, id);
        self.execute(&q).await
    }

    /// Run any statement with `:name` (or positional) parameters.
    pub async fn query(&self, sql: &str, params: &Record, fetch_all: bool) -> Result<QueryOutcome, AppError> {
        let q = QueryBuf {
            sql: sql.to_string(),
            params: params.clone(),
        };
        if fetch_all {
            Ok(QueryOutcome::Rows(self.fetch_all(&q).await?))
        } else {
            Ok(QueryOutcome::Executed(self.execute(&q).await?))
        }
    }

    async fn execute(&self, q: &QueryBuf) -> Result<bool, AppError> {
        let bound = self.bind(q).await?;
        build_query(&bound).execute(self.conn.pool()).await?;
        Ok(true)
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Record>, AppError> {
        let bound = self.bind(q).await?;
        let row = build_query(&bound).fetch_optional(self.conn.pool()).await?;
        Ok(row.map(|r| row_to_record(&r)))
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        let bound = self.bind(q).await?;
        let rows = build_query(&bound).fetch_all(self.conn.pool()).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn bind(&self, q: &QueryBuf) -> Result<BoundStatement, AppError> {
        let bound = bind_named(&q.sql, &q.params)?;
        let bound = self.cast_text_values(bound).await?;
        tracing::debug!(sql = %bound.sql, params = ?bound.values, "query");
        Ok(bound)
    }

    /// Strings are sent as TEXT. Where the server expects another type for that
    /// parameter (a form value "21" for an INTEGER column), the placeholder gets an
    /// explicit `::text::<type>` conversion.
    async fn cast_text_values(&self, bound: BoundStatement) -> Result<BoundStatement, AppError> {
        if !bound.values.iter().any(Value::is_string) {
            return Ok(bound);
        }
        let casts = {
            let stmt = self.conn.pool().prepare(&bound.sql).await?;
            stmt.parameters()
                .and_then(|p| p.left())
                .map(|types| text_casts(&bound.values, types))
                .unwrap_or_default()
        };
        Ok(bound.with_casts(&casts))
    }
}

/// 1-based positions of string values whose inferred parameter type is not textual.
fn text_casts(values: &[Value], types: &[PgTypeInfo]) -> HashMap<usize, String> {
    values
        .iter()
        .zip(types)
        .enumerate()
        .filter(|(_, (v, ty))| v.is_string() && !is_textual(ty.name()))
        .map(|(i, (_, ty))| (i + 1, ty.name().to_string()))
        .collect()
}

fn is_textual(type_name: &str) -> bool {
    matches!(type_name, "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "UNKNOWN")
}

fn build_query(bound: &BoundStatement) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&bound.sql);
    for value in bound.bind_values() {
        query = query.bind(value);
    }
    query
}

fn row_to_record(row: &PgRow) -> Record {
    let mut map = Record::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), cell_to_value(row, col));
    }
    map
}

fn cell_to_value(row: &PgRow, col: &PgColumn) -> Value {
    let idx = col.ordinal();
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }
    if let Ok(n) = row.try_get::<i16, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(n) = row.try_get::<i32, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(n) = row.try_get::<i64, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(n) = row.try_get::<f32, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(n) = row.try_get::<f64, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(d) = row.try_get::<Decimal, _>(idx) {
        return decimal_to_value(d);
    }
    if let Ok(b) = row.try_get::<bool, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(u) = row.try_get::<uuid::Uuid, _>(idx) {
        return Value::String(u.to_string());
    }
    if let Ok(d) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDate, _>(idx) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(t) = row.try_get::<chrono::NaiveTime, _>(idx) {
        return Value::String(t.format("%H:%M:%S%.f").to_string());
    }
    if let Ok(s) = row.try_get::<String, _>(idx) {
        return Value::String(s);
    }
    if let Ok(j) = row.try_get::<Value, _>(idx) {
        return j;
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::String(bytea_hex(&bytes));
    }
    if let Ok(iv) = row.try_get::<PgInterval, _>(idx) {
        return Value::String(interval_iso(&iv));
    }
    if matches!(col.type_info().kind(), PgTypeKind::Enum(_)) {
        // enum labels travel as their text
        if let Ok(s) = row.try_get_unchecked::<String, _>(idx) {
            return Value::String(s);
        }
    }
    tracing::debug!(column = %col.name(), pg_type = %col.type_info().name(), "undecodable column type, returned as null");
    Value::Null
}

/// NUMERIC as a JSON number when `f64` holds it exactly, otherwise as its decimal text.
fn decimal_to_value(d: Decimal) -> Value {
    let exact = d
        .to_f64()
        .filter(|f| Decimal::from_f64(*f) == Some(d))
        .and_then(serde_json::Number::from_f64);
    match exact {
        Some(n) => Value::Number(n),
        None => Value::String(d.normalize().to_string()),
    }
}

/// PostgreSQL's own hex output form: `\x` followed by two digits per byte.
fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// ISO 8601 duration, e.g. `P1M2DT3.5S`.
fn interval_iso(iv: &PgInterval) -> String {
    let secs = iv.microseconds as f64 / 1_000_000.0;
    format!("P{}M{}DT{}S", iv.months, iv.days, secs)
}
