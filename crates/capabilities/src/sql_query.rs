//! `query_database` — read-only lookups against a structured data source.
//!
//! Only a single `SELECT` (or `WITH ... SELECT`) statement is accepted. The
//! SQLite backend additionally opens its connections read-only.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::error::CapabilityError;
use planbot_core::service::SqlBackend;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use tracing::{debug, info};

const CAPABILITY: &str = "query_database";

/// Upper bound on rows handed back to the planner.
pub const MAX_ROWS: usize = 50;

/// Keywords that can start the main statement after a `WITH` clause.
const STATEMENT_KEYWORDS: &[&str] = &["select", "insert", "update", "delete", "replace", "values"];

pub struct SqlQueryCapability {
    backend: Arc<dyn SqlBackend>,
}

impl SqlQueryCapability {
    pub fn new(backend: Arc<dyn SqlBackend>) -> Self {
        Self { backend }
    }
}

/// Accept exactly one read-only statement and return it without a trailing `;`.
///
/// Only the statement's shape is checked here; string literals, quoted
/// identifiers and comments are skipped. The SQLite backend refuses writes
/// on its own.
pub fn validate_read_only(sql: &str) -> Result<&str, CapabilityError> {
    let statement = sql.trim().trim_end_matches(';').trim();
    if statement.is_empty() {
        return Err(CapabilityError::InvalidArguments("query is empty".into()));
    }

    let scanned = scan(statement);
    if scanned.semicolons > 0 {
        return Err(CapabilityError::InvalidArguments(
            "only a single statement is allowed".into(),
        ));
    }

    let mut top_level = scanned
        .words
        .iter()
        .filter(|(depth, _)| *depth == 0)
        .map(|(_, word)| word.as_str());

    let main = match top_level.next() {
        Some("select") => "select",
        Some("with") => top_level
            .find(|w| STATEMENT_KEYWORDS.contains(w))
            .unwrap_or("with"),
        _ => {
            return Err(CapabilityError::InvalidArguments(
                "only SELECT queries are allowed".into(),
            ));
        }
    };

    if main != "select" {
        return Err(CapabilityError::InvalidArguments(format!(
            "'{}' is not allowed in a read-only query",
            main.to_ascii_uppercase()
        )));
    }

    Ok(statement)
}

#[derive(Debug, Default)]
struct Scanned {
    /// Lower-cased words with their parenthesis depth
    words: Vec<(usize, String)>,
    semicolons: usize,
}

fn scan(sql: &str) -> Scanned {
    let mut out = Scanned::default();
    let mut word = String::new();
    let mut depth = 0usize;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c.to_ascii_lowercase());
            continue;
        }
        if !word.is_empty() {
            out.words.push((depth, std::mem::take(&mut word)));
        }

        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                for next in chars.by_ref() {
                    if next == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' => out.semicolons += 1,
            _ => {}
        }
    }
    if !word.is_empty() {
        out.words.push((depth, word));
    }
    out
}

#[async_trait]
impl Capability for SqlQueryCapability {
    fn name(&self) -> &str {
        CAPABILITY
    }

    fn description(&self) -> &str {
        "Run a read-only SQL SELECT query against the company database and return the matching rows."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "query",
            ParamType::String,
            "A single SQL SELECT statement",
        )]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        let statement = validate_read_only(arguments.require_str("query")?)?;
        debug!(query = %statement, "Running database query");

        let rows = self.backend.query(statement, MAX_ROWS).await?;
        let summary = match rows.len() {
            0 => "The query returned no rows.".to_string(),
            n => format!(
                "The query returned {n} row(s): {}",
                serde_json::to_string(&rows).unwrap_or_default()
            ),
        };

        Ok(ExecutionResult::ok(summary).with_data(Value::Array(
            rows.into_iter().map(Value::Object).collect(),
        )))
    }
}

/// SQLite-backed data source.
pub struct SqliteSqlBackend {
    pool: SqlitePool,
}

impl SqliteSqlBackend {
    /// Open `database_url` read-only.
    pub async fn connect(database_url: &str) -> Result<Self, CapabilityError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Invalid SQLite URL: {e}")))?
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Failed to open SQLite: {e}")))?;

        info!("SQL backend connected to {database_url}");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlBackend for SqliteSqlBackend {
    async fn query(
        &self,
        sql: &str,
        max_rows: usize,
    ) -> Result<Vec<Map<String, Value>>, CapabilityError> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut rows = Vec::new();

        while rows.len() < max_rows {
            match stream.try_next().await {
                Ok(Some(row)) => rows.push(row_to_json(&row)),
                Ok(None) => break,
                Err(e) => return Err(CapabilityError::backend(CAPABILITY, e.to_string())),
            }
        }

        Ok(rows)
    }
}

fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let i = column.ordinal();
            (column.name().to_string(), column_value(row, i))
        })
        .collect()
}

fn column_value(row: &SqliteRow, i: usize) -> Value {
    let Ok(raw) = row.try_get_raw(i) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(i).map(Value::from).unwrap_or(Value::Null),
        "REAL" => row.try_get::<f64, _>(i).map(Value::from).unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(i)
            .map(|b| Value::from(format!("<{} bytes>", b.len())))
            .unwrap_or(Value::Null),
        _ => row.try_get::<String, _>(i).map(Value::from).unwrap_or(Value::Null),
    }
}
