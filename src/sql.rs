//! Structured-query path: CSV-backed relational engine plus text-to-SQL
//! synthesis.
//!
//! Every `*.csv` in the tables root becomes one SQLite table named after
//! the file stem, with column types inferred from the data. Questions are
//! turned into a single SELECT by the language model; anything that is
//! not a SELECT is discarded and replaced with a harmless fallback query,
//! so untrusted non-SELECT text never reaches the engine. Execution
//! failures are captured into [`SqlResult::error`] rather than
//! propagated — the caller always gets a result it can hand to answer
//! synthesis.
//!
//! The pool is pinned to a single connection: the one in-memory database
//! lives on that connection, and it doubles as the serialization point
//! for concurrent statement execution.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{info, warn};

use crate::llm::ChatModel;
use crate::models::SqlResult;

const TEXT2SQL_SYSTEM_PROMPT: &str = "\
You convert questions into a single ANSI SQL query for SQLite.
Only output SQL. Use table and column names exactly as provided.
Prefer simple SELECTs. Limit 100 rows.";

/// Name and declared type of one table column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
}

/// One table visible to query synthesis.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

pub struct SqlEngine {
    pool: SqlitePool,
    llm: Arc<dyn ChatModel>,
}

impl SqlEngine {
    /// Open the in-memory relational engine.
    ///
    /// The pool keeps exactly one long-lived connection: SQLite `:memory:`
    /// databases are per-connection, and the single handle serializes
    /// concurrent statement execution.
    pub async fn connect_in_memory(llm: Arc<dyn ChatModel>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory SQLite database")?;
        Ok(Self { pool, llm })
    }

    /// Load every `*.csv` under `dir` (non-recursive, sorted) into its own
    /// table. Unloadable files are logged and skipped. Returns the number
    /// of tables loaded.
    pub async fn ingest_csv_dir(&self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            warn!(root = %dir.display(), "tables root does not exist, skipping");
            return Ok(0);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut loaded = 0usize;
        for path in paths {
            match self.ingest_csv_file(&path).await {
                Ok(table) => {
                    info!(table = %table, file = %path.display(), "loaded table");
                    loaded += 1;
                }
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unloadable csv"),
            }
        }
        Ok(loaded)
    }

    async fn ingest_csv_file(&self, path: &Path) -> Result<String> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let table = sanitize_identifier(&stem);

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let headers: Vec<String> = reader
            .headers()
            .context("missing CSV header row")?
            .iter()
            .map(sanitize_identifier)
            .collect();
        if headers.is_empty() {
            anyhow::bail!("CSV has no columns");
        }
        let records: Vec<csv::StringRecord> = reader
            .records()
            .collect::<std::result::Result<_, _>>()
            .context("malformed CSV record")?;

        let types = infer_column_types(headers.len(), &records);

        let columns_sql = headers
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("\"{name}\" {}", ty.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; headers.len()].join(", ");
        let insert_sql = format!("INSERT INTO \"{table}\" VALUES ({placeholders})");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE \"{table}\" ({columns_sql})"))
            .execute(&mut *tx)
            .await?;

        for record in &records {
            let mut query = sqlx::query(&insert_sql);
            for (i, ty) in types.iter().enumerate() {
                let value = record.get(i).unwrap_or("");
                query = match ty {
                    ColumnType::Integer => query.bind(value.trim().parse::<i64>().ok()),
                    ColumnType::Real => query.bind(value.trim().parse::<f64>().ok()),
                    ColumnType::Text => query.bind(value.to_string()),
                };
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(table)
    }

    /// Introspect all user tables and their columns.
    pub async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let rows = sqlx::query(&format!("PRAGMA table_info(\"{name}\")"))
                .fetch_all(&self.pool)
                .await?;
            let columns = rows
                .iter()
                .map(|row| {
                    Ok(ColumnInfo {
                        name: row.try_get("name")?,
                        sql_type: row.try_get("type")?,
                    })
                })
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
            tables.push(TableInfo { name, columns });
        }
        Ok(tables)
    }

    /// Render the live schema as the compact text handed to synthesis.
    pub async fn schema_text(&self) -> Result<String> {
        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Ok("No tables.".to_string());
        }
        let lines: Vec<String> = tables
            .iter()
            .map(|t| {
                let cols = t
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.sql_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("TABLE {}({cols})", t.name)
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Turn `question` into a single SELECT against the live schema.
    ///
    /// The reply is stripped of code fences and a leading language label,
    /// then gated: anything that does not begin with SELECT is replaced
    /// with a fixed explanatory fallback instead of being executed.
    async fn synthesize_sql(&self, question: &str) -> Result<String> {
        let schema = self.schema_text().await?;
        let user = format!("Schema:\n{schema}\n\nQuestion: {question}\nSQL:");
        let raw = self.llm.complete(TEXT2SQL_SYSTEM_PROMPT, &user, 0.0).await?;

        let sql = clean_sql_reply(&raw);
        if sql.trim_start().to_lowercase().starts_with("select") {
            Ok(sql)
        } else {
            warn!(rejected = %sql, "non-SELECT synthesis rejected, using fallback");
            Ok(fallback_query(question))
        }
    }

    /// Run the full structured path for one question. The returned
    /// [`SqlResult`] carries either rows or a captured execution error;
    /// only language-model transport failures propagate.
    pub async fn query(&self, question: &str) -> Result<SqlResult> {
        let sql = self.synthesize_sql(question).await?;
        Ok(self.execute_captured(&sql).await)
    }

    /// Execute `sql`, capturing any engine failure into the result.
    pub async fn execute_captured(&self, sql: &str) -> SqlResult {
        match sqlx::query(sql).fetch_all(&self.pool).await {
            Ok(rows) => {
                // A statement with zero rows still reports its column names.
                let columns: Vec<String> = match rows.first() {
                    Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
                    None => self.column_names(sql).await,
                };
                let data = rows.iter().map(decode_row).collect();
                SqlResult {
                    sql: sql.to_string(),
                    columns,
                    rows: data,
                    error: None,
                }
            }
            Err(e) => SqlResult {
                sql: sql.to_string(),
                columns: Vec::new(),
                rows: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Column names from the prepared statement, used when execution
    /// returned no rows to read them from. The statement already executed
    /// successfully, so a prepare failure here only degrades to no names.
    async fn column_names(&self, sql: &str) -> Vec<String> {
        match self.pool.prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// The harmless substitute for rejected synthesis output: a SELECT of a
/// literal explanatory string.
fn fallback_query(question: &str) -> String {
    let escaped = question.replace('\'', "''");
    format!("SELECT 'Unable to derive SQL for: {escaped}' AS note")
}

/// Strip code-fence markers and a leading `sql` language label from a
/// model reply.
fn clean_sql_reply(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = rest;
        if let Some(newline) = s.find('\n') {
            let label = s[..newline].trim();
            if label.is_empty() || label.eq_ignore_ascii_case("sql") {
                s = &s[newline + 1..];
            }
        }
        if let Some(rest) = s.strip_suffix("```") {
            s = rest;
        }
        s = s.trim();
    }

    if let Some(rest) = s.strip_prefix("sql\n").or_else(|| s.strip_prefix("SQL\n")) {
        rest.trim().to_string()
    } else {
        s.to_string()
    }
}

/// Make a CSV header or file stem safe to use as a quoted SQLite
/// identifier.
fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('c');
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Infer a column type per position: INTEGER if every non-empty value
/// parses as one, else REAL if every non-empty value is numeric, else
/// TEXT. Empty cells don't veto a numeric type; they load as NULL.
fn infer_column_types(width: usize, records: &[csv::StringRecord]) -> Vec<ColumnType> {
    (0..width)
        .map(|i| {
            let mut saw_value = false;
            let mut all_int = true;
            let mut all_num = true;
            for record in records {
                let value = record.get(i).unwrap_or("").trim();
                if value.is_empty() {
                    continue;
                }
                saw_value = true;
                if value.parse::<i64>().is_err() {
                    all_int = false;
                }
                if value.parse::<f64>().is_err() {
                    all_num = false;
                }
            }
            if !saw_value {
                ColumnType::Text
            } else if all_int {
                ColumnType::Integer
            } else if all_num {
                ColumnType::Real
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

fn decode_row(row: &SqliteRow) -> Vec<serde_json::Value> {
    (0..row.columns().len())
        .map(|i| decode_value(row, i))
        .collect()
}

fn decode_value(row: &SqliteRow, i: usize) -> serde_json::Value {
    let raw = match row.try_get_raw(i) {
        Ok(raw) => raw,
        Err(_) => return serde_json::Value::Null,
    };
    if raw.is_null() {
        return serde_json::Value::Null;
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(i)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "REAL" => row
            .try_get::<f64, _>(i)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(i)
            .map(|b| serde_json::Value::String(format!("<blob {} bytes>", b.len())))
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<String, _>(i)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}
