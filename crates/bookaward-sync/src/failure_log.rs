//! Append-only SQL log of writes the remote store refused.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bookaward_core::wire::WireFields;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

pub const ERROR_COLUMN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Real,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlType::Text => "TEXT",
            SqlType::Real => "REAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlColumn {
    pub name: String,
    pub sql_type: SqlType,
}

/// One column per attempted field, sorted by name, then the trailing `error` column.
pub fn infer_schema(attempted: &WireFields) -> Vec<SqlColumn> {
    let mut columns: Vec<SqlColumn> = attempted
        .iter()
        .map(|(name, value)| SqlColumn {
            name: name.clone(),
            sql_type: match value {
                Value::Number(_) => SqlType::Real,
                _ => SqlType::Text,
            },
        })
        .collect();
    columns.sort_by(|a, b| a.name.cmp(&b.name));
    columns.push(SqlColumn {
        name: ERROR_COLUMN.to_string(),
        sql_type: SqlType::Text,
    });
    columns
}

pub fn signature(attempted: &WireFields) -> String {
    let mut names: Vec<&str> = attempted.keys().map(String::as_str).collect();
    names.sort_unstable();
    names.join(",")
}

pub fn table_name(signature: &str) -> String {
    let digest = hex::encode(Sha256::digest(signature.as_bytes()));
    format!("failed_writes_{}", &digest[..8])
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => quote_text(if *b { "true" } else { "false" }),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_text(s),
        Value::Array(_) | Value::Object(_) => quote_text(&value.to_string()),
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn create_table_sql(table: &str, columns: &[SqlColumn]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});\n",
        quote_ident(table),
        defs.join(", ")
    )
}

pub fn insert_sql(table: &str, attempted: &WireFields, error: &str) -> String {
    let mut names: Vec<&String> = attempted.keys().collect();
    names.sort();
    let mut idents: Vec<String> = names.iter().map(|n| quote_ident(n)).collect();
    let mut values: Vec<String> = names
        .iter()
        .map(|n| quote_literal(&attempted[n.as_str()]))
        .collect();
    idents.push(quote_ident(ERROR_COLUMN));
    values.push(quote_text(error));
    format!(
        "INSERT INTO {} ({}) VALUES ({});\n",
        quote_ident(table),
        idents.join(", "),
        values.join(", ")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedFailure {
    pub path: PathBuf,
    pub table: String,
    pub schema_emitted: bool,
}

/// Failure log for one run. Table definitions are emitted once per field signature.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    seen: HashSet<String>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry with a single write and flush it to disk.
    pub async fn log_failure(&mut self, attempted: &WireFields, error: &str) -> Result<LoggedFailure> {
        let signature = signature(attempted);
        let table = table_name(&signature);
        let schema_emitted = !self.seen.contains(&signature);

        let mut entry = String::new();
        if schema_emitted {
            entry.push_str(&create_table_sql(&table, &infer_schema(attempted)));
        }
        entry.push_str(&format!(
            "-- {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        entry.push_str(&insert_sql(&table, attempted, error));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening failure log {}", self.path.display()))?;
        file.write_all(entry.as_bytes())
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        file.sync_data()
            .await
            .with_context(|| format!("syncing {}", self.path.display()))?;

        self.seen.insert(signature);
        let path = tokio::fs::canonicalize(&self.path)
            .await
            .with_context(|| format!("resolving {}", self.path.display()))?;
        Ok(LoggedFailure {
            path,
            table,
            schema_emitted,
        })
    }
}
