//! Persistence of collections and imports
//!
//! Collections and imports are stored as `(name, kind, config, params)`
//! records, config and params being JSON. Two backends:
//! - `SqliteRepository` (sqlx, one table per record type)
//! - `MemoryRepository` (no persistence, used when no database is set)

use async_trait::async_trait;
use chrono::Utc;
use classify_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Record table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Collections,
    Imports,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Collections => "collections",
            Table::Imports => "imports",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized collection or import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Generated id, set once stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Collection name or import id
    pub name: String,
    /// Registered kind reference
    pub kind: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub params: Value,
}

impl Record {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: kind.into(),
            config: Value::Null,
            params: Value::Null,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Which field of a record selects the rows to delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMatch {
    Id,
    Name,
}

/// Insert/delete store for records
#[async_trait]
pub trait Repository: Send + Sync {
    /// Store a record; returns the generated id
    ///
    /// Fails with `AlreadyExists` on a duplicate name.
    async fn insert(&self, table: Table, record: &Record) -> Result<i64>;

    /// Delete the rows matching `record` on the `predicate` field
    ///
    /// Fails with `NotFound` when nothing matched.
    async fn delete(&self, table: Table, record: &Record, predicate: RecordMatch) -> Result<()>;

    /// All records of a table, in insertion order
    async fn list(&self, table: Table) -> Result<Vec<Record>>;
}

// ============================================================================
// SQLite
// ============================================================================

/// sqlx-backed repository
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (or create) the database file and its tables
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let newly_created = !db_path.exists();
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        Self::from_pool(pool).await
    }

    /// Use an existing pool; creates the tables if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        for table in [Table::Collections, Table::Imports] {
            create_table(&pool, table).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn create_table(pool: &SqlitePool, table: Table) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            config TEXT NOT NULL DEFAULT 'null',
            params TEXT NOT NULL DEFAULT 'null',
            created_at TEXT NOT NULL
        )
        "#,
        table
    ))
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert(&self, table: Table, record: &Record) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} (name, kind, config, params, created_at) VALUES (?, ?, ?, ?, ?)",
            table
        );
        let result = sqlx::query(&sql)
            .bind(&record.name)
            .bind(&record.kind)
            .bind(serde_json::to_string(&record.config)?)
            .bind(serde_json::to_string(&record.params)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    Error::AlreadyExists(format!("{} record '{}'", table, record.name))
                }
                other => Error::Database(other),
            })?;

        let id = result.last_insert_rowid();
        debug!(table = %table, name = %record.name, id, "Record inserted");
        Ok(id)
    }

    async fn delete(&self, table: Table, record: &Record, predicate: RecordMatch) -> Result<()> {
        let result = match predicate {
            RecordMatch::Id => {
                let id = record.id.ok_or_else(|| {
                    Error::ValidationFailure(format!("{} record '{}' has no id", table, record.name))
                })?;
                sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            RecordMatch::Name => {
                sqlx::query(&format!("DELETE FROM {} WHERE name = ?", table))
                    .bind(&record.name)
                    .execute(&self.pool)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} record '{}'", table, record.name)));
        }
        debug!(table = %table, name = %record.name, "Record deleted");
        Ok(())
    }

    async fn list(&self, table: Table) -> Result<Vec<Record>> {
        let rows = sqlx::query(&format!(
            "SELECT id, name, kind, config, params FROM {} ORDER BY id",
            table
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Record> {
                let config: String = row.try_get("config")?;
                let params: String = row.try_get("params")?;
                Ok(Record {
                    id: Some(row.try_get("id")?),
                    name: row.try_get("name")?,
                    kind: row.try_get("kind")?,
                    config: serde_json::from_str(&config)?,
                    params: serde_json::from_str(&params)?,
                })
            })
            .collect()
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Repository keeping records in memory only
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<BTreeMap<Table, Vec<Record>>>,
    next_id: Mutex<i64>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert(&self, table: Table, record: &Record) -> Result<i64> {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table).or_default();
        if rows.iter().any(|r| r.name == record.name) {
            return Err(Error::AlreadyExists(format!(
                "{} record '{}'",
                table, record.name
            )));
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let id = *next_id;

        rows.push(Record {
            id: Some(id),
            ..record.clone()
        });
        Ok(id)
    }

    async fn delete(&self, table: Table, record: &Record, predicate: RecordMatch) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|r| match predicate {
            RecordMatch::Id => record.id.is_none() || r.id != record.id,
            RecordMatch::Name => r.name != record.name,
        });

        if rows.len() == before {
            return Err(Error::NotFound(format!("{} record '{}'", table, record.name)));
        }
        Ok(())
    }

    async fn list(&self, table: Table) -> Result<Vec<Record>> {
        Ok(self
            .tables
            .lock()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default())
    }
}
