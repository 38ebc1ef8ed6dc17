//! Database connection, migrations and transactions.
//!
//! Supports:
//! - Local SQLite file: `path/to/db.sqlite` or `file:path` or `sqlite://path`
//! - In-memory: `:memory:`
//! - Remote libsql server: `libsql://...` or `https://...` (needs an auth token)

use std::path::Path;
use std::sync::Arc;

use libsql::{Builder, Connection, Database, Value};

use crate::config;
use crate::router::BoxFuture;
use crate::{Error, Result};

/// Shared database handle. Cheap to clone.
#[derive(Clone)]
pub struct Handle {
    db: Arc<Database>,
    /// `:memory:` databases live and die with a single connection.
    shared: Option<Connection>,
    local: bool,
}

impl Handle {
    /// A connection for one unit of work.
    pub async fn connect(&self) -> Result<Connection> {
        if let Some(conn) = &self.shared {
            return Ok(conn.clone());
        }
        let conn = self.db.connect()?;
        if self.local
            && let Err(e) = conn.query("PRAGMA busy_timeout = 5000", ()).await
        {
            tracing::debug!("Could not set busy_timeout: {e}");
        }
        Ok(conn)
    }
}

/// Connect to the database described by `config`.
pub async fn connect(config: &config::Database) -> Result<Handle> {
    let url = config.url.as_str();
    let handle = if url.starts_with("libsql://") || url.starts_with("https://") || url.starts_with("http://") {
        let token = config
            .auth_token
            .clone()
            .ok_or_else(|| Error::Config("DATABASE_AUTH_TOKEN not set for remote database".into()))?;
        let db = Builder::new_remote(url.to_string(), token).build().await?;
        Handle {
            db: Arc::new(db),
            shared: None,
            local: false,
        }
    } else if url == ":memory:" {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        Handle {
            db: Arc::new(db),
            shared: Some(conn),
            local: true,
        }
    } else {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        if let Some(dir) = Path::new(path).parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }
        let db = Builder::new_local(path).build().await?;
        Handle {
            db: Arc::new(db),
            shared: None,
            local: true,
        }
    };

    tracing::info!(url = %redact(url), "Database connected");
    Ok(handle)
}

/// Connect, run pending migrations and seed the admin account.
pub async fn open(config: &config::Database) -> Result<Handle> {
    let handle = connect(config).await?;
    let conn = handle.connect().await?;
    if handle.local
        && let Err(e) = conn.query("PRAGMA journal_mode = WAL", ()).await
    {
        tracing::debug!("Could not enable WAL: {e}");
    }
    migrate(&conn).await?;
    seed_admin(&conn).await?;
    Ok(handle)
}

fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Current time in the RFC 3339 form stored in timestamp columns.
pub fn now() -> String {
    jiff::Timestamp::now().to_string()
}

/// Parse a stored timestamp column.
pub fn parse_timestamp(column: &str, value: &str) -> Result<jiff::Timestamp> {
    value
        .parse()
        .map_err(|e| Error::Internal(format!("failed to parse {column}: {e}")))
}

/// `Some(text)` as TEXT, `None` as NULL.
pub fn opt_text(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create users table",
        sql: "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    },
    Migration {
        version: 2,
        description: "create subs table",
        sql: "CREATE TABLE IF NOT EXISTS subs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT UNIQUE NOT NULL,
            last_check TEXT,
            last_fetch TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            total_nodes INTEGER NOT NULL DEFAULT 0,
            alive_nodes INTEGER NOT NULL DEFAULT 0,
            cron TEXT NOT NULL DEFAULT '',
            auto_update INTEGER NOT NULL DEFAULT 0
        )",
    },
];

/// Latest schema version known to this build.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply every migration newer than the recorded version, in one transaction.
pub async fn migrate(conn: &Connection) -> Result<()> {
    with_transaction(conn, |tx| {
        Box::pin(async move {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS migrations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    version INTEGER NOT NULL,
                    description TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                )",
                (),
            )
            .await?;

            let mut rows = tx
                .query("SELECT COALESCE(MAX(version), 0) FROM migrations", ())
                .await?;
            let current = match rows.next().await? {
                Some(row) => row.get::<i64>(0)?,
                None => 0,
            };
            tracing::info!(version = current, "Current database version");

            for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
                tracing::info!(
                    version = migration.version,
                    "Applying migration: {}",
                    migration.description
                );
                tx.execute(migration.sql, ()).await?;
                tx.execute(
                    "INSERT INTO migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                    libsql::params![migration.version, migration.description, now()],
                )
                .await?;
            }
            Ok(())
        })
    })
    .await
}

/// Create user 1 (`admin` / `admin`) if it does not exist.
async fn seed_admin(conn: &Connection) -> Result<()> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM users WHERE id = 1", ())
        .await?;
    let count = match rows.next().await? {
        Some(row) => row.get::<i64>(0)?,
        None => 0,
    };
    if count > 0 {
        return Ok(());
    }

    let hash = crate::user::hash_password(crate::user::DEFAULT_ADMIN_PASSWORD)?;
    let created = now();
    conn.execute(
        "INSERT INTO users (id, username, password, created_at, updated_at) VALUES (1, ?1, ?2, ?3, ?3)",
        libsql::params![crate::user::DEFAULT_ADMIN_USERNAME, hash, created],
    )
    .await?;
    tracing::warn!("Initial admin user (ID: 1) created with the default password; change it");
    Ok(())
}

/// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
pub async fn with_transaction<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c Connection) -> BoxFuture<'c, Result<T>>,
{
    let tx = conn.transaction().await?;
    match f(&tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::error!("Transaction rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}
