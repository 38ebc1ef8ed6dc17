//! Subscriptions: model, storage and the fetch workflow.

use std::sync::Arc;

use libsql::{Connection, Row, Value};
use serde::{Deserialize, Serialize};

use crate::content::ContentStore;
use crate::db::{self, Handle};
use crate::fetcher::Fetcher;
use crate::{Error, Result, cron};

/// A subscription entry.
#[derive(Debug, Clone, Serialize)]
pub struct Sub {
    pub id: i64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<jiff::Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<jiff::Timestamp>,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
    pub total_nodes: i64,
    pub alive_nodes: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cron: String,
    pub auto_update: bool,
}

impl Sub {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            last_check: opt_timestamp(row, 2, "last_check")?,
            last_fetch: opt_timestamp(row, 3, "last_fetch")?,
            created_at: db::parse_timestamp("created_at", &row.get::<String>(4)?)?,
            updated_at: db::parse_timestamp("updated_at", &row.get::<String>(5)?)?,
            total_nodes: row.get(6)?,
            alive_nodes: row.get(7)?,
            cron: row.get(8)?,
            auto_update: row.get::<i64>(9)? == 1,
        })
    }
}

fn opt_timestamp(row: &Row, idx: i32, column: &str) -> Result<Option<jiff::Timestamp>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => db::parse_timestamp(column, &text).map(Some),
        other => Err(Error::Internal(format!(
            "unexpected {column} value: {other:?}"
        ))),
    }
}

/// Body of `POST /api/sub/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSub {
    pub url: String,
    pub cron: String,
    pub auto_update: bool,
}

/// Body of `PUT /api/sub/{id}`. Absent or empty fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubPatch {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub auto_update: Option<bool>,
}

/// A fetched subscription and the body that was cached for it.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched {
    pub sub: Sub,
    pub content: String,
}

const SUB_COLUMNS: &str =
    "id, url, last_check, last_fetch, created_at, updated_at, total_nodes, alive_nodes, cron, auto_update";

fn not_found() -> Error {
    Error::NotFound("Subscription not found".to_string())
}

fn url_taken() -> Error {
    Error::Conflict("Subscription URL already exists".to_string())
}

async fn ensure_sub(conn: &Connection, id: i64) -> Result<()> {
    let mut rows = conn.query("SELECT 1 FROM subs WHERE id = ?1", [id]).await?;
    match rows.next().await? {
        Some(_) => Ok(()),
        None => Err(not_found()),
    }
}

async fn url_in_use(conn: &Connection, url: &str, except: i64) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM subs WHERE url = ?1 AND id != ?2",
            libsql::params![url, except],
        )
        .await?;
    Ok(rows.next().await?.is_some())
}

async fn select_one(conn: &Connection, id: i64) -> Result<Sub> {
    let mut rows = conn
        .query(&format!("SELECT {SUB_COLUMNS} FROM subs WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => Sub::from_row(&row),
        None => Err(not_found()),
    }
}

/// SQL storage for subscriptions.
#[derive(Clone)]
pub struct Repository {
    db: Handle,
}

impl Repository {
    pub fn new(db: Handle) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Sub> {
        let conn = self.db.connect().await?;
        select_one(&conn, id).await
    }

    /// All subscriptions, by id.
    pub async fn list(&self) -> Result<Vec<Sub>> {
        self.select(&format!("SELECT {SUB_COLUMNS} FROM subs ORDER BY id ASC"))
            .await
    }

    /// Subscriptions with automatic updates enabled, by id.
    pub async fn list_auto_update(&self) -> Result<Vec<Sub>> {
        self.select(&format!(
            "SELECT {SUB_COLUMNS} FROM subs WHERE auto_update = 1 ORDER BY id ASC"
        ))
        .await
    }

    async fn select(&self, sql: &str) -> Result<Vec<Sub>> {
        let conn = self.db.connect().await?;
        let mut rows = conn.query(sql, ()).await?;
        let mut subs = Vec::new();
        while let Some(row) = rows.next().await? {
            subs.push(Sub::from_row(&row)?);
        }
        Ok(subs)
    }

    /// Insert a subscription. The URL must be unused.
    pub async fn create(&self, new: NewSub) -> Result<Sub> {
        let conn = self.db.connect().await?;
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                if url_in_use(tx, &new.url, 0).await? {
                    return Err(url_taken());
                }
                let now = db::now();
                tx.execute(
                    "INSERT INTO subs (url, last_check, last_fetch, created_at, updated_at, total_nodes, alive_nodes, cron, auto_update)
                     VALUES (?1, NULL, NULL, ?2, ?2, 0, 0, ?3, ?4)",
                    libsql::params![
                        new.url.as_str(),
                        now.as_str(),
                        new.cron.as_str(),
                        i64::from(new.auto_update)
                    ],
                )
                .await?;
                let id = tx.last_insert_rowid();
                select_one(tx, id).await
            })
        })
        .await
    }

    /// Write every mutable column of `sub` and return the stored row.
    pub async fn update(&self, sub: Sub) -> Result<Sub> {
        let conn = self.db.connect().await?;
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_sub(tx, sub.id).await?;
                if url_in_use(tx, &sub.url, sub.id).await? {
                    return Err(url_taken());
                }
                tx.execute(
                    "UPDATE subs
                     SET url = ?1, last_check = ?2, last_fetch = ?3, updated_at = ?4,
                         total_nodes = ?5, alive_nodes = ?6, cron = ?7, auto_update = ?8
                     WHERE id = ?9",
                    vec![
                        Value::Text(sub.url.clone()),
                        db::opt_text(sub.last_check.map(|t| t.to_string())),
                        db::opt_text(sub.last_fetch.map(|t| t.to_string())),
                        Value::Text(db::now()),
                        Value::Integer(sub.total_nodes),
                        Value::Integer(sub.alive_nodes),
                        Value::Text(sub.cron.clone()),
                        Value::Integer(i64::from(sub.auto_update)),
                        Value::Integer(sub.id),
                    ],
                )
                .await?;
                select_one(tx, sub.id).await
            })
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let conn = self.db.connect().await?;
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_sub(tx, id).await?;
                tx.execute("DELETE FROM subs WHERE id = ?1", [id]).await?;
                Ok(())
            })
        })
        .await
    }

    /// Record node counts from the last check.
    pub async fn update_stats(&self, id: i64, total_nodes: i64, alive_nodes: i64) -> Result<()> {
        self.touch(
            id,
            "UPDATE subs SET total_nodes = ?1, alive_nodes = ?2, updated_at = ?3 WHERE id = ?4",
            vec![
                Value::Integer(total_nodes),
                Value::Integer(alive_nodes),
                Value::Text(db::now()),
                Value::Integer(id),
            ],
        )
        .await
    }

    pub async fn update_last_check(&self, id: i64) -> Result<()> {
        let now = db::now();
        self.touch(
            id,
            "UPDATE subs SET last_check = ?1, updated_at = ?1 WHERE id = ?2",
            vec![Value::Text(now), Value::Integer(id)],
        )
        .await
    }

    pub async fn update_last_fetch(&self, id: i64) -> Result<()> {
        let now = db::now();
        self.touch(
            id,
            "UPDATE subs SET last_fetch = ?1, updated_at = ?1 WHERE id = ?2",
            vec![Value::Text(now), Value::Integer(id)],
        )
        .await
    }

    pub async fn update_cron_settings(&self, id: i64, cron: &str, auto_update: bool) -> Result<()> {
        self.touch(
            id,
            "UPDATE subs SET cron = ?1, auto_update = ?2, updated_at = ?3 WHERE id = ?4",
            vec![
                Value::Text(cron.to_string()),
                Value::Integer(i64::from(auto_update)),
                Value::Text(db::now()),
                Value::Integer(id),
            ],
        )
        .await
    }

    /// Run a single-row update after checking the row exists.
    async fn touch(&self, id: i64, sql: &'static str, params: Vec<Value>) -> Result<()> {
        let conn = self.db.connect().await?;
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_sub(tx, id).await?;
                tx.execute(sql, params).await?;
                Ok(())
            })
        })
        .await
    }
}

fn check_cron(expr: &str) -> Result<()> {
    cron::validate(expr).map_err(|e| Error::BadRequest(format!("Invalid cron expression: {e}")))
}

/// Subscription operations: validation, storage, fetching and caching.
#[derive(Clone)]
pub struct Service {
    repo: Repository,
    store: Arc<ContentStore>,
    fetcher: Fetcher,
}

impl Service {
    pub fn new(repo: Repository, store: Arc<ContentStore>, fetcher: Fetcher) -> Self {
        Self {
            repo,
            store,
            fetcher,
        }
    }

    pub async fn create(&self, new: NewSub) -> Result<Sub> {
        if new.url.trim().is_empty() {
            return Err(Error::BadRequest("Subscription URL is required".to_string()));
        }
        check_cron(&new.cron)?;
        let sub = self.repo.create(new).await?;
        tracing::info!(id = sub.id, url = %sub.url, "Subscription created");
        Ok(sub)
    }

    pub async fn get(&self, id: i64) -> Result<Sub> {
        self.repo.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<Sub>> {
        self.repo.list().await
    }

    pub async fn list_auto_update(&self) -> Result<Vec<Sub>> {
        self.repo.list_auto_update().await
    }

    /// Apply the non-empty fields of `patch`.
    pub async fn update(&self, id: i64, patch: SubPatch) -> Result<Sub> {
        let mut sub = self.repo.get_by_id(id).await?;
        if let Some(url) = patch.url.filter(|u| !u.is_empty()) {
            sub.url = url;
        }
        if let Some(cron) = patch.cron.filter(|c| !c.is_empty()) {
            check_cron(&cron)?;
            sub.cron = cron;
        }
        if let Some(auto_update) = patch.auto_update {
            sub.auto_update = auto_update;
        }
        self.repo.update(sub).await
    }

    /// Delete a subscription and drop its cached content.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.repo.delete(id).await?;
        self.store.remove(id);
        tracing::info!(id, "Subscription deleted");
        Ok(())
    }

    /// Fetch the subscription's URL, cache the body and stamp `last_fetch`.
    pub async fn fetch(&self, id: i64) -> Result<Fetched> {
        let sub = self.repo.get_by_id(id).await?;
        let content = self.fetcher.fetch(&sub.url).await?;
        self.store.store(id, content.clone());

        if let Err(e) = self.repo.update_last_fetch(id).await {
            tracing::error!(id, "Failed to update last fetch time: {e}");
        }

        let sub = self.repo.get_by_id(id).await?;
        Ok(Fetched { sub, content })
    }

    /// Most recently fetched body, if any.
    pub fn cached_content(&self, id: i64) -> Option<String> {
        self.store.get(id)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}
