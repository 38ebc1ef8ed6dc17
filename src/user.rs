//! User accounts: model, storage and account operations.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use libsql::Row;
use serde::Serialize;

use crate::db::{self, Handle};
use crate::{Error, Result};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Shortest password accepted when changing it.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored hash. Unparseable hashes never match.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is malformed: {e}");
            false
        }
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
}

impl User {
    /// User 1 is the administrator.
    pub fn is_admin(&self) -> bool {
        self.id == 1
    }

    /// A copy without the password hash, for responses.
    pub fn sanitize(&self) -> User {
        User {
            password: String::new(),
            ..self.clone()
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(&self.password, password)
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            created_at: db::parse_timestamp("created_at", &row.get::<String>(3)?)?,
            updated_at: db::parse_timestamp("updated_at", &row.get::<String>(4)?)?,
        })
    }
}

const USER_COLUMNS: &str = "id, username, password, created_at, updated_at";

/// SQL storage for users.
#[derive(Clone)]
pub struct Repository {
    db: Handle,
}

impl Repository {
    pub fn new(db: Handle) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User> {
        let conn = self.db.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => User::from_row(&row),
            None => Err(Error::NotFound("User not found".to_string())),
        }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        let conn = self.db.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
            )
            .await?;
        match rows.next().await? {
            Some(row) => User::from_row(&row),
            None => Err(Error::NotFound("User not found".to_string())),
        }
    }

    /// Insert a user with an already hashed password.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<User> {
        let conn = self.db.connect().await?;
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                if exists(tx, "SELECT 1 FROM users WHERE username = ?1", &username).await? {
                    return Err(Error::Conflict("Username already exists".to_string()));
                }
                let now = db::now();
                tx.execute(
                    "INSERT INTO users (username, password, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    libsql::params![username.as_str(), password_hash.as_str(), now.as_str()],
                )
                .await?;
                let timestamp = db::parse_timestamp("created_at", &now)?;
                Ok(User {
                    id: tx.last_insert_rowid(),
                    username,
                    password: password_hash,
                    created_at: timestamp,
                    updated_at: timestamp,
                })
            })
        })
        .await
    }

    /// Rename a user. Fails if another account has the name.
    pub async fn update_username(&self, id: i64, username: &str) -> Result<()> {
        let conn = self.db.connect().await?;
        let username = username.to_string();
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_user(tx, id).await?;
                let mut rows = tx
                    .query(
                        "SELECT 1 FROM users WHERE username = ?1 AND id != ?2",
                        libsql::params![username.as_str(), id],
                    )
                    .await?;
                if rows.next().await?.is_some() {
                    return Err(Error::Conflict("Username already exists".to_string()));
                }
                tx.execute(
                    "UPDATE users SET username = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![username.as_str(), db::now(), id],
                )
                .await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let conn = self.db.connect().await?;
        let password_hash = password_hash.to_string();
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_user(tx, id).await?;
                tx.execute(
                    "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![password_hash.as_str(), db::now(), id],
                )
                .await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let conn = self.db.connect().await?;
        db::with_transaction(&conn, move |tx| {
            Box::pin(async move {
                ensure_user(tx, id).await?;
                tx.execute("DELETE FROM users WHERE id = ?1", [id]).await?;
                Ok(())
            })
        })
        .await
    }
}

async fn exists(conn: &libsql::Connection, sql: &str, value: &str) -> Result<bool> {
    let mut rows = conn.query(sql, [value]).await?;
    Ok(rows.next().await?.is_some())
}

async fn ensure_user(conn: &libsql::Connection, id: i64) -> Result<()> {
    let mut rows = conn.query("SELECT 1 FROM users WHERE id = ?1", [id]).await?;
    match rows.next().await? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound("User not found".to_string())),
    }
}

/// Account operations on top of [`Repository`].
#[derive(Clone)]
pub struct Service {
    repo: Repository,
}

impl Service {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.repo.get_by_id(id).await
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let hash = hash_password(password)?;
        self.repo.create(username, &hash).await
    }

    /// Resolve a username and password to a user.
    ///
    /// Unknown users and wrong passwords both yield
    /// [`Error::InvalidCredentials`].
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let user = match self.repo.get_by_username(username).await {
            Ok(user) => user,
            Err(Error::NotFound(_)) => return Err(Error::InvalidCredentials),
            Err(e) => return Err(e),
        };
        if !user.check_password(password) {
            return Err(Error::InvalidCredentials);
        }
        Ok(user)
    }

    /// Replace a password after checking the old one.
    pub async fn change_password(&self, id: i64, old_password: &str, new_password: &str) -> Result<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Error::BadRequest(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let user = self.repo.get_by_id(id).await?;
        if !user.check_password(old_password) {
            return Err(Error::InvalidCredentials);
        }
        let hash = hash_password(new_password)?;
        self.repo.update_password(id, &hash).await
    }

    pub async fn rename(&self, id: i64, username: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(Error::BadRequest("Username cannot be empty".to_string()));
        }
        self.repo.update_username(id, username).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.repo.delete(id).await
    }
}
