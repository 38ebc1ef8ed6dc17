//! subhub - subscription management backend.
//!
//! The crate is split into a small HTTP framework and the application built
//! on it:
//!
//! - **Router**: path matching with handler chains (middlewares + handlers)
//! - **Module**: declarative route registration, directly or by export table
//! - **Config**: layered configuration (file → env → CLI)
//! - **Database**: libsql/Turso, local or remote, with migrations
//! - **Auth**: JWT issuing and verification, Argon2 password hashes
//! - **Subscriptions**: CRUD, cron validation and content fetching
//! - **Server**: hyper server with CORS, static assets and graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use subhub::{ConfigLoader, app, db, server};
//! use subhub::config::Overrides;
//!
//! #[tokio::main]
//! async fn main() -> subhub::Result<()> {
//!     let config = ConfigLoader::default().load(None, &Overrides::default())?;
//!     let db = db::open(&config.database).await?;
//!     let router = app::build(db)?;
//!     server::run(Arc::new(config), router.into_handle()).await
//! }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod content;
pub mod cors;
pub mod cron;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod openapi;
pub mod operation;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod sub;
pub mod user;

// Re-export main types at crate root
pub use config::{Config, ConfigLoader};
pub use db::Handle as DbHandle;
pub use error::{Error, Result};
pub use module::Module;
pub use openapi::Info;
pub use route::{GroupRouter, Route, RouteMethod};
pub use router::{Context, Router};

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;
