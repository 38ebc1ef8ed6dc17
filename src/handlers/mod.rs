//! API modules bound by the registrar.
//!
//! - [`users`]: login, logout and account info under `/api/user`
//! - [`subs`]: subscription CRUD and fetching under `/api/sub`
//! - [`system`]: health check and static assets

pub mod subs;
pub mod system;
pub mod users;

pub use subs::Subs;
pub use system::System;
pub use users::Users;
