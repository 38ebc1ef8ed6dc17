//! Application assembly: services, modules and the OpenAPI document.

use std::sync::Arc;

use crate::content::ContentStore;
use crate::db::Handle;
use crate::fetcher::Fetcher;
use crate::handlers::{Subs, System, Users};
use crate::module::register_group;
use crate::openapi::Info;
use crate::router::Router;
use crate::{Result, sub, user};

/// Path the OpenAPI document is served at.
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Build the full API router on top of `db`.
pub fn build(db: Handle) -> Result<Router> {
    let users = user::Service::new(user::Repository::new(db.clone()));
    let subs = sub::Service::new(
        sub::Repository::new(db),
        Arc::new(ContentStore::new()),
        Fetcher::new()?,
    );

    let mut router = Router::new();
    register_group(&mut router, &Users::new(users))?;
    register_group(&mut router, &Subs::new(subs))?;
    register_group(&mut router, &System)?;

    router.openapi(
        OPENAPI_PATH,
        Info {
            title: "subhub",
            version: env!("CARGO_PKG_VERSION"),
        },
    )?;

    tracing::info!(
        operations = router.operations().len(),
        "API modules registered"
    );
    Ok(router)
}
