//! `/api/sub` endpoints. Every route requires a bearer token.

use hyper::StatusCode;

use crate::middleware::jwt_auth;
use crate::module::Module;
use crate::route::{GroupRouter, Route, RouteMethod};
use crate::router::{Context, Link, handler};
use crate::sub::{NewSub, Service, SubPatch};
use crate::{Error, Result, response};

/// Subscription CRUD and fetching.
pub struct Subs {
    subs: Service,
}

impl Subs {
    pub fn new(subs: Service) -> Self {
        Self { subs }
    }

    fn group(&self) -> GroupRouter {
        GroupRouter::new("/api/sub")
            .with_middleware(jwt_auth())
            .add_route(
                Route::new("/add", RouteMethod::Post)
                    .handle(self.add())
                    .with_description("Create subscription"),
            )
            .add_route(
                Route::new("/list", RouteMethod::Get)
                    .handle(self.list())
                    .with_description("List subscriptions"),
            )
            .add_route(
                Route::new("/{id}", RouteMethod::Get)
                    .handle(self.get())
                    .with_description("Get subscription"),
            )
            .add_route(
                Route::new("/{id}/content", RouteMethod::Get)
                    .handle(self.content())
                    .with_description("Fetch subscription content"),
            )
            .add_route(
                Route::new("/{id}", RouteMethod::Put)
                    .handle(self.update())
                    .with_description("Update subscription"),
            )
            .add_route(
                Route::new("/{id}", RouteMethod::Delete)
                    .handle(self.delete())
                    .with_description("Delete subscription"),
            )
    }

    fn add(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |ctx: Context| {
            let subs = subs.clone();
            async move {
                let new: NewSub = ctx.json()?;
                let sub = subs.create(new).await?;
                response::created("Subscription created successfully", &sub)
            }
        })
    }

    fn list(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |_ctx: Context| {
            let subs = subs.clone();
            async move { response::ok("Success", &subs.list().await?) }
        })
    }

    fn get(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |ctx: Context| {
            let subs = subs.clone();
            async move {
                let sub = subs.get(sub_id(&ctx)?).await?;
                response::ok("Success", &sub)
            }
        })
    }

    fn content(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |ctx: Context| {
            let subs = subs.clone();
            async move {
                let id = sub_id(&ctx)?;
                let fetched = subs.fetch(id).await?;
                tracing::info!(id, bytes = fetched.content.len(), "Subscription fetched");
                response::ok("Success", &fetched)
            }
        })
    }

    fn update(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |ctx: Context| {
            let subs = subs.clone();
            async move {
                let id = sub_id(&ctx)?;
                let patch: SubPatch = ctx.json()?;
                let sub = subs.update(id, patch).await?;
                response::ok("Subscription updated successfully", &sub)
            }
        })
    }

    fn delete(&self) -> Link {
        let subs = self.subs.clone();
        handler(move |ctx: Context| {
            let subs = subs.clone();
            async move {
                subs.delete(sub_id(&ctx)?).await?;
                Ok(response::message(
                    StatusCode::OK,
                    "Subscription deleted successfully",
                ))
            }
        })
    }
}

fn sub_id(ctx: &Context) -> Result<i64> {
    ctx.require_param("id")?
        .parse()
        .map_err(|_| Error::BadRequest("Invalid subscription ID".to_string()))
}

impl Module for Subs {
    fn name(&self) -> &'static str {
        "subs"
    }

    fn groups(&self) -> Option<Vec<GroupRouter>> {
        Some(vec![self.group()])
    }
}
