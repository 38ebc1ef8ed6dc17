//! Health check and static assets.

use std::path::Path;

use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode, Uri};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config;
use crate::module::{Export, Module};
use crate::response::{self, HttpResponse};
use crate::route::{GroupRouter, Route, RouteMethod};
use crate::router::{Context, Link, handler};

/// System endpoints, published through the export table.
pub struct System;

impl Module for System {
    fn name(&self) -> &'static str {
        "system"
    }

    fn exports(&self) -> Vec<Export> {
        vec![
            Export::nullary("system_group", system_group),
            // Take arguments, so discovery skips them.
            Export::with_arity("health_check", 1),
            Export::with_arity("setup_static_assets", 1),
        ]
    }
}

fn system_group() -> GroupRouter {
    GroupRouter::new("/api").add_route(
        Route::new("/health", RouteMethod::Get)
            .handle(health_check())
            .with_description("Health check endpoint"),
    )
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    time: jiff::Timestamp,
}

fn health_check() -> Link {
    handler(|_ctx: Context| async move {
        response::ok(
            "Success",
            &Health {
                status: "ok",
                time: jiff::Timestamp::now(),
            },
        )
    })
}

/// Answer a request no route matched.
///
/// `/api/...` paths get the JSON 404 envelope. Everything else is served
/// from `static_dir`; paths without an extension are rewritten to
/// `/index.html` so client-side routes resolve.
pub async fn serve_static(server: &config::Server, mut req: Request<()>) -> HttpResponse {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return response::error(StatusCode::NOT_FOUND, "API endpoint not found");
    }

    let Some(root) = server.static_dir.as_deref() else {
        return response::error(StatusCode::NOT_FOUND, "Not found");
    };

    if Path::new(path).extension().is_none() {
        *req.uri_mut() = Uri::from_static("/index.html");
    }

    let resp = match ServeDir::new(root).oneshot(req).await {
        Ok(resp) => resp,
        Err(never) => match never {},
    };
    if resp.status() == StatusCode::NOT_FOUND {
        return response::error(StatusCode::NOT_FOUND, "Not found");
    }

    let (parts, body) = resp.into_parts();
    match body.collect().await {
        Ok(collected) => Response::from_parts(parts, Full::new(collected.to_bytes())),
        Err(e) => {
            tracing::warn!(root = %root.display(), "Static file read failed: {e}");
            response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
