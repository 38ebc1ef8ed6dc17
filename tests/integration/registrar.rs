//! Registrar tests through the public API, served over a real socket.

use std::sync::{Arc, Mutex};

use hyper::StatusCode;
use subhub::module::{self, Export, Module};
use subhub::response;
use subhub::route::{GroupRouter, Route, RouteMethod};
use subhub::router::{Context, Link, Router, handler, middleware};

use super::harness::{get, send, start_router};

fn reply(text: &'static str) -> Link {
    handler(move |_ctx: Context| async move { response::ok("Success", &text) })
}

/// Adds an `X-Trace` header naming itself after the rest of the chain ran.
fn trace(name: &'static str) -> Link {
    middleware(move |ctx, next| async move {
        let mut resp = next.run(ctx).await?;
        let trail = match resp.headers().get("X-Trace").and_then(|v| v.to_str().ok()) {
            Some(prev) => format!("{name},{prev}"),
            None => name.to_string(),
        };
        resp.headers_mut().insert(
            "X-Trace",
            trail.parse().map_err(|_| subhub::Error::Internal("bad trace".into()))?,
        );
        Ok(resp)
    })
}

struct Catalog;

impl Module for Catalog {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn exports(&self) -> Vec<Export> {
        vec![
            Export::nullary("items", || {
                Route::new("items", RouteMethod::Get)
                    .handle(reply("items"))
                    .with_middleware(trace("route"))
                    .with_description("List items")
            }),
            Export::nullary("purge", || {
                Route::new("/purge", RouteMethod::from("PURGE")).handle(reply("purged"))
            }),
            Export::nullary("version", || "1.0".to_string()),
            Export::with_arity("lookup", 2),
        ]
    }
}

struct Shop;

impl Module for Shop {
    fn name(&self) -> &'static str {
        "shop"
    }

    fn groups(&self) -> Option<Vec<GroupRouter>> {
        Some(vec![
            GroupRouter::new("/api/shop")
                .with_middleware(trace("group"))
                .add_route(
                    Route::new("/cart", RouteMethod::Any)
                        .with_middleware(trace("route"))
                        .handle(reply("cart")),
                ),
            GroupRouter::new("/api/public").add_route(Route::new("/ping", "get").handle(reply("pong"))),
        ])
    }
}

#[tokio::test]
async fn exported_routes_are_served() {
    let mut router = Router::new();
    module::register(&mut router, &Catalog).unwrap();
    assert_eq!(router.operations().len(), 2);
    let server = start_router(router).await;
    let addr = server.addr();

    let items = get(addr, "/items", None).await;
    // PURGE fell back to GET.
    let purge = get(addr, "/purge", None).await;
    server.shutdown().await;

    assert_eq!(items.status, 200);
    assert_eq!(items.json()["data"], "items");
    assert_eq!(items.header("X-Trace"), Some("route"));
    assert_eq!(purge.json()["data"], "purged");
}

#[tokio::test]
async fn group_middleware_runs_outside_route_middleware() {
    let mut router = Router::new();
    module::register_group(&mut router, &Shop).unwrap();
    let server = start_router(router).await;
    let addr = server.addr();

    let cart_get = get(addr, "/api/shop/cart", None).await;
    let cart_put = send(addr, "PUT", "/api/shop/cart", &[], Some("{}")).await;
    let ping = get(addr, "/api/public/ping", None).await;
    server.shutdown().await;

    // Outer middleware appends last, so its name comes first.
    assert_eq!(cart_get.header("X-Trace"), Some("group,route"));
    assert_eq!(cart_put.status, StatusCode::OK.as_u16());
    assert_eq!(ping.json()["data"], "pong");
    assert!(ping.header("X-Trace").is_none());
}

struct Audit(Arc<Mutex<Vec<&'static str>>>);

impl Module for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn routes(&self) -> Option<Vec<Route>> {
        let step = |name: &'static str| {
            let log = self.0.clone();
            handler(move |_ctx: Context| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name);
                    response::ok("Success", &name)
                }
            })
        };
        Some(vec![
            Route::new("/audit", RouteMethod::Post)
                .with_middleware(trace("outer"))
                .handle(step("record"))
                .handle(step("reply")),
        ])
    }
}

#[tokio::test]
async fn every_handler_runs_and_the_last_replies() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    module::register(&mut router, &Audit(log.clone())).unwrap();
    let server = start_router(router).await;

    let reply = send(server.addr(), "POST", "/audit", &[], Some("{}")).await;
    server.shutdown().await;

    assert_eq!(*log.lock().unwrap(), vec!["record", "reply"]);
    assert_eq!(reply.json()["data"], "reply");
    assert_eq!(reply.header("X-Trace"), Some("outer"));
}

#[test]
fn broken_group_reports_origin_and_binds_nothing() {
    struct Broken;

    impl Module for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn groups(&self) -> Option<Vec<GroupRouter>> {
            Some(vec![
                GroupRouter::new("/api/x")
                    .add_route(Route::new("/ok", RouteMethod::Get).handle(reply("ok")))
                    .add_route(Route::new("/missing", RouteMethod::Get)),
            ])
        }
    }

    let mut router = Router::new();
    let err = module::register_group(&mut router, &Broken).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid route in group /api/x from broken::groups[0]: Route must have at least one handler"
    );
    assert_eq!(router.binding_count(), 0);
}
