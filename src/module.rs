//! Declarative route registration.
//!
//! A [`Module`] hands its routes to the registrar in one of two ways:
//!
//! - directly, by returning `Some` from [`Module::routes`] or
//!   [`Module::groups`];
//! - by convention, through an [`exports`](Module::exports) table. Every
//!   zero-arity export is invoked and its result kept if it is a [`Route`]
//!   (for [`register`]) or a [`GroupRouter`] (for [`register_group`]).
//!   Anything else is skipped, so a module can list helpers alongside its
//!   route factories.
//!
//! A direct capability always wins: when `routes()` returns `Some`, the
//! export table is not consulted.
//!
//! # Example
//!
//! ```ignore
//! use subhub::module::{Export, Module};
//! use subhub::route::{Route, RouteMethod};
//!
//! pub struct System;
//!
//! impl Module for System {
//!     fn name(&self) -> &'static str {
//!         "system"
//!     }
//!
//!     fn exports(&self) -> Vec<Export> {
//!         vec![Export::nullary("health", || {
//!             Route::new("/health", RouteMethod::Get).handle(health())
//!         })]
//!     }
//! }
//! ```

use std::any::Any;

use hyper::Method;

use crate::operation;
use crate::route::{GroupRouter, Route};
use crate::router::{Group, Link, Router, join_paths};
use crate::{Error, Result};

/// A pluggable API module.
pub trait Module: Send + Sync {
    /// Module name, used in error origins, logs and OpenAPI tags.
    fn name(&self) -> &'static str;

    /// Routes supplied directly. Takes precedence over [`Module::exports`].
    fn routes(&self) -> Option<Vec<Route>> {
        None
    }

    /// Groups supplied directly. Takes precedence over [`Module::exports`].
    fn groups(&self) -> Option<Vec<GroupRouter>> {
        None
    }

    /// Methods published for convention-based discovery.
    fn exports(&self) -> Vec<Export> {
        Vec::new()
    }
}

type Invoke = Box<dyn Fn() -> Box<dyn Any>>;

/// One entry in a module's export table.
pub struct Export {
    pub name: &'static str,
    pub arity: usize,
    invoke: Option<Invoke>,
}

impl Export {
    /// A method taking no arguments. The registrar may call it.
    pub fn nullary<T, F>(name: &'static str, f: F) -> Self
    where
        T: Any,
        F: Fn() -> T + 'static,
    {
        Self {
            name,
            arity: 0,
            invoke: Some(Box::new(move || Box::new(f()) as Box<dyn Any>)),
        }
    }

    /// A method taking `arity` arguments. Listed but never invoked.
    pub fn with_arity(name: &'static str, arity: usize) -> Self {
        Self {
            name,
            arity,
            invoke: None,
        }
    }

    fn call(&self) -> Option<Box<dyn Any>> {
        if self.arity != 0 {
            return None;
        }
        self.invoke.as_ref().map(|invoke| invoke())
    }
}

/// Zero-arity exports whose result is a `T`, paired with their origin.
fn discover<T: Any>(module: &str, exports: Vec<Export>) -> Vec<(String, T)> {
    exports
        .iter()
        .filter_map(|export| {
            let value = export.call()?.downcast::<T>().ok()?;
            Some((format!("{module}::{}", export.name), *value))
        })
        .collect()
}

fn direct<T>(module: &str, capability: &str, items: Vec<T>) -> Vec<(String, T)> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (format!("{module}::{capability}[{i}]"), item))
        .collect()
}

/// Register a module's routes on `router`.
///
/// Routes are validated and bound one at a time; the first invalid route
/// aborts with [`Error::InvalidRoute`].
pub fn register<M: Module + ?Sized>(router: &mut Router, module: &M) -> Result<()> {
    let name = module.name();
    let routes = match module.routes() {
        Some(routes) => direct(name, "routes", routes),
        None => discover::<Route>(name, module.exports()),
    };

    for (origin, route) in &routes {
        route.validate().map_err(|error| Error::InvalidRoute {
            origin: origin.clone(),
            error,
        })?;
        bind_route(router, route, name)?;
    }

    tracing::debug!(module = name, routes = routes.len(), "Routes registered");
    Ok(())
}

/// Register a module's groups on `router`.
///
/// Every route of a group is validated and checked for conflicts before any
/// of it is bound, so a group that fails leaves nothing behind.
pub fn register_group<M: Module + ?Sized>(router: &mut Router, module: &M) -> Result<()> {
    let name = module.name();
    let groups = match module.groups() {
        Some(groups) => direct(name, "groups", groups),
        None => discover::<GroupRouter>(name, module.exports()),
    };

    for (origin, group) in &groups {
        for route in &group.routes {
            route.validate().map_err(|error| Error::InvalidGroupRoute {
                group: group.path.clone(),
                origin: origin.clone(),
                error,
            })?;
        }

        let planned: Vec<(Method, String)> = group
            .routes
            .iter()
            .flat_map(|route| {
                let path = join_paths(&group.path, &route.normalized_path());
                methods_of(route).into_iter().map(move |m| (m, path.clone()))
            })
            .collect();
        router.check_free(&planned)?;

        let mut scope = router.group(&group.path, group.middlewares.clone());
        for route in &group.routes {
            bind_route(&mut scope, route, name)?;
        }
    }

    tracing::debug!(module = name, groups = groups.len(), "Groups registered");
    Ok(())
}

/// [`register`], panicking on error.
///
/// # Panics
///
/// If any route is invalid or conflicts with one already bound.
pub fn must_register<M: Module + ?Sized>(router: &mut Router, module: &M) {
    if let Err(e) = register(router, module) {
        panic!("{e}");
    }
}

/// [`register_group`], panicking on error.
///
/// # Panics
///
/// If any route is invalid or conflicts with one already bound.
pub fn must_register_group<M: Module + ?Sized>(router: &mut Router, module: &M) {
    if let Err(e) = register_group(router, module) {
        panic!("{e}");
    }
}

/// Something routes can be bound on: the router itself or a group scope.
trait Bind {
    fn bind(&mut self, method: Method, path: &str, chain: Vec<Link>) -> Result<()>;
    fn document(&mut self, meta: operation::Meta);
}

impl Bind for Router {
    fn bind(&mut self, method: Method, path: &str, chain: Vec<Link>) -> Result<()> {
        self.route(method, path, chain)
    }

    fn document(&mut self, meta: operation::Meta) {
        self.describe(meta);
    }
}

impl Bind for Group<'_> {
    fn bind(&mut self, method: Method, path: &str, chain: Vec<Link>) -> Result<()> {
        self.route(method, path, chain)
    }

    fn document(&mut self, meta: operation::Meta) {
        self.describe(meta);
    }
}

/// Methods a route binds. Unknown methods bind as GET.
fn methods_of(route: &Route) -> Vec<Method> {
    route.method.http_methods().unwrap_or_else(|| vec![Method::GET])
}

fn bind_route<B: Bind>(target: &mut B, route: &Route, tag: &str) -> Result<()> {
    let path = route.normalized_path();
    if route.method.http_methods().is_none() {
        tracing::warn!(method = %route.method, path = %path, "Unknown route method, binding as GET");
    }
    let methods = methods_of(route);

    let chain = route.chain();
    for method in methods {
        target.bind(method.clone(), &path, chain.clone())?;
        if method != Method::CONNECT {
            target.document(operation::Meta {
                path: path.clone(),
                method: method.as_str().to_ascii_lowercase(),
                summary: route.description.clone(),
                tag: tag.to_string(),
            });
        }
    }
    Ok(())
}
