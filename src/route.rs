//! Declarative route descriptors.
//!
//! A [`Route`] is one method + path with an ordered middleware chain and an
//! ordered handler chain. A [`GroupRouter`] is a path prefix with shared
//! middleware and child routes. Both are plain data built with chained calls;
//! nothing is checked until [`Route::validate`] runs during registration.
//!
//! ```ignore
//! use subhub::route::{GroupRouter, Route, RouteMethod};
//! use subhub::router::handler;
//!
//! let group = GroupRouter::new("/api/user")
//!     .with_middleware(subhub::middleware::jwt_auth())
//!     .add_route(
//!         Route::new("/info", RouteMethod::Get)
//!             .handle(handler(|_ctx| async { subhub::response::ok("Success", &()) }))
//!             .with_description("Get user information"),
//!     );
//! ```

use std::fmt;

use hyper::Method;

use crate::router::Link;

/// HTTP method a route is declared for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// Every method the engine knows about.
    Any,
    /// A method name the registrar does not recognise. Bound as GET.
    Other(String),
}

/// Methods bound for [`RouteMethod::Any`].
pub const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::DELETE,
    Method::CONNECT,
    Method::TRACE,
];

impl RouteMethod {
    /// The engine methods this route binds to, or `None` for
    /// [`RouteMethod::Other`].
    pub fn http_methods(&self) -> Option<Vec<Method>> {
        let methods = match self {
            RouteMethod::Get => vec![Method::GET],
            RouteMethod::Post => vec![Method::POST],
            RouteMethod::Put => vec![Method::PUT],
            RouteMethod::Delete => vec![Method::DELETE],
            RouteMethod::Head => vec![Method::HEAD],
            RouteMethod::Options => vec![Method::OPTIONS],
            RouteMethod::Patch => vec![Method::PATCH],
            RouteMethod::Any => ANY_METHODS.to_vec(),
            RouteMethod::Other(_) => return None,
        };
        Some(methods)
    }
}

impl From<&str> for RouteMethod {
    fn from(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => RouteMethod::Get,
            "POST" => RouteMethod::Post,
            "PUT" => RouteMethod::Put,
            "DELETE" => RouteMethod::Delete,
            "HEAD" => RouteMethod::Head,
            "OPTIONS" => RouteMethod::Options,
            "PATCH" => RouteMethod::Patch,
            "ANY" => RouteMethod::Any,
            _ => RouteMethod::Other(name.to_string()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Any => "ANY",
            RouteMethod::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// A route descriptor that breaks the registration contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Route path cannot be empty")]
    EmptyPath,

    #[error("Route must have at least one handler")]
    NoHandlers,
}

/// One endpoint: method + path bound to middleware and handler chains.
#[derive(Clone)]
pub struct Route {
    pub path: String,
    pub method: RouteMethod,
    pub handlers: Vec<Link>,
    pub middlewares: Vec<Link>,
    pub description: String,
}

impl Route {
    pub fn new(path: impl Into<String>, method: impl Into<RouteMethod>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            handlers: Vec::new(),
            middlewares: Vec::new(),
            description: String::new(),
        }
    }

    /// Append a handler.
    pub fn handle(mut self, handler: Link) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Append a route-level middleware. Runs after any group middleware.
    pub fn with_middleware(mut self, middleware: Link) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check the route can be bound.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if self.handlers.is_empty() {
            return Err(ValidationError::NoHandlers);
        }
        Ok(())
    }

    /// The bound chain: middlewares first, then handlers, each in
    /// declaration order.
    pub fn chain(&self) -> Vec<Link> {
        self.middlewares
            .iter()
            .chain(self.handlers.iter())
            .cloned()
            .collect()
    }

    /// Path with a leading `/` added if it was declared without one.
    pub fn normalized_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("handlers", &self.handlers.len())
            .field("middlewares", &self.middlewares.len())
            .field("description", &self.description)
            .finish()
    }
}

/// Routes sharing a path prefix and middleware.
#[derive(Clone)]
pub struct GroupRouter {
    pub path: String,
    pub routes: Vec<Route>,
    pub middlewares: Vec<Link>,
}

impl GroupRouter {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            routes: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware shared by every route in the group.
    pub fn with_middleware(mut self, middleware: Link) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn add_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }
}

impl fmt::Debug for GroupRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRouter")
            .field("path", &self.path)
            .field("routes", &self.routes)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
