//! HTTP routing with matchit.
//!
//! Every bound endpoint is a chain of [`Link`]s. Middleware links call
//! [`Next::run`] to pass the request on. Handler links run in order; the
//! last one to run produces the response, and an error aborts the chain.
//! Routes are bound on a mutable [`Router`] during startup, then frozen into
//! a [`RouterHandle`] shared by all connections.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hyper::Method;
use serde::de::DeserializeOwned;

use crate::config::SharedConfig;
use crate::response::{self, HttpResponse};
use crate::route::ANY_METHODS;
use crate::{Error, Result};

/// Boxed future for async handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request context passed down a handler chain.
#[derive(Clone)]
pub struct Context {
    /// The HTTP method.
    pub method: Method,
    /// The request URI.
    pub uri: hyper::Uri,
    /// The request headers.
    pub headers: hyper::http::HeaderMap,
    /// Route parameters (e.g., {id} from path).
    pub params: HashMap<String, String>,
    /// The request body, pre-read as bytes.
    pub body: Bytes,
    /// Server configuration.
    pub config: SharedConfig,
    /// Authenticated user, set by the JWT middleware.
    pub user_id: Option<i64>,
}

impl Context {
    pub fn new(
        method: Method,
        uri: hyper::Uri,
        headers: hyper::http::HeaderMap,
        body: Bytes,
        config: SharedConfig,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            params: HashMap::new(),
            body,
            config,
            user_id: None,
        }
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))
        } else {
            serde_json::from_slice(&self.body)
                .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))
        }
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a route parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get a required route parameter, returning BadRequest if missing.
    pub fn require_param(&self, name: &str) -> Result<&str> {
        self.param(name)
            .ok_or_else(|| Error::BadRequest(format!("Missing parameter: {name}")))
    }

    /// The authenticated user, or Unauthorized when no auth middleware ran.
    pub fn require_user_id(&self) -> Result<i64> {
        self.user_id.ok_or(Error::Unauthorized)
    }
}

/// One element of a handler chain.
pub type Link = Arc<dyn Fn(Context, Next) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

/// A bound chain: middlewares followed by handlers.
pub type Chain = Arc<[Link]>;

/// Wrap a handler.
///
/// If links follow it in the chain they run next, with the context this
/// handler saw, and its response is replaced by theirs. An `Err` aborts the
/// rest of the chain.
pub fn handler<F, Fut>(f: F) -> Link
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(move |ctx: Context, next: Next| -> BoxFuture<'static, Result<HttpResponse>> {
        if next.is_end() {
            return Box::pin(f(ctx));
        }
        let current = f(ctx.clone());
        Box::pin(async move {
            current.await?;
            next.run(ctx).await
        })
    })
}

/// Wrap a middleware. It decides whether to call `next.run(ctx)`.
pub fn middleware<F, Fut>(f: F) -> Link
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(move |ctx: Context, next: Next| -> BoxFuture<'static, Result<HttpResponse>> {
        Box::pin(f(ctx, next))
    })
}

/// The remainder of a chain.
#[derive(Clone)]
pub struct Next {
    chain: Chain,
    index: usize,
}

impl Next {
    /// Start at the head of `chain`.
    pub fn new(chain: Chain) -> Self {
        Self { chain, index: 0 }
    }

    /// True when no links remain.
    pub fn is_end(&self) -> bool {
        self.index >= self.chain.len()
    }

    /// Run the next link.
    pub fn run(self, ctx: Context) -> BoxFuture<'static, Result<HttpResponse>> {
        match self.chain.get(self.index).cloned() {
            Some(link) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                };
                link(ctx, next)
            }
            None => Box::pin(async {
                Err(Error::Internal(
                    "handler chain ended without a response".to_string(),
                ))
            }),
        }
    }
}

/// Join a group prefix and a relative path. A trailing slash on the relative
/// path is kept.
pub fn join_paths(prefix: &str, relative: &str) -> String {
    if relative.is_empty() {
        return prefix.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// A registered path with method-specific chains.
#[derive(Default)]
struct RouteEntry {
    chains: HashMap<Method, Chain>,
}

macro_rules! method_helpers {
    ($($name:ident => $method:expr),* $(,)?) => {
        $(
            #[doc = concat!("Bind a chain for `", stringify!($name), "` requests.")]
            pub fn $name(&mut self, path: &str, chain: Vec<Link>) -> Result<()> {
                self.route($method, path, chain)
            }
        )*

        /// Bind the same chain for every method.
        pub fn any(&mut self, path: &str, chain: Vec<Link>) -> Result<()> {
            for method in ANY_METHODS {
                self.route(method, path, chain.clone())?;
            }
            Ok(())
        }
    };
}

/// HTTP router for registering and dispatching requests.
pub struct Router {
    routes: matchit::Router<usize>,
    patterns: HashMap<String, usize>,
    entries: Vec<RouteEntry>,
    operations: Vec<crate::operation::Meta>,
}

impl Router {
    /// Create a new router.
    pub fn new() -> Self {
        Self {
            routes: matchit::Router::new(),
            patterns: HashMap::new(),
            entries: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Bind a chain for a method and path pattern.
    ///
    /// Binding the same method and pattern twice, or a pattern the radix tree
    /// rejects, is a [`Error::RouteConflict`].
    pub fn route(&mut self, method: Method, path: &str, chain: Vec<Link>) -> Result<()> {
        let idx = match self.patterns.get(path) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.routes
                    .insert(path, idx)
                    .map_err(|e| Error::RouteConflict(format!("{path}: {e}")))?;
                self.patterns.insert(path.to_string(), idx);
                self.entries.push(RouteEntry::default());
                idx
            }
        };

        let entry = &mut self.entries[idx];
        if entry.chains.contains_key(&method) {
            return Err(Error::RouteConflict(format!(
                "{method} {path} is already bound"
            )));
        }
        entry.chains.insert(method, chain.into());
        Ok(())
    }

    /// Check that every `(method, pattern)` in `bindings` could be bound,
    /// without binding any of them.
    pub fn check_free(&self, bindings: &[(Method, String)]) -> Result<()> {
        let mut routes = self.routes.clone();
        let mut added: HashSet<&str> = HashSet::new();
        let mut seen: HashSet<(&Method, &str)> = HashSet::new();

        for (method, path) in bindings {
            if !seen.insert((method, path.as_str())) || self.bound(method, path).is_some() {
                return Err(Error::RouteConflict(format!(
                    "{method} {path} is already bound"
                )));
            }
            if !self.patterns.contains_key(path) && added.insert(path.as_str()) {
                routes
                    .insert(path.as_str(), 0)
                    .map_err(|e| Error::RouteConflict(format!("{path}: {e}")))?;
            }
        }
        Ok(())
    }

    method_helpers! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        delete => Method::DELETE,
        head => Method::HEAD,
        options => Method::OPTIONS,
        patch => Method::PATCH,
    }

    /// Open a sub-router under `prefix` whose routes run `middlewares` first.
    pub fn group(&mut self, prefix: &str, middlewares: Vec<Link>) -> Group<'_> {
        Group {
            router: self,
            prefix: prefix.to_string(),
            middlewares,
        }
    }

    /// The chain bound at an exact pattern, if any.
    pub fn bound(&self, method: &Method, pattern: &str) -> Option<Chain> {
        let idx = self.patterns.get(pattern)?;
        self.entries[*idx].chains.get(method).cloned()
    }

    /// Number of method + pattern bindings.
    pub fn binding_count(&self) -> usize {
        self.entries.iter().map(|e| e.chains.len()).sum()
    }

    /// Operation metadata recorded for the OpenAPI document.
    pub fn operations(&self) -> &[crate::operation::Meta] {
        &self.operations
    }

    pub(crate) fn describe(&mut self, meta: crate::operation::Meta) {
        self.operations.push(meta);
    }

    /// Serve an OpenAPI document of everything described so far at `path`.
    pub fn openapi(&mut self, path: &str, info: crate::openapi::Info) -> Result<()> {
        let doc = crate::openapi::generate(&info, &self.operations);
        let json = Bytes::from(serde_json::to_vec(&doc)?);
        self.get(
            path,
            vec![handler(move |_ctx| {
                let json = json.clone();
                async move { Ok(response::file(json, "application/json")) }
            })],
        )
    }

    /// Convert to a thread-safe handle for use in request handling.
    pub fn into_handle(self) -> Arc<RouterHandle> {
        tracing::info!(
            paths = self.entries.len(),
            bindings = self.binding_count(),
            "Router frozen"
        );
        Arc::new(RouterHandle {
            routes: self.routes,
            entries: self.entries,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes bound under a shared prefix and middleware.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    middlewares: Vec<Link>,
}

impl Group<'_> {
    /// Bind `chain` at `prefix + path`, after the group middlewares.
    pub fn route(&mut self, method: Method, path: &str, chain: Vec<Link>) -> Result<()> {
        let full_path = join_paths(&self.prefix, path);
        let full_chain: Vec<Link> = self.middlewares.iter().cloned().chain(chain).collect();
        self.router.route(method, &full_path, full_chain)
    }

    method_helpers! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        delete => Method::DELETE,
        head => Method::HEAD,
        options => Method::OPTIONS,
        patch => Method::PATCH,
    }

    /// Open a nested group. Middlewares accumulate outermost first.
    pub fn group(&mut self, prefix: &str, middlewares: Vec<Link>) -> Group<'_> {
        Group {
            prefix: join_paths(&self.prefix, prefix),
            middlewares: self.middlewares.iter().cloned().chain(middlewares).collect(),
            router: &mut *self.router,
        }
    }

    pub(crate) fn describe(&mut self, mut meta: crate::operation::Meta) {
        meta.path = join_paths(&self.prefix, &meta.path);
        self.router.describe(meta);
    }
}

/// Thread-safe router handle for use in request handling.
pub struct RouterHandle {
    routes: matchit::Router<usize>,
    entries: Vec<RouteEntry>,
}

/// Result of matching a request to a route.
pub enum RouteMatch {
    /// Route matched with its chain.
    Matched {
        chain: Chain,
        params: HashMap<String, String>,
    },
    /// Path matched but method not allowed.
    MethodNotAllowed,
    /// Path not found.
    NotFound,
}

impl RouterHandle {
    /// Match a request to a route.
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch {
        match self.routes.at(path) {
            Ok(matched) => {
                let entry = &self.entries[*matched.value];

                let params: HashMap<String, String> = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                match entry.chains.get(method) {
                    Some(chain) => RouteMatch::Matched {
                        chain: chain.clone(),
                        params,
                    },
                    None => RouteMatch::MethodNotAllowed,
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }
}
