//! HTTP routing with matchit.
//!
//! The router is the underlying dispatch table: it maps a method and path
//! pattern to installed handlers. Route chains built by the
//! [`Binder`](crate::binder::Binder) are installed here with [`Router::chain`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hyper::{Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::SharedConfig;
use crate::middleware::{Middleware, Next};
use crate::openapi::{Info, Registry};
use crate::response::{self, HttpResponse};
use crate::schema::Compiled;
use crate::{Error, Result};

/// Boxed future for async handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request values that passed the validation gate, after coercion.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    pub body: Option<Value>,
    pub params: Option<Value>,
    pub query: Option<Value>,
}

/// Handler context passed along a route's chain. One per request.
pub struct Context {
    /// The HTTP method.
    pub method: Method,
    /// The request URI.
    pub uri: Uri,
    /// The request headers.
    pub headers: hyper::http::HeaderMap,
    /// Route parameters (e.g., {id} from path).
    pub params: HashMap<String, String>,
    /// The request body, pre-read as bytes.
    pub body: Bytes,
    /// Server configuration.
    pub config: SharedConfig,
    /// Subject of the verified bearer token, set by the access-control step.
    pub user: Option<String>,
    pub(crate) response_schema: Option<Arc<Compiled>>,
    pub(crate) validated: Validated,
}

impl Context {
    /// A context with no headers, params or body.
    pub fn new(method: Method, uri: Uri, config: SharedConfig) -> Self {
        Self {
            method,
            uri,
            headers: hyper::http::HeaderMap::new(),
            params: HashMap::new(),
            body: Bytes::new(),
            config,
            user: None,
            response_schema: None,
            validated: Validated::default(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_headers(mut self, headers: hyper::http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| crate::Error::BadRequest(format!("Invalid request body: {e}")))
        } else {
            serde_json::from_slice(&self.body)
                .map_err(|e| crate::Error::BadRequest(format!("Invalid request body: {e}")))
        }
    }

    /// The validated body as `T`, falling back to [`Context::json`] when the
    /// route declares no body shape.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.validated.body {
            Some(value) => from_validated(value, "body"),
            None => self.json(),
        }
    }

    /// The validated route parameters as `T`. Without a params shape the raw
    /// string values are used.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.validated.params {
            Some(value) => from_validated(value, "params"),
            None => from_validated(&strings(&self.params), "params"),
        }
    }

    /// The validated query as `T`. Without a query shape the raw string
    /// values are used.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.validated.query {
            Some(value) => from_validated(value, "query"),
            None => from_validated(&strings(&self.query_pairs()), "query"),
        }
    }

    /// Decoded query string pairs. A repeated key keeps its last value.
    pub fn query_pairs(&self) -> HashMap<String, String> {
        self.uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// The response shape attached to this request.
    pub fn response_schema(&self) -> Option<&Compiled> {
        self.response_schema.as_deref()
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a route parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Require authenticated user, returning Unauthorized if not present.
    pub fn require_user(&self) -> Result<&str> {
        self.user.as_deref().ok_or(Error::Unauthorized)
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        Self::new(
            Method::GET,
            Uri::from_static("/"),
            Arc::new(crate::config::Config::default()),
        )
    }
}

fn from_validated<T: DeserializeOwned>(value: &Value, part: &str) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::BadRequest(format!("Invalid request {part}: {e}")))
}

fn strings(raw: &HashMap<String, String>) -> Value {
    Value::Object(
        raw.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    )
}

/// Handler function type.
/// Takes a Context and returns a future resolving to a Response.
pub type Handler = Box<dyn Fn(Context) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

/// A registered route with method-specific handlers. A method registered
/// twice keeps both handlers; the first one serves requests.
struct RouteEntry {
    handlers: HashMap<Method, Vec<Handler>>,
}

/// HTTP router for registering and dispatching requests.
pub struct Router {
    routes: matchit::Router<usize>,
    patterns: HashMap<String, usize>,
    entries: Vec<RouteEntry>,
}

impl Router {
    /// Create a new router.
    pub fn new() -> Self {
        Self {
            routes: matchit::Router::new(),
            patterns: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register a handler for a method and path pattern (`/items/{id}`).
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the pattern conflicts with an installed one.
    pub fn route<F, Fut>(&mut self, method: Method, path: &str, handler: F) -> Result<()>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        let boxed: Handler =
            Box::new(move |ctx: Context| -> BoxFuture<'static, Result<HttpResponse>> {
                Box::pin(handler(ctx))
            });
        self.insert(method, path, boxed)
    }

    /// Install a chain of steps for a method and path pattern.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the pattern conflicts with an installed one.
    pub fn chain(&mut self, method: Method, path: &str, steps: Vec<Middleware>) -> Result<()> {
        let steps: Arc<[Middleware]> = steps.into();
        self.route(method, path, move |ctx| {
            let next = Next::start(Arc::clone(&steps));
            async move { next.run(ctx).await?.into_response() }
        })
    }

    /// Number of handlers installed for a method and path pattern.
    pub fn installed(&self, method: &Method, path: &str) -> usize {
        self.patterns
            .get(path)
            .and_then(|idx| self.entries[*idx].handlers.get(method))
            .map_or(0, Vec::len)
    }

    /// Register a GET route that serves the OpenAPI JSON document built from
    /// everything registered so far.
    pub fn openapi(&mut self, path: &str, registry: &Registry, info: Info) -> Result<()> {
        let json = Bytes::from(serde_json::to_vec(&registry.document(&info))?);
        self.route(Method::GET, path, move |_ctx| {
            let json = json.clone();
            async move { Ok(response::build(StatusCode::OK, "application/json", json)) }
        })
    }

    fn insert(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        let entry_idx = match self.patterns.get(path) {
            Some(idx) => *idx,
            None => {
                self.routes
                    .insert(path, self.entries.len())
                    .map_err(|e| Error::Config(format!("Cannot install route {path}: {e}")))?;
                self.entries.push(RouteEntry {
                    handlers: HashMap::new(),
                });
                let idx = self.entries.len() - 1;
                self.patterns.insert(path.to_string(), idx);
                idx
            }
        };

        self.entries[entry_idx]
            .handlers
            .entry(method)
            .or_default()
            .push(handler);
        Ok(())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe router handle for use in request handling.
pub struct RouterHandle {
    routes: matchit::Router<usize>,
    entries: Vec<RouteEntry>,
}

impl Router {
    /// Convert to a thread-safe handle for use in request handling.
    pub fn into_handle(self) -> Arc<RouterHandle> {
        Arc::new(RouterHandle {
            routes: self.routes,
            entries: self.entries,
        })
    }
}

/// Result of matching a request to a route.
pub enum RouteMatch<'a> {
    /// Route matched with handler.
    Matched {
        handler: &'a Handler,
        params: HashMap<String, String>,
    },
    /// Path matched but method not allowed.
    MethodNotAllowed,
    /// Path not found.
    NotFound,
}

impl RouterHandle {
    /// Match a request to a route.
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        match self.routes.at(path) {
            Ok(matched) => {
                let entry = &self.entries[*matched.value];

                // Convert params to owned HashMap
                let params: HashMap<String, String> = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                match entry.handlers.get(method).and_then(|h| h.first()) {
                    Some(handler) => RouteMatch::Matched { handler, params },
                    None => RouteMatch::MethodNotAllowed,
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }

    /// Route a request context to its handler and render the outcome.
    pub async fn dispatch(&self, mut ctx: Context) -> HttpResponse {
        let path = ctx.uri.path().to_string();
        match self.match_route(&ctx.method, &path) {
            RouteMatch::Matched { handler, params } => {
                ctx.params = params;
                match handler(ctx).await {
                    Ok(response) => response,
                    Err(e) => e.into_response(),
                }
            }
            RouteMatch::MethodNotAllowed => {
                response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
            RouteMatch::NotFound => response::not_found("Not found"),
        }
    }
}
