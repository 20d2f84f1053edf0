//! Request-processing chains.
//!
//! A route is served by an ordered list of [`Middleware`] steps. Each step
//! receives the request [`Context`] and a [`Next`] handle; it either returns a
//! [`Reply`] (or error) itself or hands the context on with [`Next::run`].
//! The last step is the terminal business handler.
//!
//! Every step carries an explicit `requires_auth` capability flag. The route
//! binder documents a route as secured exactly when one of its steps carries
//! the flag; the flag is never inferred from a step's name.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::path;
use crate::response::{self, HttpResponse};
use crate::router::{BoxFuture, Context};

type Step = dyn Fn(Context, Next) -> BoxFuture<'static, Result<Reply>> + Send + Sync;

/// One step of a route's chain.
#[derive(Clone)]
pub struct Middleware {
    name: Cow<'static, str>,
    requires_auth: bool,
    step: Arc<Step>,
}

impl Middleware {
    /// Wrap a function that receives the context and the rest of the chain.
    ///
    /// The step's name is the function's identifier (empty for closures).
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(path::identifier_of::<F>()),
            requires_auth: false,
            step: Arc::new(move |ctx: Context, next: Next| -> BoxFuture<'static, Result<Reply>> {
                Box::pin(f(ctx, next))
            }),
        }
    }

    /// Wrap a terminal handler. Handlers never call the rest of the chain.
    ///
    /// # Example
    /// ```ignore
    /// async fn list_house_rules(ctx: Context) -> Result<Reply> { ... }
    ///
    /// let step = Middleware::handler(list_house_rules);
    /// assert_eq!(step.name(), "list_house_rules");
    /// ```
    pub fn handler<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(path::identifier_of::<F>()),
            requires_auth: false,
            step: Arc::new(move |ctx: Context, _next: Next| -> BoxFuture<'static, Result<Reply>> {
                Box::pin(f(ctx))
            }),
        }
    }

    /// Wrap a terminal handler that needs shared state (a store, a client).
    /// The state is cloned into every call.
    pub fn handler_with<S, F, Fut>(state: S, f: F) -> Self
    where
        S: Clone + Send + Sync + 'static,
        F: Fn(S, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(path::identifier_of::<F>()),
            requires_auth: false,
            step: Arc::new(move |ctx: Context, _next: Next| -> BoxFuture<'static, Result<Reply>> {
                Box::pin(f(state.clone(), ctx))
            }),
        }
    }

    /// Override the step's name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the step as the access-control step.
    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// Run this step.
    pub fn call(&self, ctx: Context, next: Next) -> BoxFuture<'static, Result<Reply>> {
        (self.step)(ctx, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .field("requires_auth", &self.requires_auth)
            .finish_non_exhaustive()
    }
}

/// The remainder of a chain.
pub struct Next {
    chain: Arc<[Middleware]>,
    index: usize,
}

impl Next {
    /// Position a handle at the start of `chain`.
    pub fn start(chain: Arc<[Middleware]>) -> Self {
        Self { chain, index: 0 }
    }

    /// Run the next step with `ctx`.
    pub fn run(self, ctx: Context) -> BoxFuture<'static, Result<Reply>> {
        match self.chain.get(self.index).cloned() {
            Some(step) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                };
                step.call(ctx, next)
            }
            None => Box::pin(async {
                Err(Error::Internal("Chain ended without a reply".to_string()))
            }),
        }
    }
}

/// A payload a chain wants to send, before it is encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    body: Option<Value>,
}

impl Reply {
    /// A JSON reply with the given status.
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Self> {
        Ok(Self {
            status,
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// A 200 OK JSON reply.
    pub fn ok<T: Serialize>(body: &T) -> Result<Self> {
        Self::json(StatusCode::OK, body)
    }

    /// A 201 Created JSON reply.
    pub fn created<T: Serialize>(body: &T) -> Result<Self> {
        Self::json(StatusCode::CREATED, body)
    }

    /// A 204 No Content reply.
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Encode into an HTTP response.
    pub fn into_response(self) -> Result<HttpResponse> {
        match self.body {
            Some(body) => response::json(self.status, &body),
            None => Ok(response::empty(self.status)),
        }
    }
}
