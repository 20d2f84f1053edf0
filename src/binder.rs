//! Declarative route binding.
//!
//! A [`Binder`] owns a root prefix and binds method + path declarations to the
//! underlying [`Router`] while documenting each one in the [`Registry`]. One
//! declaration yields both the runtime chain and the OpenAPI operation, so the
//! two can never drift apart.
//!
//! Every bound chain has the same shape:
//!
//! ```text
//! attach_response_schema -> validate_request -> caller steps... -> enforce_response -> handler
//! ```
//!
//! `validate_request` passes everything through when the route declares no
//! request shapes.
//!
//! # Example
//!
//! ```ignore
//! let mut binder = Binder::new("/house-rules", &mut router, &mut registry);
//! binder
//!     .get("/", Schemas::new().response::<Vec<HouseRule>>(), [Middleware::handler(list_house_rules)])?
//!     .post("/seed", Schemas::none(), [auth::can_access(), Middleware::handler(seed_house_rules)])?;
//! binder
//!     .route("/:id")
//!     .put(Schemas::new().body::<HouseRuleInput>().params::<HouseRuleId>(), [Middleware::handler(update_house_rule)])?
//!     .delete(Schemas::new().params::<HouseRuleId>(), [Middleware::handler(delete_house_rule)])?;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use hyper::Method;
use tracing::{debug, error};

use crate::enforce;
use crate::error::{Error, Result};
use crate::middleware::{Middleware, Next};
use crate::openapi::{ERROR_SCHEMA, Registry};
use crate::operation::{Meta, STANDARD_ERRORS, SchemaRef};
use crate::path;
use crate::router::{Context, Router};
use crate::schema::{Schemas, Shape};
use crate::validate;

/// Binds routes under a root prefix.
pub struct Binder<'a> {
    root: String,
    tag: String,
    router: &'a mut Router,
    registry: &'a mut Registry,
}

impl<'a> Binder<'a> {
    pub fn new(root: impl Into<String>, router: &'a mut Router, registry: &'a mut Registry) -> Self {
        let root = root.into();
        let tag = path::classify(&root);
        Self {
            root,
            tag,
            router,
            registry,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Bind `method` and `path` to a chain ending in the last middleware.
    ///
    /// The last middleware is the terminal handler: its identifier becomes the
    /// operation id and, titleized, the documented summary. The route is
    /// documented as secured when any middleware carries the
    /// [`requiring_auth`](Middleware::requiring_auth) flag.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a malformed path, an empty middleware
    /// list, a shape that does not compile, or a pattern that conflicts with
    /// an installed route.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        let full = path::normalize(&self.root, path)?;
        let mut steps: Vec<Middleware> = middlewares.into_iter().collect();
        let Some(handler) = steps.pop() else {
            return Err(Error::Config(format!(
                "Route {method} {full} has no handler"
            )));
        };

        let operation_id = handler.name().to_string();
        let title = path::titleize(&operation_id);
        let secured = handler.requires_auth() || steps.iter().any(Middleware::requires_auth);

        // Compile and install before touching the registry so a rejected
        // route leaves no components behind
        let request = schemas.request.filter(|r| !r.is_empty());
        let gate = validate::gate(request.as_ref())?;
        let response = schemas.response.unwrap_or_else(Shape::success);
        let compiled = Arc::new(response.compile()?);

        let mut chain = Vec::with_capacity(steps.len() + 4);
        chain.push(enforce::attach(compiled));
        chain.push(gate);
        chain.extend(steps);
        chain.push(enforce::enforce());
        chain.push(guard(handler));
        self.router.chain(method.clone(), &full, chain)?;

        let body = request
            .as_ref()
            .and_then(|r| r.body.as_ref())
            .map(|shape| self.registry.register_schema(&input_name(&title, shape), shape));
        let params = request
            .as_ref()
            .and_then(|r| r.params.as_ref())
            .map(|shape| self.registry.inline(shape));
        let query = request
            .as_ref()
            .and_then(|r| r.query.as_ref())
            .map(|shape| self.registry.inline(shape));
        let response_ref = self.registry.register_schema(response.name(), &response);

        let meta = Meta {
            method: method.as_str().to_ascii_lowercase(),
            path: full.clone(),
            operation_id,
            title,
            tag: self.tag.clone(),
            secured,
            body,
            params,
            query,
            response: response_ref,
            errors: STANDARD_ERRORS
                .iter()
                .map(|code| (*code, SchemaRef::new(ERROR_SCHEMA)))
                .collect(),
        };

        self.registry.register_operation(meta);
        debug!(%method, path = %full, secured, "Bound route");
        Ok(self)
    }

    pub fn get(
        &mut self,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::GET, path, schemas, middlewares)
    }

    pub fn post(
        &mut self,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::POST, path, schemas, middlewares)
    }

    pub fn put(
        &mut self,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::PUT, path, schemas, middlewares)
    }

    pub fn patch(
        &mut self,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::PATCH, path, schemas, middlewares)
    }

    pub fn delete(
        &mut self,
        path: &str,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::DELETE, path, schemas, middlewares)
    }

    /// Fix a sub-path for several method registrations.
    pub fn route(&mut self, path: impl Into<String>) -> Scope<'_, 'a> {
        Scope {
            binder: self,
            path: path.into(),
        }
    }
}

/// A [`Binder`] with a fixed sub-path.
///
/// Each call is the same as calling the binder with the fixed path.
pub struct Scope<'b, 'a> {
    binder: &'b mut Binder<'a>,
    path: String,
}

impl Scope<'_, '_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn register(
        &mut self,
        method: Method,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.binder.register(method, &self.path, schemas, middlewares)?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::GET, schemas, middlewares)
    }

    pub fn post(
        &mut self,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::POST, schemas, middlewares)
    }

    pub fn put(
        &mut self,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::PUT, schemas, middlewares)
    }

    pub fn patch(
        &mut self,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::PATCH, schemas, middlewares)
    }

    pub fn delete(
        &mut self,
        schemas: Schemas,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<&mut Self> {
        self.register(Method::DELETE, schemas, middlewares)
    }
}

/// Component name of a route's request body: the title without spaces plus
/// `Input`, or the shape's own name when the handler has no identifier.
/// Component keys may not contain spaces in OpenAPI 3.1.
fn input_name(title: &str, shape: &Shape) -> String {
    let base: String = title.split_whitespace().collect();
    if base.is_empty() {
        format!("{}Input", shape.name())
    } else {
        format!("{base}Input")
    }
}

/// Turn a panic in the terminal handler into an internal error.
fn guard(handler: Middleware) -> Middleware {
    let name = handler.name().to_string();
    let requires_auth = handler.requires_auth();
    let label = name.clone();
    let wrapped = Middleware::from_fn(move |ctx: Context, next: Next| {
        let call = handler.call(ctx, next);
        let label = label.clone();
        async move {
            AssertUnwindSafe(call).catch_unwind().await.unwrap_or_else(|_| {
                error!(handler = %label, "Handler panicked");
                Err(Error::Internal(format!("Handler {label} panicked")))
            })
        }
    })
    .named(name);

    if requires_auth {
        wrapped.requiring_auth()
    } else {
        wrapped
    }
}
