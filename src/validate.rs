//! Request validation gate.
//!
//! The gate checks the body, route parameters and query string against a
//! route's declared shapes before any caller step runs. Body is checked
//! first, then params, then query; the first part that fails stops the
//! request with [`Error::Validation`] and the handler is never reached.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::middleware::{Middleware, Next, Reply};
use crate::router::Context;
use crate::schema::{Compiled, Issue, Location, RequestSchemas};

struct Gate {
    body: Option<Compiled>,
    params: Option<Compiled>,
    query: Option<Compiled>,
}

/// Build the validation step for a route.
///
/// Without any request shapes the step passes every request through.
///
/// # Errors
/// Returns [`Error::Config`] if a declared shape does not compile.
pub fn gate(schemas: Option<&RequestSchemas>) -> Result<Middleware> {
    let Some(schemas) = schemas.filter(|s| !s.is_empty()) else {
        return Ok(Middleware::from_fn(passthrough).named("validate_request"));
    };

    let gate = Arc::new(Gate {
        body: schemas.body.as_ref().map(|s| s.compile()).transpose()?,
        params: schemas.params.as_ref().map(|s| s.compile()).transpose()?,
        query: schemas.query.as_ref().map(|s| s.compile()).transpose()?,
    });

    Ok(Middleware::from_fn(move |ctx: Context, next: Next| {
        let gate = Arc::clone(&gate);
        async move { gate.check(ctx, next).await }
    })
    .named("validate_request"))
}

async fn passthrough(ctx: Context, next: Next) -> Result<Reply> {
    next.run(ctx).await
}

impl Gate {
    async fn check(&self, mut ctx: Context, next: Next) -> Result<Reply> {
        if let Some(body) = &self.body {
            // An empty body validates as an empty object.
            let value = if ctx.body.is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_slice(&ctx.body)
                    .map_err(|e| Error::BadRequest(format!("Invalid request body: {e}")))?
            };
            reject(&ctx, body.check(Location::Body, &value))?;
            ctx.validated.body = Some(value);
        }

        if let Some(params) = &self.params {
            let value = params.coerce(&ctx.params);
            reject(&ctx, params.check(Location::Params, &value))?;
            ctx.validated.params = Some(value);
        }

        if let Some(query) = &self.query {
            let value = query.coerce(&ctx.query_pairs());
            reject(&ctx, query.check(Location::Query, &value))?;
            ctx.validated.query = Some(value);
        }

        next.run(ctx).await
    }
}

fn reject(ctx: &Context, issues: Vec<Issue>) -> Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    debug!(
        method = %ctx.method,
        path = %ctx.uri.path(),
        issues = issues.len(),
        "Request rejected by validation"
    );
    Err(Error::Validation(issues))
}
