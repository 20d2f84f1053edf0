//! Response shape enforcement.
//!
//! Every bound route attaches its response shape to the request context
//! before anything else runs, and checks the terminal handler's reply against
//! it on the way out. A successful reply that does not conform is a handler
//! bug: it is logged and the client receives a generic 500.

use std::sync::Arc;

use tracing::error;

use crate::error::{Error, Result};
use crate::middleware::{Middleware, Next, Reply};
use crate::router::Context;
use crate::schema::{Compiled, Location};

/// Step that records the route's response shape on the context.
pub fn attach(shape: Arc<Compiled>) -> Middleware {
    Middleware::from_fn(move |mut ctx: Context, next: Next| {
        ctx.response_schema = Some(Arc::clone(&shape));
        next.run(ctx)
    })
    .named("attach_response_schema")
}

/// Step that checks the reply of the rest of the chain against the attached
/// shape.
pub fn enforce() -> Middleware {
    Middleware::from_fn(|ctx: Context, next: Next| async move {
        let shape = ctx.response_schema.clone();
        let method = ctx.method.clone();
        let path = ctx.uri.path().to_string();
        let reply = next.run(ctx).await?;
        conform(shape.as_deref(), reply).inspect_err(|e| {
            error!(%method, %path, "Handler reply rejected: {e}");
        })
    })
    .named("enforce_response")
}

/// Check a reply against a shape.
///
/// Only successful replies with a body are checked. Without a shape the reply
/// passes unchanged.
///
/// # Errors
/// Returns [`Error::ResponseShape`] listing every mismatch.
pub fn conform(shape: Option<&Compiled>, reply: Reply) -> Result<Reply> {
    let Some(shape) = shape else {
        return Ok(reply);
    };
    if !reply.status().is_success() {
        return Ok(reply);
    }

    let issues = match reply.body() {
        Some(body) => shape.check(Location::Response, body),
        None => Vec::new(),
    };
    if issues.is_empty() {
        Ok(reply)
    } else {
        Err(Error::ResponseShape {
            schema: shape.name().to_string(),
            issues,
        })
    }
}
