//! Module trait for pluggable API modules.
//!
//! Modules implement the `Module` trait to bind their routes at startup.
//!
//! # Example
//!
//! ```ignore
//! use taxiway::{Binder, Middleware, Module, Registry, Reply, Result, Router, Schemas};
//!
//! pub struct HealthModule;
//!
//! async fn health(_ctx: taxiway::Context) -> Result<Reply> {
//!     Reply::ok(&taxiway::json!({ "status": "ok" }))
//! }
//!
//! impl Module for HealthModule {
//!     fn name(&self) -> &'static str {
//!         "health"
//!     }
//!
//!     fn routes(&self, router: &mut Router, registry: &mut Registry) -> Result<()> {
//!         Binder::new("/health", router, registry)
//!             .get("/", Schemas::none(), [Middleware::handler(health)])?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::Result;
use crate::openapi::Registry;
use crate::router::Router;

/// A pluggable API module.
///
/// Modules bind their routes and can hold their own state. The state is
/// handed to handlers with [`Middleware::handler_with`](crate::Middleware::handler_with).
pub trait Module: Send + Sync {
    /// Module name for identification and logging.
    fn name(&self) -> &'static str;

    /// Bind routes on the router and document them in the registry.
    ///
    /// # Errors
    /// Returns [`Error::Config`](crate::Error::Config) if a route cannot be bound.
    fn routes(&self, router: &mut Router, registry: &mut Registry) -> Result<()>;
}
