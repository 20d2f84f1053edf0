//! Taxiway - declarative, self-documenting route binding for hyper services.
//!
//! One declaration binds a method and path to a middleware chain, validates
//! requests against typed shapes, checks replies against the declared
//! response shape, and documents the operation in an OpenAPI registry:
//!
//! - **Binder**: Route binding and path scoping
//! - **Schema**: Request/response shapes from `schemars` types
//! - **OpenAPI**: Documentation registry and document generation
//! - **Router**: HTTP routing with path parameters
//! - **Server**: Hyper-based HTTP server
//! - **Config**: Layered configuration (file → env → CLI)
//! - **Auth**: JWT validation and the access-control step
//! - **Module**: Trait for pluggable API modules
//!
//! # Example
//!
//! ```ignore
//! use taxiway::{Binder, Context, Middleware, Registry, Reply, Router, Schemas};
//!
//! #[derive(serde::Deserialize, schemars::JsonSchema)]
//! struct Greeting {
//!     name: String,
//! }
//!
//! async fn greet(ctx: Context) -> taxiway::Result<Reply> {
//!     let greeting: Greeting = ctx.body()?;
//!     Reply::ok(&taxiway::json!({ "message": format!("Hello, {}!", greeting.name) }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> taxiway::Result<()> {
//!     let config = taxiway::Loader::new("MYAPP").load(None, Default::default())?;
//!
//!     let mut router = Router::new();
//!     let mut registry = Registry::new();
//!     Binder::new("/greetings", &mut router, &mut registry)
//!         .post("/", Schemas::new().body::<Greeting>(), [Middleware::handler(greet)])?;
//!     router.openapi("/openapi.json", &registry, taxiway::Info { title: "Greetings", version: "1.0.0" })?;
//!
//!     taxiway::server::run(std::sync::Arc::new(config), router.into_handle()).await
//! }
//! ```

pub mod auth;
pub mod binder;
pub mod config;
pub mod db;
pub mod enforce;
pub mod error;
pub mod house_rule;
pub mod middleware;
pub mod module;
pub mod openapi;
pub mod operation;
pub mod path;
pub mod response;
pub mod router;
pub mod schema;
pub mod server;
pub mod validate;

// Re-export main types at crate root
pub use binder::{Binder, Scope};
pub use config::{Config, Loader, Overrides, SharedConfig};
pub use error::{Error, Result};
pub use middleware::{Middleware, Next, Reply};
pub use module::Module;
pub use openapi::{Info, Registry};
pub use router::{Context, Router};
pub use schema::{Issue, Location, Schemas, Shape};

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;
