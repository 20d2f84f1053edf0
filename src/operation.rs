//! OpenAPI operation metadata collected from registered routes.

use serde_json::Value;

/// Status codes every operation documents with the standard error schema.
pub const STANDARD_ERRORS: [u16; 3] = [400, 404, 500];

/// Reference to a component registered in the documentation registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    name: String,
}

impl SchemaRef {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `#/components/schemas/<name>`
    pub fn pointer(&self) -> String {
        format!("#/components/schemas/{}", self.name)
    }
}

/// Metadata for a single API operation, used to generate the OpenAPI document.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    /// Lowercase HTTP method.
    pub method: String,
    /// Absolute path in `{param}` notation.
    pub path: String,
    /// Handler identifier, used as `operationId`.
    pub operation_id: String,
    /// Title derived from the handler identifier.
    pub title: String,
    pub tag: String,
    /// Whether the route runs the access-control middleware.
    pub secured: bool,
    pub body: Option<SchemaRef>,
    /// Params shape, inlined with its definitions hoisted to components.
    pub params: Option<Value>,
    /// Query shape, inlined with its definitions hoisted to components.
    pub query: Option<Value>,
    pub response: SchemaRef,
    /// `(status, schema)` pairs for the standard error responses.
    pub errors: Vec<(u16, SchemaRef)>,
}
