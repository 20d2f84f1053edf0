//! OpenAPI 3.1 documentation registry and document generation.
//!
//! The [`Registry`] is built once at startup and filled by every route
//! registration. It is read-only while the server is running.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error;
use crate::operation::{self, SchemaRef};
use crate::schema::Shape;

/// Component name of the standard error body.
pub const ERROR_SCHEMA: &str = "ErrorResponse";

/// Name of the bearer-token security scheme.
pub const BEARER_AUTH: &str = "bearerAuth";

/// Top-level API info for the OpenAPI document.
pub struct Info {
    pub title: &'static str,
    pub version: &'static str,
}

/// Catalog of component schemas and operation descriptors.
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: BTreeMap<String, Value>,
    operations: Vec<operation::Meta>,
}

impl Registry {
    /// Create a registry holding only the standard error schema.
    pub fn new() -> Self {
        let mut registry = Self {
            schemas: BTreeMap::new(),
            operations: Vec::new(),
        };
        registry.register_schema(ERROR_SCHEMA, &Shape::of::<error::Body>());
        registry
    }

    /// Register `shape` as a named component and return a reference to it.
    ///
    /// Registering a different schema under an existing name replaces it;
    /// the last registration wins.
    pub fn register_schema(&mut self, name: &str, shape: &Shape) -> SchemaRef {
        let root = self.inline(shape);
        self.put(name.to_string(), root);
        SchemaRef::new(name)
    }

    /// Hoist the definitions of `shape` into components and return its root
    /// schema for inline use.
    ///
    /// Nested definitions follow the same rule as named components: a later
    /// definition under an existing name replaces the earlier one.
    pub fn inline(&mut self, shape: &Shape) -> Value {
        let (root, defs) = extract_defs(shape.schema().clone());
        for (name, schema) in defs {
            self.put(name, schema);
        }
        root
    }

    fn put(&mut self, name: String, schema: Value) {
        if let Some(existing) = self.schemas.get(&name)
            && *existing != schema
        {
            warn!(schema = %name, "Schema name registered twice, keeping the latest");
        }
        self.schemas.insert(name, schema);
    }

    /// Record an operation descriptor.
    pub fn register_operation(&mut self, meta: operation::Meta) {
        debug!(method = %meta.method, path = %meta.path, title = %meta.title, "Documented operation");
        self.operations.push(meta);
    }

    /// All descriptors in registration order, duplicates included.
    pub fn operations(&self) -> &[operation::Meta] {
        &self.operations
    }

    /// The last descriptor registered for `method` and `path`.
    pub fn operation(&self, method: &str, path: &str) -> Option<&operation::Meta> {
        self.operations
            .iter()
            .rev()
            .find(|op| op.method.eq_ignore_ascii_case(method) && op.path == path)
    }

    /// A registered component schema.
    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    /// Build the OpenAPI document.
    pub fn document(&self, info: &Info) -> Value {
        generate(info, self)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an OpenAPI 3.1 JSON document from a registry.
pub fn generate(info: &Info, registry: &Registry) -> Value {
    let mut paths: Map<String, Value> = Map::new();

    for op in &registry.operations {
        let mut operation_obj: Map<String, Value> = Map::new();

        if !op.operation_id.is_empty() {
            operation_obj.insert("operationId".into(), Value::String(op.operation_id.clone()));
        }

        // Summary and description both carry the title
        operation_obj.insert("summary".into(), Value::String(op.title.clone()));
        operation_obj.insert("description".into(), Value::String(op.title.clone()));

        if !op.tag.is_empty() {
            operation_obj.insert("tags".into(), json!([op.tag]));
        }

        let security = if op.secured {
            json!([{ BEARER_AUTH: ["bearer"] }])
        } else {
            json!([])
        };
        operation_obj.insert("security".into(), security);

        // Parameters
        let mut parameters = Vec::new();
        if let Some(params) = &op.params {
            parameters.extend(parameters_from(params, "path"));
        }
        if let Some(query) = &op.query {
            parameters.extend(parameters_from(query, "query"));
        }
        if !parameters.is_empty() {
            operation_obj.insert("parameters".into(), Value::Array(parameters));
        }

        // Request body
        if let Some(body) = &op.body {
            operation_obj.insert(
                "requestBody".into(),
                json!({
                    "required": true,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": body.pointer() }
                        }
                    }
                }),
            );
        }

        // Responses
        let mut responses: Map<String, Value> = Map::new();
        responses.insert(
            "200".into(),
            json!({
                "description": "Successful response",
                "content": {
                    "application/json": {
                        "schema": { "$ref": op.response.pointer() }
                    }
                }
            }),
        );
        for (status, schema) in &op.errors {
            responses.insert(
                status.to_string(),
                json!({
                    "description": "API Error Response",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": schema.pointer() }
                        }
                    }
                }),
            );
        }
        operation_obj.insert("responses".into(), Value::Object(responses));

        // Later registrations of the same method and path replace earlier ones
        let path_item = paths
            .entry(op.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = path_item {
            map.insert(op.method.clone(), Value::Object(operation_obj));
        }
    }

    let schemas: Map<String, Value> = registry
        .schemas
        .iter()
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect();

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": info.title,
            "version": info.version,
        },
        "paths": paths,
        "components": {
            "schemas": schemas,
            "securitySchemes": {
                BEARER_AUTH: {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            }
        }
    })
}

/// One parameter object per property of an object schema.
fn parameters_from(schema: &Value, location: &str) -> Vec<Value> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    json!({
                        "name": name,
                        "in": location,
                        "required": location == "path" || required.contains(&name.as_str()),
                        "schema": prop,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extract `$defs` from a schemars-generated schema and return
/// (root schema without $defs, Vec of (name, schema) pairs).
fn extract_defs(mut schema: Value) -> (Value, Vec<(String, Value)>) {
    let mut defs = Vec::new();

    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        if let Some(Value::Object(defs_map)) = obj.remove("$defs") {
            for (name, def_schema) in defs_map {
                defs.push((name, rewrite_refs(def_schema)));
            }
        }
    }

    (rewrite_refs(schema), defs)
}

/// Rewrite `$ref` values from schemars' `#/$defs/Foo` format to OpenAPI's
/// `#/components/schemas/Foo` format.
fn rewrite_refs(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let new_map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| {
                    if k == "$ref" {
                        if let Value::String(ref s) = v
                            && let Some(name) = s.strip_prefix("#/$defs/")
                        {
                            return (k, Value::String(format!("#/components/schemas/{name}")));
                        }
                        (k, v)
                    } else {
                        (k, rewrite_refs(v))
                    }
                })
                .collect();
            Value::Object(new_map)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(rewrite_refs).collect()),
        other => other,
    }
}
