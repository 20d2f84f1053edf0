//! Declared request and response shapes.
//!
//! A [`Shape`] is a named JSON Schema, usually generated from a Rust type with
//! [`Shape::of`]. Shapes are compiled into validators once, when a route is
//! registered; a schema that does not compile is a configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/// A named JSON Schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    name: String,
    schema: Value,
}

impl Shape {
    /// Shape generated from a Rust type.
    pub fn of<T: JsonSchema>() -> Self {
        Self {
            name: T::schema_name().into_owned(),
            schema: schemars::schema_for!(T).to_value(),
        }
    }

    /// Shape from a hand-written JSON Schema.
    pub fn named(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// The generic success shape used when a route declares no response.
    /// Accepts any payload.
    pub fn success() -> Self {
        Self::named(
            "SuccessResponse",
            json!({ "description": "Successful response" }),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Compile the schema into a validator.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the schema is not a valid JSON Schema or
    /// references definitions that do not exist.
    pub fn compile(&self) -> Result<Compiled> {
        let validator = jsonschema::validator_for(&self.schema)
            .map_err(|e| Error::Config(format!("Invalid schema {}: {e}", self.name)))?;
        Ok(Compiled {
            shape: self.clone(),
            validator: Arc::new(validator),
        })
    }
}

/// Optional body, params and query shapes of a route.
///
/// An absent shape means that part of the request is not validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSchemas {
    pub body: Option<Shape>,
    pub params: Option<Shape>,
    pub query: Option<Shape>,
}

impl RequestSchemas {
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.params.is_none() && self.query.is_none()
    }
}

/// Request and response shapes declared for one route.
///
/// ```ignore
/// Schemas::new()
///     .body::<HouseRuleInput>()
///     .params::<HouseRuleId>()
///     .response::<HouseRule>()
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schemas {
    pub request: Option<RequestSchemas>,
    pub response: Option<Shape>,
}

impl Schemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// No request shapes and the default response shape.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn body<T: JsonSchema>(self) -> Self {
        self.with_body(Shape::of::<T>())
    }

    pub fn params<T: JsonSchema>(self) -> Self {
        self.with_params(Shape::of::<T>())
    }

    pub fn query<T: JsonSchema>(self) -> Self {
        self.with_query(Shape::of::<T>())
    }

    pub fn response<T: JsonSchema>(self) -> Self {
        self.with_response(Shape::of::<T>())
    }

    pub fn with_body(mut self, shape: Shape) -> Self {
        self.request.get_or_insert_with(Default::default).body = Some(shape);
        self
    }

    pub fn with_params(mut self, shape: Shape) -> Self {
        self.request.get_or_insert_with(Default::default).params = Some(shape);
        self
    }

    pub fn with_query(mut self, shape: Shape) -> Self {
        self.request.get_or_insert_with(Default::default).query = Some(shape);
        self
    }

    pub fn with_response(mut self, shape: Shape) -> Self {
        self.response = Some(shape);
        self
    }
}

/// Which part of the exchange an [`Issue`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Body,
    Params,
    Query,
    Response,
}

/// One field-level schema mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    pub location: Location,
    /// Dotted field path (`address.city`, `items.0`); empty for the root.
    pub path: String,
    pub message: String,
}

/// A shape with its compiled validator.
#[derive(Clone)]
pub struct Compiled {
    shape: Shape,
    validator: Arc<Validator>,
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled")
            .field("shape", &self.shape.name)
            .finish_non_exhaustive()
    }
}

impl Compiled {
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    /// Every mismatch between `value` and the shape.
    pub fn check(&self, location: Location, value: &Value) -> Vec<Issue> {
        self.validator
            .iter_errors(value)
            .map(|err| {
                let mut path = pointer_to_path(&err.instance_path.to_string());
                if let ValidationErrorKind::Required { property } = &err.kind
                    && let Some(field) = property.as_str()
                {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(field);
                }
                Issue {
                    location,
                    path,
                    message: err.to_string(),
                }
            })
            .collect()
    }

    /// Build an object from string-valued params or query pairs, converting
    /// each value to the primitive type its property declares.
    pub fn coerce(&self, raw: &HashMap<String, String>) -> Value {
        let properties = self.shape.schema.get("properties").and_then(Value::as_object);
        let object: Map<String, Value> = raw
            .iter()
            .map(|(key, value)| {
                let declared = properties
                    .and_then(|props| props.get(key))
                    .and_then(primitive_type);
                (key.clone(), coerce_value(value, declared))
            })
            .collect();
        Value::Object(object)
    }
}

fn primitive_type(property: &Value) -> Option<&str> {
    match property.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    }
}

fn coerce_value(raw: &str, declared: Option<&str>) -> Value {
    let coerced = match declared {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some("boolean") => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// `/address/city` -> `address.city`, unescaping `~1` and `~0`.
fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
