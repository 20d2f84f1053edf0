//! House rules: the listing rules a host can pick from.
//!
//! [`Store`] keeps the rules in a libsql table; [`HouseRules`] binds the CRUD
//! routes under `/house-rules`.

mod routes;
mod store;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use routes::bind;
pub use store::{SEED_RULES, Store};

use crate::error::Result;
use crate::module::Module;
use crate::openapi::Registry;
use crate::router::Router;

/// A stored house rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HouseRule {
    pub id: i64,
    pub rule: String,
}

/// Payload for creating or updating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HouseRuleInput {
    pub rule: String,
}

/// Route parameters identifying one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HouseRuleId {
    pub id: i64,
}

/// The house-rules API module.
pub struct HouseRules {
    store: Store,
}

impl HouseRules {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Module for HouseRules {
    fn name(&self) -> &'static str {
        "house-rules"
    }

    fn routes(&self, router: &mut Router, registry: &mut Registry) -> Result<()> {
        bind(self.store.clone(), router, registry)
    }
}
