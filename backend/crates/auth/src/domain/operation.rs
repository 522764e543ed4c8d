//! Declared Operations
//!
//! The statically declared table of (operation, method, path, surface)
//! tuples that both the gate middleware and the permission reconciler
//! consume. Replaces live router introspection: what is protected is
//! decided by this declaration, not by whatever happens to be routable.
//!
//! Operations flagged `public` (sign-in, sign-up, rotation, step-up
//! verification, inbound webhooks) are explicitly allowlisted; any request
//! whose route is absent from the registry is denied by default.

use std::collections::HashMap;

use derive_more::Display;
use http::Method;
use serde::{Deserialize, Serialize};

/// Client-facing channel with distinct token transport and failure
/// presentation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Surface {
    /// Bearer-token API surface
    #[display("API")]
    Api,
    /// Browser/cookie admin surface
    #[display("ADMIN")]
    Admin,
}

impl Surface {
    /// Storage representation (permissions.surface column)
    pub const fn as_str(&self) -> &'static str {
        match self {
            Surface::Api => "API",
            Surface::Admin => "ADMIN",
        }
    }

    /// Parse the storage representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "API" => Some(Surface::Api),
            "ADMIN" => Some(Surface::Admin),
            _ => None,
        }
    }
}

/// A declared operation on one surface
#[derive(Debug, Clone)]
pub struct Operation {
    /// Operation identifier; maps 1:1 to a permission name
    pub name: String,
    /// HTTP method
    pub method: Method,
    /// Route path as registered with the router (e.g. `/api/users`)
    pub path: String,
    /// Surface this operation belongs to
    pub surface: Surface,
    /// Explicitly allowlisted: no permission record required
    pub public: bool,
}

impl Operation {
    /// Declare a permission-gated operation
    pub fn protected(
        name: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        surface: Surface,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            surface,
            public: false,
        }
    }

    /// Declare a public (allowlisted) operation
    pub fn public(
        name: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        surface: Surface,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            surface,
            public: true,
        }
    }
}

/// Lookup table over the declared operations, keyed by route identity.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: Vec<Operation>,
    by_route: HashMap<(Surface, Method, String), usize>,
}

impl OperationRegistry {
    pub fn new(operations: Vec<Operation>) -> Self {
        let by_route = operations
            .iter()
            .enumerate()
            .map(|(idx, op)| ((op.surface, op.method.clone(), op.path.clone()), idx))
            .collect();

        Self {
            operations,
            by_route,
        }
    }

    /// Find the operation matching a routed request
    pub fn find(&self, surface: Surface, method: &Method, path: &str) -> Option<&Operation> {
        self.by_route
            .get(&(surface, method.clone(), path.to_string()))
            .map(|idx| &self.operations[*idx])
    }

    /// All declared operations
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Permission-gated operations for one surface (reconciler input)
    pub fn protected_for(&self, surface: Surface) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .filter(move |op| op.surface == surface && !op.public)
    }
}
