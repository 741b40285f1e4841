//! The process-wide operator catalogue.
//!
//! Operators register by name; lookups are concurrent reads, registration
//! is rare and exclusive. Re-registration replaces by name, which tests use
//! to stub operators. Library users can construct their own registry and
//! skip the global one.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::error::{OpError, OpResult};
use crate::operator::Operator;
use crate::operators;

/// A catalogue of operators keyed by name.
#[derive(Default)]
pub struct OperatorRegistry {
    ops: RwLock<HashMap<String, Arc<dyn Operator>>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a registry populated with the built-in operators.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        operators::register_builtins(&registry);
        registry
    }

    /// Register an operator, replacing any existing one with the same name.
    pub fn register(&self, op: Arc<dyn Operator>) {
        let mut ops = self.ops.write().expect("operator registry poisoned");
        ops.insert(op.name().to_string(), op);
    }

    /// Look up an operator by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        let ops = self.ops.read().expect("operator registry poisoned");
        ops.get(name).cloned()
    }

    /// Look up an operator, failing with `unknown operator '<name>'`.
    pub fn require(&self, name: &str) -> OpResult<Arc<dyn Operator>> {
        self.get(name)
            .ok_or_else(|| OpError::UnknownOperator(name.to_string()))
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<String> {
        let ops = self.ops.read().expect("operator registry poisoned");
        let mut names: Vec<String> = ops.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.read().expect("operator registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registered operator. Test isolation only.
    pub fn reset(&self) {
        self.ops.write().expect("operator registry poisoned").clear();
    }
}

static GLOBAL: LazyLock<Arc<OperatorRegistry>> =
    LazyLock::new(|| Arc::new(OperatorRegistry::with_builtins()));

/// The process-wide catalogue, populated with built-ins on first use.
pub fn global() -> Arc<OperatorRegistry> {
    Arc::clone(&GLOBAL)
}
