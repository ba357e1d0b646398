//! Behavior registrar
//!
//! A `BehaviorCatalog` is populated at bootstrap with named factories and
//! their default initializers. Each runtime receives an immutable
//! `BehaviorRegistry` snapshot of the catalog, so late binding by name never
//! touches shared mutable state once ticking starts.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::behavior::{Behavior, Construction};
use super::error::Result;

/// Factory function that builds a behavior from its construction context
pub type BehaviorFactory = Arc<dyn Fn(&Construction) -> Result<Box<dyn Behavior>> + Send + Sync>;

/// Default initializers declared alongside a behavior
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorDefaults {
    /// Construction initializers
    pub inits: Map<String, Value>,
    /// I/O-initializers
    pub ioinits: Map<String, Value>,
    /// Parameters
    pub parms: Map<String, Value>,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl BehaviorDefaults {
    /// Default construction initializers
    pub fn inits(mut self, inits: Value) -> Self {
        self.inits = object(inits);
        self
    }

    /// Default I/O-initializers
    pub fn ioinits(mut self, ioinits: Value) -> Self {
        self.ioinits = object(ioinits);
        self
    }

    /// Default parameters
    pub fn parms(mut self, parms: Value) -> Self {
        self.parms = object(parms);
        self
    }
}

/// Registered behavior: factory plus defaults
#[derive(Clone)]
pub struct BehaviorEntry {
    /// Builds the behavior
    pub factory: BehaviorFactory,
    /// Declared defaults
    pub defaults: BehaviorDefaults,
}

impl fmt::Debug for BehaviorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorEntry")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Mutable catalog of behavior definitions
pub struct BehaviorCatalog {
    types: RwLock<IndexMap<String, BehaviorEntry>>,
}

impl BehaviorCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            types: RwLock::new(IndexMap::new()),
        }
    }

    /// Create a catalog holding the built-in behaviors
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        crate::behaviors::register_builtins(&catalog);
        catalog
    }

    /// Register a behavior with no declared defaults
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&Construction) -> Result<Box<dyn Behavior>> + Send + Sync + 'static,
    {
        self.register_with_defaults(name, BehaviorDefaults::default(), factory);
    }

    /// Register a behavior with declared default initializers and parameters
    pub fn register_with_defaults<F>(&self, name: &str, defaults: BehaviorDefaults, factory: F)
    where
        F: Fn(&Construction) -> Result<Box<dyn Behavior>> + Send + Sync + 'static,
    {
        let mut types = self.types.write();
        types.insert(
            name.to_string(),
            BehaviorEntry {
                factory: Arc::new(factory),
                defaults,
            },
        );
    }

    /// Produce an immutable snapshot for a runtime instance.
    pub fn snapshot(&self) -> BehaviorRegistry {
        let types = self.types.read();
        BehaviorRegistry {
            types: Arc::new(types.clone()),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for BehaviorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable runtime view of the behavior catalog.
#[derive(Clone)]
pub struct BehaviorRegistry {
    types: Arc<IndexMap<String, BehaviorEntry>>,
    fetches: Arc<AtomicU64>,
}

impl BehaviorRegistry {
    /// Look up a behavior by name
    pub fn fetch(&self, name: &str) -> Option<BehaviorEntry> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.types.get(name).cloned()
    }

    /// Number of lookups served so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Check whether the registry snapshot contains the specified name.
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// List all behavior names in registration order.
    pub fn list_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::behavior::Outcome;
    use crate::runtime::{Call, Runtime};
    use serde_json::json;

    struct Nop(String);

    impl Behavior for Nop {
        fn name(&self) -> &str {
            &self.0
        }

        fn act(&self, _runtime: &mut Runtime, _call: &Call<'_>) -> Result<Outcome> {
            Ok(Outcome::Continue)
        }
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_registration() {
        let catalog = BehaviorCatalog::new();
        catalog.register_with_defaults(
            "nop",
            BehaviorDefaults::default().parms(json!({"level": 1})),
            |construction| Ok(Box::new(Nop(construction.name.clone()))),
        );
        let registry = catalog.snapshot();
        catalog.register("late", |construction| Ok(Box::new(Nop(construction.name.clone()))));

        assert!(registry.has_type("nop"));
        assert!(!registry.has_type("late"));
        let entry = registry.fetch("nop").unwrap();
        assert_eq!(entry.defaults.parms["level"], json!(1));
        assert_eq!(registry.fetch_count(), 1);
        assert!(registry.fetch("missing").is_none());
        assert_eq!(registry.fetch_count(), 2);
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = BehaviorCatalog::with_builtins().snapshot();
        for name in ["go", "suspend", "rear", "raze", "print", "mark", "done", "need.always"] {
            assert!(registry.has_type(name), "missing builtin {name}");
        }
    }
}
