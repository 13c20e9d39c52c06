//! Method registration and lookup.
//!
//! A service lists its methods once, with the type description of every
//! parameter and result. The resulting table is immutable and shared by
//! all concurrent calls.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thriftmw_codec::{TypeDesc, Value};

type MethodFn = dyn Fn(Vec<Value>) -> Vec<Value> + Send + Sync;

/// A handler that exposes methods to the processor.
///
/// Each method receives its decoded arguments in declaration order and
/// returns one value per declared result slot. A slot holding
/// [`Value::Error`] is reported to the peer as an internal error; a slot
/// holding a struct whose `error_message` is set is written as a declared
/// exception.
pub trait Service: Send + Sync + 'static {
    fn register(self: Arc<Self>, registry: &mut MethodRegistry);
}

/// One registered method.
pub struct MethodEntry {
    name: String,
    params: Vec<TypeDesc>,
    results: Vec<TypeDesc>,
    func: Box<MethodFn>,
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    pub fn results(&self) -> &[TypeDesc] {
        &self.results
    }

    pub fn call(&self, args: Vec<Value>) -> Vec<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// Collects methods while a service registers itself.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<MethodEntry>>,
}

impl MethodRegistry {
    /// Registers a method. A later registration under the same name
    /// replaces the earlier one.
    pub fn method<F>(
        &mut self,
        name: impl Into<String>,
        params: Vec<TypeDesc>,
        results: Vec<TypeDesc>,
        func: F,
    ) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let entry = MethodEntry {
            name: name.clone(),
            params,
            results,
            func: Box::new(func),
        };
        if self.methods.insert(name.clone(), Arc::new(entry)).is_some() {
            tracing::warn!("Method {} registered twice, keeping the last one", name);
        }
        self
    }
}

/// Read-only name to method table.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    methods: Arc<HashMap<String, Arc<MethodEntry>>>,
}

impl DispatchTable {
    pub fn build<S: Service>(service: Arc<S>) -> Self {
        let mut registry = MethodRegistry::default();
        service.register(&mut registry);
        tracing::debug!("Dispatch table built with {} methods", registry.methods.len());
        Self {
            methods: Arc::new(registry.methods),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MethodEntry>> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Method names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parameter and result descriptions of every method, keyed by name.
    pub fn signatures(&self) -> BTreeMap<&str, (&[TypeDesc], &[TypeDesc])> {
        self.methods
            .iter()
            .map(|(name, entry)| (name.as_str(), (entry.params(), entry.results())))
            .collect()
    }
}
