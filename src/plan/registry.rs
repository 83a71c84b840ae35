//! In-process implementations registered against locators.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::IntegrityProbeError;
use crate::integrity::probe::{resolution_cache, CapabilityProbe, Invocable, NativeFn, ParamShape};
use crate::spec::Locator;

static NEXT_REGISTRY: AtomicUsize = AtomicUsize::new(0);

/// Parameter list of a registered function, in call order.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<ParamShape>,
    defaults: Map<String, Value>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// A parameter the caller must supply.
    pub fn required(mut self, name: &str) -> Self {
        self.params.push(ParamShape::positional(name, false));
        self
    }

    /// A parameter with a native default.
    pub fn optional(mut self, name: &str, default: Value) -> Self {
        self.params.push(ParamShape::positional(name, true));
        self.defaults.insert(name.to_string(), default);
        self
    }
}

/// A [`CapabilityProbe`] over closures registered in-process.
///
/// Each registry has its own scope so resolutions from different
/// registries never collide in the shared cache. Dropping a registry
/// evicts its resolutions.
pub struct NativeRegistry {
    scope: String,
    entries: HashMap<Locator, Arc<Invocable>>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRegistry {
    pub fn new() -> Self {
        let n = NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed);
        Self {
            scope: format!("native-registry-{n}"),
            entries: HashMap::new(),
        }
    }

    /// Register `body` under `locator` (`module.path:function`).
    pub fn register<F>(&mut self, locator: &str, signature: Signature, body: F) -> anyhow::Result<()>
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let locator = Locator::parse(locator).map_err(anyhow::Error::msg)?;
        let body: Arc<NativeFn> = Arc::new(body);
        let invocable = Invocable {
            defined_in: locator.module().to_string(),
            locator: locator.clone(),
            source_file: None,
            params: signature.params,
            native_defaults: signature.defaults,
            body: Some(body),
        };
        self.entries.insert(locator, Arc::new(invocable));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for NativeRegistry {
    fn drop(&mut self) {
        resolution_cache().clear_scope(&self.scope);
    }
}

impl CapabilityProbe for NativeRegistry {
    fn scope(&self) -> String {
        self.scope.clone()
    }

    fn resolve(&self, locator: &Locator) -> Result<Option<Arc<Invocable>>, IntegrityProbeError> {
        Ok(self.entries.get(locator).cloned())
    }
}
