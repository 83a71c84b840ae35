//! Capability probing: resolving a locator to something invocable.
//!
//! The integrity checker and the planner never inspect implementations
//! directly. They ask a [`CapabilityProbe`] to resolve a [`Locator`] and get
//! back an [`Invocable`] carrying the parameter list, the module that
//! actually defines the symbol, and (for in-process implementations) a body
//! that can be called.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

use crate::error::IntegrityProbeError;
use crate::spec::Locator;

/// How a parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    KeywordOnly,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    VarKwargs,
}

/// One parameter of an implementation's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    pub name: String,
    pub has_default: bool,
    pub kind: ParamKind,
}

impl ParamShape {
    pub fn positional(name: impl Into<String>, has_default: bool) -> Self {
        Self {
            name: name.into(),
            has_default,
            kind: ParamKind::Positional,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, ParamKind::VarArgs | ParamKind::VarKwargs)
    }
}

/// Body of an in-process implementation. Receives every bound argument by
/// name, native defaults already filled in.
pub type NativeFn = dyn Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync;

/// A resolved implementation symbol.
pub struct Invocable {
    pub locator: Locator,
    /// Module that defines the symbol; differs from the locator's module
    /// when it was reached through a re-export.
    pub defined_in: String,
    pub source_file: Option<PathBuf>,
    pub params: Vec<ParamShape>,
    /// Values used for parameters the caller omits.
    pub native_defaults: Map<String, Value>,
    pub body: Option<Arc<NativeFn>>,
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocable")
            .field("locator", &self.locator)
            .field("defined_in", &self.defined_in)
            .field("source_file", &self.source_file)
            .field("params", &self.params)
            .field("native_defaults", &self.native_defaults)
            .field("callable", &self.body.is_some())
            .finish()
    }
}

impl Invocable {
    pub fn param(&self, name: &str) -> Option<&ParamShape> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether a keyword argument called `name` would be accepted.
    pub fn accepts_keyword(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| (p.name == name && !p.is_variadic()) || p.kind == ParamKind::VarKwargs)
    }

    /// Named, non-variadic parameters in declaration order.
    pub fn named_params(&self) -> impl Iterator<Item = &ParamShape> {
        self.params.iter().filter(|p| !p.is_variadic())
    }

    pub fn is_reexport(&self) -> bool {
        self.defined_in != self.locator.module()
    }

    /// Call the body, filling omitted arguments from native defaults.
    pub fn invoke(&self, mut args: Map<String, Value>) -> anyhow::Result<Value> {
        let Some(body) = &self.body else {
            anyhow::bail!("'{}' cannot be invoked in-process", self.locator);
        };
        for param in self.named_params() {
            if args.contains_key(&param.name) {
                continue;
            }
            match self.native_defaults.get(&param.name) {
                Some(default) => {
                    args.insert(param.name.clone(), default.clone());
                }
                None if param.has_default => {}
                None => anyhow::bail!("missing required argument '{}'", param.name),
            }
        }
        body(&args)
    }
}

/// Resolves locators against some implementation tree.
pub trait CapabilityProbe: Send + Sync {
    /// Stable identity of the probed tree; namespaces cached resolutions.
    fn scope(&self) -> String;

    /// `Ok(None)` when nothing is reachable at the locator. Errors are
    /// reserved for trees that cannot be inspected at all.
    fn resolve(&self, locator: &Locator) -> Result<Option<Arc<Invocable>>, IntegrityProbeError>;
}

/// Process-wide memo of resolutions keyed by `<scope>::<locator>`.
///
/// Cleared at the start of every integrity run so edits to the tree between
/// runs are always observed.
#[derive(Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<String, Option<Arc<Invocable>>>>,
}

impl ResolutionCache {
    fn key(probe: &dyn CapabilityProbe, locator: &Locator) -> String {
        format!("{}::{locator}", probe.scope())
    }

    pub fn resolve(
        &self,
        probe: &dyn CapabilityProbe,
        locator: &Locator,
    ) -> Result<Option<Arc<Invocable>>, IntegrityProbeError> {
        let key = Self::key(probe, locator);
        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit.clone());
        }
        // Resolve without holding the lock so parallel probes don't serialize.
        let resolved = probe.resolve(locator)?;
        debug!(%locator, found = resolved.is_some(), "resolved locator");
        self.lock().insert(key, resolved.clone());
        Ok(resolved)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop the resolutions cached for one probe scope.
    pub fn clear_scope(&self, scope: &str) {
        let prefix = format!("{scope}::");
        self.lock().retain(|key, _| !key.starts_with(&prefix));
    }

    /// Number of resolutions cached for `scope`.
    pub fn scope_len(&self, scope: &str) -> usize {
        let prefix = format!("{scope}::");
        self.lock().keys().filter(|key| key.starts_with(&prefix)).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Arc<Invocable>>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

static RESOLUTIONS: OnceLock<ResolutionCache> = OnceLock::new();

/// The shared resolution cache.
pub fn resolution_cache() -> &'static ResolutionCache {
    RESOLUTIONS.get_or_init(ResolutionCache::default)
}

/// Drop every cached resolution.
pub fn clear_resolution_cache() {
    resolution_cache().clear();
}
