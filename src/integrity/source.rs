//! Probe for Python-style implementation trees on disk.
//!
//! Sources are scanned, never executed: top-level `def`/`async def`
//! signatures, `class` bodies, top-level assignments and `from X import Y`
//! re-exports. Module `a.b.c` lives in `a/b/c.py` or `a/b/c/__init__.py`
//! under the project root or its apps directory.

use regex::Regex;
use serde_json::Map;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, trace};

use super::probe::{CapabilityProbe, Invocable, ParamKind, ParamShape};
use crate::error::IntegrityProbeError;
use crate::spec::locator::module_source_candidates;
use crate::spec::Locator;

/// Re-export chains longer than this are treated as unresolvable.
const MAX_REEXPORT_DEPTH: usize = 16;

/// A member line of a class body: `NAME = value` or `name: annotation [= default]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMember {
    pub name: String,
    pub annotation: Option<String>,
    pub value: Option<String>,
}

/// Scanned contents of one module.
#[derive(Debug, Default)]
pub struct ModuleSource {
    pub module: String,
    pub path: PathBuf,
    pub is_package: bool,
    pub functions: HashMap<String, Vec<ParamShape>>,
    pub classes: HashMap<String, Vec<ClassMember>>,
    /// Top-level `NAME = expr` (and annotated) assignments.
    pub assignments: HashMap<String, String>,
    /// Local name → (source module, source name).
    pub imports: HashMap<String, (String, String)>,
    /// Modules pulled in with `from X import *`.
    pub star_imports: Vec<String>,
}

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(").expect("valid regex")
    })
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^class[ \t]+([A-Za-z_]\w*)[ \t]*(?:\([^)]*\))?[ \t]*:").expect("valid regex")
    })
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+(\([^)]*\)|[^\n#]+)")
            .expect("valid regex")
    })
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([A-Za-z_]\w*)[ \t]*(?::[^=\n]+)?=[ \t]*([^=\n].*)$").expect("valid regex")
    })
}

fn member_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_]\w*)[ \t]*(?::[ \t]*([^=]+?))?[ \t]*(?:=[ \t]*(.+?))?[ \t]*$")
            .expect("valid regex")
    })
}

impl ModuleSource {
    /// Scan module text.
    pub fn parse(module: &str, path: &Path, is_package: bool, text: &str) -> Self {
        let mut source = ModuleSource {
            module: module.to_string(),
            path: path.to_path_buf(),
            is_package,
            ..Default::default()
        };

        for caps in def_re().captures_iter(text) {
            let (Some(name), Some(whole)) = (caps.get(1), caps.get(0)) else {
                continue;
            };
            let params = parse_params(&text[whole.end()..]);
            source.functions.insert(name.as_str().to_string(), params);
        }

        for caps in class_re().captures_iter(text) {
            let (Some(name), Some(whole)) = (caps.get(1), caps.get(0)) else {
                continue;
            };
            let members = parse_class_body(&text[whole.end()..]);
            source.classes.insert(name.as_str().to_string(), members);
        }

        for caps in assign_re().captures_iter(text) {
            if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
                source
                    .assignments
                    .insert(name.as_str().to_string(), value.as_str().trim().to_string());
            }
        }

        for caps in import_re().captures_iter(text) {
            let (Some(from), Some(names)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(from_module) = source.absolute_module(from.as_str()) else {
                continue;
            };
            let names = names.as_str().trim().trim_start_matches('(').trim_end_matches(')');
            for item in names.split(',') {
                let item = item.split('#').next().unwrap_or_default().trim();
                if item.is_empty() {
                    continue;
                }
                if item == "*" {
                    source.star_imports.push(from_module.clone());
                    continue;
                }
                let (original, local) = match item.split_once(" as ") {
                    Some((original, local)) => (original.trim(), local.trim()),
                    None => (item, item),
                };
                source
                    .imports
                    .insert(local.to_string(), (from_module.clone(), original.to_string()));
            }
        }
        source
    }

    /// Turn a possibly relative `from` target into an absolute module path.
    fn absolute_module(&self, target: &str) -> Option<String> {
        let dots = target.chars().take_while(|c| *c == '.').count();
        if dots == 0 {
            return Some(target.to_string());
        }
        let mut base: Vec<&str> = self.module.split('.').collect();
        if !self.is_package {
            base.pop();
        }
        for _ in 1..dots {
            base.pop()?;
        }
        let rest = &target[dots..];
        if !rest.is_empty() {
            base.extend(rest.split('.'));
        }
        Some(base.join("."))
    }
}

/// Parse a parameter list starting just after the opening parenthesis.
pub fn parse_params(text: &str) -> Vec<ParamShape> {
    let mut raw_params = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '#' => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => raw_params.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    raw_params.push(current);

    let mut keyword_only = false;
    let mut params = Vec::new();
    for raw in raw_params {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" {
            continue;
        }
        if raw == "*" {
            keyword_only = true;
            continue;
        }
        let (kind, rest) = if let Some(rest) = raw.strip_prefix("**") {
            (ParamKind::VarKwargs, rest)
        } else if let Some(rest) = raw.strip_prefix('*') {
            keyword_only = true;
            (ParamKind::VarArgs, rest)
        } else if keyword_only {
            (ParamKind::KeywordOnly, raw)
        } else {
            (ParamKind::Positional, raw)
        };
        let name_end = rest.find([':', '=']).unwrap_or(rest.len());
        let name = rest[..name_end].trim();
        if name.is_empty() {
            continue;
        }
        params.push(ParamShape {
            name: name.to_string(),
            has_default: top_level_default(rest),
            kind,
        });
    }
    params
}

/// Whether a single parameter's text has an `=` outside brackets and strings.
fn top_level_default(param: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in param.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, '=') if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Members at the first indentation level of a class body.
fn parse_class_body(text: &str) -> Vec<ClassMember> {
    let mut members = Vec::new();
    let mut body_indent: Option<usize> = None;
    // Skip the remainder of the `class X:` line.
    for line in text.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent == 0 {
            break;
        }
        let indent_level = *body_indent.get_or_insert(indent);
        if indent != indent_level {
            continue;
        }
        let stripped = line.trim();
        if stripped.starts_with(['#', '@', '"', '\''])
            || stripped.starts_with("def ")
            || stripped.starts_with("async ")
            || stripped.starts_with("class ")
            || stripped == "pass"
            || stripped == "..."
        {
            continue;
        }
        if let Some(caps) = member_re().captures(stripped) {
            let Some(name) = caps.get(1) else { continue };
            if name.as_str() == "model_config" || name.as_str().starts_with("__") {
                continue;
            }
            members.push(ClassMember {
                name: name.as_str().to_string(),
                annotation: caps.get(2).map(|m| m.as_str().trim().to_string()),
                value: caps.get(3).map(|m| m.as_str().trim().to_string()),
            });
        }
    }
    members
}

/// Probe over a project directory.
pub struct SourceTreeProbe {
    root: PathBuf,
    apps_dir: String,
    search_roots: Vec<PathBuf>,
    modules: Mutex<HashMap<String, Option<Arc<ModuleSource>>>>,
}

impl SourceTreeProbe {
    /// Modules are looked up under `root` and `root/<apps_dir>`.
    pub fn new(root: impl Into<PathBuf>, apps_dir: &str) -> Self {
        let root = root.into();
        let search_roots = vec![root.clone(), root.join(apps_dir)];
        Self {
            root,
            apps_dir: apps_dir.to_string(),
            search_roots,
            modules: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load and scan a module, memoized for the lifetime of the probe.
    pub fn module(&self, module: &str) -> Result<Option<Arc<ModuleSource>>, IntegrityProbeError> {
        if let Some(hit) = self.lock_modules().get(module) {
            return Ok(hit.clone());
        }
        let loaded = self.load_module(module)?;
        self.lock_modules().insert(module.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn lock_modules(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Arc<ModuleSource>>>> {
        self.modules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_module(&self, module: &str) -> Result<Option<Arc<ModuleSource>>, IntegrityProbeError> {
        for path in module_source_candidates(module, &self.search_roots) {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) if path.is_dir() => {
                    trace!(path = %path.display(), error = %e, "skipping directory candidate");
                    continue;
                }
                Err(source) => return Err(IntegrityProbeError::Unreadable { path, source }),
            };
            let is_package = path.file_name().is_some_and(|n| n == "__init__.py");
            debug!(module, path = %path.display(), "scanned module");
            return Ok(Some(Arc::new(ModuleSource::parse(module, &path, is_package, &text))));
        }
        Ok(None)
    }

    fn find_function(
        &self,
        module: &str,
        name: &str,
        depth: usize,
    ) -> Result<Option<(Arc<ModuleSource>, Vec<ParamShape>)>, IntegrityProbeError> {
        if depth > MAX_REEXPORT_DEPTH {
            return Ok(None);
        }
        let Some(source) = self.module(module)? else {
            return Ok(None);
        };
        if let Some(params) = source.functions.get(name) {
            return Ok(Some((source.clone(), params.clone())));
        }
        if let Some((from, original)) = source.imports.get(name) {
            return self.find_function(from, original, depth + 1);
        }
        for from in &source.star_imports {
            if let Some(found) = self.find_function(from, name, depth + 1)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Class members of `name` defined in (not imported into) `module`.
    pub fn class_members(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<Vec<ClassMember>>, IntegrityProbeError> {
        Ok(self
            .module(module)?
            .and_then(|source| source.classes.get(name).cloned()))
    }

    /// Whether `module` binds `name` at top level by any means.
    pub fn has_binding(&self, module: &str, name: &str) -> Result<bool, IntegrityProbeError> {
        Ok(self.module(module)?.is_some_and(|source| {
            source.assignments.contains_key(name)
                || source.classes.contains_key(name)
                || source.functions.contains_key(name)
                || source.imports.contains_key(name)
        }))
    }
}

impl CapabilityProbe for SourceTreeProbe {
    fn scope(&self) -> String {
        format!("source:{}:{}", self.root.display(), self.apps_dir)
    }

    fn resolve(&self, locator: &Locator) -> Result<Option<Arc<Invocable>>, IntegrityProbeError> {
        let found = self.find_function(locator.module(), locator.function(), 0)?;
        Ok(found.map(|(source, params)| {
            Arc::new(Invocable {
                locator: locator.clone(),
                defined_in: source.module.clone(),
                source_file: Some(source.path.clone()),
                params,
                native_defaults: Map::new(),
                body: None,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(params: &[ParamShape]) -> Vec<(&str, bool)> {
        params.iter().map(|p| (p.name.as_str(), p.has_default)).collect()
    }

    #[test]
    fn test_parse_simple_signature() {
        let params = parse_params("input_data: TextInput, uppercase: bool = False) -> dict:");
        assert_eq!(names(&params), vec![("input_data", false), ("uppercase", true)]);
    }

    #[test]
    fn test_parse_multiline_signature_with_nesting() {
        let text = "\n    data: dict[str, list[int]],  # payload\n    sep: str = \",\",\n    opts: tuple[int, int] = (1, 2),\n    *args,\n    flag=None,\n    **kwargs,\n) -> None:";
        let params = parse_params(text);
        assert_eq!(
            names(&params),
            vec![
                ("data", false),
                ("sep", true),
                ("opts", true),
                ("args", false),
                ("flag", true),
                ("kwargs", false)
            ]
        );
        assert_eq!(params[3].kind, ParamKind::VarArgs);
        assert_eq!(params[4].kind, ParamKind::KeywordOnly);
        assert_eq!(params[5].kind, ParamKind::VarKwargs);
    }

    #[test]
    fn test_module_scan() {
        let text = r#"from .processors import process_text
from apps.demo.transforms.other import (
    helper as aliased,
    extra,
)
from .more import *

Threshold = int

class Color(Enum):
    RED = "red"
    GREEN = "green"

    def describe(self):
        return self.value

class Point(BaseModel):
    x: float
    label: str | None = None

def top_level(a, b=1):
    def nested(c):
        pass
    return a
"#;
        let source = ModuleSource::parse(
            "apps.demo.transforms",
            Path::new("apps/demo/transforms/__init__.py"),
            true,
            text,
        );
        assert!(source.functions.contains_key("top_level"));
        assert!(!source.functions.contains_key("nested"));
        assert_eq!(
            source.imports.get("process_text"),
            Some(&(
                "apps.demo.transforms.processors".to_string(),
                "process_text".to_string()
            ))
        );
        assert_eq!(
            source.imports.get("aliased"),
            Some(&(
                "apps.demo.transforms.other".to_string(),
                "helper".to_string()
            ))
        );
        assert!(source.imports.contains_key("extra"));
        assert_eq!(source.star_imports, vec!["apps.demo.transforms.more".to_string()]);
        assert_eq!(source.assignments.get("Threshold").map(String::as_str), Some("int"));

        let color: Vec<&str> = source.classes["Color"].iter().map(|m| m.name.as_str()).collect();
        assert_eq!(color, vec!["RED", "GREEN"]);
        let point = &source.classes["Point"];
        assert_eq!(point[0].annotation.as_deref(), Some("float"));
        assert_eq!(point[1].value.as_deref(), Some("None"));
    }

    #[test]
    fn test_relative_import_from_plain_module() {
        let source = ModuleSource::parse(
            "apps.demo.transforms.processors",
            Path::new("x.py"),
            false,
            "from ..checks.validators import check_len\n",
        );
        assert_eq!(
            source.imports.get("check_len").map(|(m, _)| m.as_str()),
            Some("apps.demo.checks.validators")
        );
    }

    #[test]
    fn test_probe_follows_reexport() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("apps/demo/transforms");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("__init__.py"), "from .impl import run\n").unwrap();
        fs::write(pkg.join("impl.py"), "def run(data, n=2):\n    return data\n").unwrap();

        let probe = SourceTreeProbe::new(tmp.path(), "apps");
        let loc = Locator::parse("apps.demo.transforms:run").unwrap();
        let inv = probe.resolve(&loc).unwrap().unwrap();
        assert_eq!(inv.defined_in, "apps.demo.transforms.impl");
        assert!(inv.is_reexport());
        assert_eq!(inv.params.len(), 2);

        let missing = Locator::parse("apps.demo.transforms:absent").unwrap();
        assert!(probe.resolve(&missing).unwrap().is_none());
        let no_module = Locator::parse("apps.demo.nowhere:run").unwrap();
        assert!(probe.resolve(&no_module).unwrap().is_none());
    }

    #[test]
    fn test_probe_searches_apps_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("apps/demo/checks");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("validators.py"), "def check_len(payload):\n    return True\n").unwrap();

        let probe = SourceTreeProbe::new(tmp.path(), "apps");
        let loc = Locator::parse("demo.checks.validators:check_len").unwrap();
        assert!(probe.resolve(&loc).unwrap().is_some());
    }

    #[test]
    fn test_scope_includes_apps_dir() {
        let tmp = TempDir::new().unwrap();
        let apps = SourceTreeProbe::new(tmp.path(), "apps");
        let packages = SourceTreeProbe::new(tmp.path(), "packages");
        assert_ne!(apps.scope(), packages.scope());
        assert!(packages.scope().ends_with(":packages"));
    }
}
