//! `module.path:function` locators and their mapping onto the implementation tree

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::validation::is_identifier;

/// Qualified name of an implementation symbol: dotted module path plus function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    module: String,
    function: String,
}

impl Locator {
    /// Parse `module.path:function`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let Some((module, function)) = raw.split_once(':') else {
            return Err(format!("'{raw}' is not in 'module:function' form"));
        };
        if module.is_empty() || module.split('.').any(str::is_empty) {
            return Err(format!("'{raw}' has an empty module path"));
        }
        if !is_identifier(function) {
            return Err(format!("'{raw}' names an invalid function '{function}'"));
        }
        Ok(Self {
            module: module.to_string(),
            function: function.to_string(),
        })
    }

    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Expand the `apps.<rest>` shorthand into `apps.<app>.<rest>`.
    ///
    /// When a `file_path` is declared it wins over the shorthand module, so
    /// `apps.checks:f` with `checks/validators.py` becomes
    /// `apps.<app>.checks.validators:f`. Locators outside `apps.` and ones
    /// already qualified with the app are returned unchanged.
    pub fn qualify(&self, app: &str, file_path: Option<&str>) -> Locator {
        if app.is_empty() {
            return self.clone();
        }
        let Some(rest) = self.module.strip_prefix("apps.") else {
            return self.clone();
        };
        if rest == app || rest.starts_with(&format!("{app}.")) {
            return self.clone();
        }
        let tail = file_path
            .and_then(|p| module_from_file_path(p, app))
            .unwrap_or_else(|| rest.to_string());
        Locator::new(format!("apps.{app}.{tail}"), self.function.clone())
    }

    /// Candidate source files for the module under each search root, in
    /// lookup order: `a/b/c.py` before the package form `a/b/c/__init__.py`.
    pub fn source_candidates(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        module_source_candidates(&self.module, roots)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.function)
    }
}

impl TryFrom<String> for Locator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Locator::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(value: Locator) -> Self {
        value.to_string()
    }
}

/// Source files that could define `module`, see [`Locator::source_candidates`].
pub fn module_source_candidates(module: &str, roots: &[PathBuf]) -> Vec<PathBuf> {
    let rel: PathBuf = module.split('.').collect();
    roots
        .iter()
        .flat_map(|root| {
            let base = root.join(&rel);
            [base.with_extension("py"), base.join("__init__.py")]
        })
        .collect()
}

/// Strip a leading `apps/` and `<app>/` from a declared file path.
pub fn app_relative_path<'a>(file_path: &'a str, app: &str) -> &'a str {
    let trimmed = file_path.trim_start_matches("./");
    let trimmed = trimmed.strip_prefix("apps/").unwrap_or(trimmed);
    if app.is_empty() {
        return trimmed;
    }
    trimmed
        .strip_prefix(app)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(trimmed)
}

/// File the implementation is declared to live in: `<root>/<apps_dir>/<app>/<file_path>`.
pub fn expected_file(root: &Path, apps_dir: &str, app: &str, file_path: &str) -> PathBuf {
    root.join(apps_dir)
        .join(app)
        .join(app_relative_path(file_path, app))
}

/// Dotted package path of the apps directory: `src/apps` becomes `src.apps`.
pub fn apps_package(apps_dir: &str) -> String {
    apps_dir
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join(".")
}

/// Dotted module path (relative to the app package) for a declared file path.
fn module_from_file_path(file_path: &str, app: &str) -> Option<String> {
    let rel = app_relative_path(file_path, app);
    let rel = rel.strip_suffix(".py").unwrap_or(rel);
    let rel = rel.strip_suffix("/__init__").unwrap_or(rel);
    if rel.is_empty() {
        return None;
    }
    Some(rel.replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locator() {
        let loc = Locator::parse("apps.demo.checks.validators:check_len").unwrap();
        assert_eq!(loc.module(), "apps.demo.checks.validators");
        assert_eq!(loc.function(), "check_len");
        assert_eq!(loc.to_string(), "apps.demo.checks.validators:check_len");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Locator::parse("no_colon").is_err());
        assert!(Locator::parse(":func").is_err());
        assert!(Locator::parse("mod..x:func").is_err());
        assert!(Locator::parse("mod:").is_err());
        assert!(Locator::parse("mod:bad-name").is_err());
    }

    #[test]
    fn test_qualify_shorthand() {
        let loc = Locator::parse("apps.checks.validators:check_len").unwrap();
        assert_eq!(
            loc.qualify("demo", None).to_string(),
            "apps.demo.checks.validators:check_len"
        );
    }

    #[test]
    fn test_qualify_prefers_file_path() {
        let loc = Locator::parse("apps.checks:check_len").unwrap();
        assert_eq!(
            loc.qualify("demo", Some("checks/validators.py")).to_string(),
            "apps.demo.checks.validators:check_len"
        );
    }

    #[test]
    fn test_qualify_leaves_other_locators() {
        let qualified = Locator::parse("apps.demo.checks.v:f").unwrap();
        assert_eq!(qualified.qualify("demo", None), qualified);
        let plain = Locator::parse("demo.checks.v:f").unwrap();
        assert_eq!(plain.qualify("demo", None), plain);
    }

    #[test]
    fn test_source_candidates_order() {
        let loc = Locator::parse("pkg.mod:f").unwrap();
        let roots = vec![PathBuf::from("/r")];
        assert_eq!(
            loc.source_candidates(&roots),
            vec![
                PathBuf::from("/r/pkg/mod.py"),
                PathBuf::from("/r/pkg/mod/__init__.py")
            ]
        );
    }

    #[test]
    fn test_expected_file_strips_prefixes() {
        let root = Path::new("/p");
        assert_eq!(
            expected_file(root, "apps", "demo", "checks/v.py"),
            PathBuf::from("/p/apps/demo/checks/v.py")
        );
        assert_eq!(
            expected_file(root, "apps", "demo", "apps/demo/checks/v.py"),
            PathBuf::from("/p/apps/demo/checks/v.py")
        );
    }

    #[test]
    fn test_apps_package() {
        assert_eq!(apps_package("apps"), "apps");
        assert_eq!(apps_package("./src/apps/"), "src.apps");
        assert_eq!(apps_package(""), "");
    }
}
