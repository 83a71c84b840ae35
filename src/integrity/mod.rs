//! Spec-to-implementation integrity checking.
//!
//! Every declared check, transform and generator is resolved through a
//! [`CapabilityProbe`] and compared against its declaration: existence,
//! defining file, and parameter names, order and defaults. Examples are re-checked against the
//! datatypes that own them. Discrepancies are collected into an
//! [`IntegrityReport`]; only an implementation tree that cannot be read at
//! all produces an error.

pub mod definitions;
pub mod probe;
pub mod report;
pub mod signature;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

use crate::error::IntegrityProbeError;
use crate::spec::locator::expected_file;
use crate::spec::shape::check_value;
use crate::spec::{Locator, SpecIr};

pub use definitions::DefinitionProbe;
pub use probe::{clear_resolution_cache, resolution_cache, CapabilityProbe, Invocable, ParamShape};
pub use report::{Category, IntegrityReport};
pub use signature::{compare_signatures, SignatureDiscrepancy};
pub use source::SourceTreeProbe;

/// Default directory holding application packages under the project root.
pub const DEFAULT_APPS_DIR: &str = "apps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Check,
    Transform,
    Generator,
}

impl EntityKind {
    fn label(self) -> &'static str {
        match self {
            EntityKind::Check => "Check",
            EntityKind::Transform => "Transform",
            EntityKind::Generator => "Generator",
        }
    }

    fn functions(self) -> Category {
        match self {
            EntityKind::Check => Category::CheckFunctions,
            EntityKind::Transform => Category::TransformFunctions,
            EntityKind::Generator => Category::GeneratorFunctions,
        }
    }

    fn locations(self) -> Category {
        match self {
            EntityKind::Check => Category::CheckLocations,
            EntityKind::Transform => Category::TransformLocations,
            EntityKind::Generator => Category::GeneratorLocations,
        }
    }

    fn signatures(self) -> Option<Category> {
        match self {
            EntityKind::Check => None,
            EntityKind::Transform => Some(Category::TransformSignatures),
            EntityKind::Generator => Some(Category::GeneratorSignatures),
        }
    }
}

/// One declared implementation to probe.
struct Job<'a> {
    kind: EntityKind,
    id: &'a str,
    locator: &'a Locator,
    file_path: Option<&'a str>,
    /// Declared parameters in call order.
    declared: Vec<ParamShape>,
}

type Resolution = Result<Option<Arc<Invocable>>, IntegrityProbeError>;

pub struct IntegrityChecker<'a> {
    ir: &'a SpecIr,
    probe: &'a dyn CapabilityProbe,
    definitions: Option<&'a dyn DefinitionProbe>,
    root: PathBuf,
    apps_dir: String,
    parallel: bool,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(ir: &'a SpecIr, probe: &'a dyn CapabilityProbe) -> Self {
        Self {
            ir,
            probe,
            definitions: None,
            root: PathBuf::from("."),
            apps_dir: DEFAULT_APPS_DIR.to_string(),
            parallel: true,
        }
    }

    /// Project root and apps directory used to locate declared `file_path`s.
    pub fn layout(mut self, root: impl Into<PathBuf>, apps_dir: impl Into<String>) -> Self {
        self.root = root.into();
        self.apps_dir = apps_dir.into();
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Also compare datatype definitions in the implementation tree.
    pub fn definitions(mut self, probe: &'a dyn DefinitionProbe) -> Self {
        self.definitions = Some(probe);
        self
    }

    pub fn check(&self) -> Result<IntegrityReport, IntegrityProbeError> {
        clear_resolution_cache();

        let jobs = self.jobs();
        info!(entities = jobs.len(), scope = %self.probe.scope(), "checking implementation integrity");
        let resolutions = if self.parallel && jobs.len() > 1 {
            self.resolve_parallel(&jobs)
        } else {
            jobs.iter().map(|job| self.resolve(job)).collect()
        };

        let mut report = IntegrityReport::new();
        for (job, resolution) in jobs.iter().zip(resolutions) {
            let Some(invocable) = resolution? else {
                report.push(
                    job.kind.functions(),
                    format!(
                        "{} '{}' not found: '{}' is not reachable",
                        job.kind.label(),
                        job.id,
                        job.locator
                    ),
                );
                continue;
            };
            if let Some(message) = self.location_mismatch(job, &invocable) {
                report.push(job.kind.locations(), message);
            }
            if let Some(category) = job.kind.signatures() {
                if let Some(message) = signature_mismatch(job, &invocable) {
                    report.push(category, message);
                }
            }
        }

        self.check_examples(&mut report);
        if let Some(definitions) = self.definitions {
            definitions::check_definitions(self.ir, &self.apps_dir, definitions, &mut report)?;
        }

        debug!(findings = report.total(), fingerprint = %report.fingerprint(), "integrity check finished");
        Ok(report)
    }

    fn jobs(&self) -> Vec<Job<'a>> {
        let ir = self.ir;
        let checks = ir.checks.iter().map(|c| Job {
            kind: EntityKind::Check,
            id: &c.id,
            locator: &c.locator,
            file_path: c.file_path.as_deref(),
            declared: Vec::new(),
        });
        let transforms = ir.transforms.iter().map(|t| Job {
            kind: EntityKind::Transform,
            id: &t.id,
            locator: &t.locator,
            file_path: t.file_path.as_deref(),
            declared: t
                .parameters
                .iter()
                .map(|p| ParamShape::positional(&p.name, p.optional || t.declared_default(&p.name).is_some()))
                .collect(),
        });
        let generators = ir.generators.iter().map(|g| Job {
            kind: EntityKind::Generator,
            id: &g.id,
            locator: &g.locator,
            file_path: g.file_path.as_deref(),
            declared: g
                .parameters
                .iter()
                .map(|p| ParamShape::positional(&p.name, p.optional || p.default.is_some()))
                .collect(),
        });
        checks.chain(transforms).chain(generators).collect()
    }

    fn resolve(&self, job: &Job<'_>) -> Resolution {
        resolution_cache().resolve(self.probe, job.locator)
    }

    /// Resolve in contiguous chunks across threads; results come back in
    /// job order.
    fn resolve_parallel(&self, jobs: &[Job<'_>]) -> Vec<Resolution> {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(jobs.len())
            .max(1);
        let chunk_size = jobs.len().div_ceil(workers);

        thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || chunk.iter().map(|job| self.resolve(job)).collect::<Vec<_>>())
                })
                .collect();
            handles
                .into_iter()
                .zip(jobs.chunks(chunk_size))
                .flat_map(|(handle, chunk)| match handle.join() {
                    Ok(results) => results,
                    Err(_) => chunk
                        .iter()
                        .map(|job| {
                            Err(IntegrityProbeError::Probe {
                                locator: job.locator.to_string(),
                                reason: "probe thread panicked".to_string(),
                            })
                        })
                        .collect(),
                })
                .collect()
        })
    }

    fn location_mismatch(&self, job: &Job<'_>, invocable: &Invocable) -> Option<String> {
        let label = job.kind.label();
        match (job.file_path, &invocable.source_file) {
            (Some(file_path), Some(actual)) => {
                let app = self.ir.app_package();
                let expected = expected_file(&self.root, &self.apps_dir, &app, file_path);
                if same_file(&expected, actual) {
                    return None;
                }
                Some(format!(
                    "{label} '{}' location mismatch:\n    Expected: {}\n    Actual:   {}",
                    job.id,
                    self.display_path(&expected),
                    self.display_path(actual)
                ))
            }
            _ if invocable.is_reexport() => Some(format!(
                "{label} '{}' location mismatch:\n    Expected: {}\n    Actual:   {}",
                job.id,
                job.locator.module(),
                invocable.defined_in
            )),
            _ => None,
        }
    }

    fn check_examples(&self, report: &mut IntegrityReport) {
        for example in &self.ir.examples {
            for owner in self.ir.owners_of_example(example) {
                if let Err(reason) = check_value(self.ir, owner, &example.input) {
                    report.push(
                        Category::ExampleSchemas,
                        format!(
                            "Example '{}' invalid for DataType '{}': {reason}",
                            example.id, owner.id
                        ),
                    );
                }
            }
        }
    }

    /// Paths under the project root are rendered relative to it.
    fn display_path(&self, path: &Path) -> String {
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        path.strip_prefix(&root)
            .unwrap_or(&path)
            .display()
            .to_string()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn signature_mismatch(job: &Job<'_>, invocable: &Invocable) -> Option<String> {
    let discrepancies = compare_signatures(&job.declared, &invocable.params);
    if discrepancies.is_empty() {
        return None;
    }
    let details: Vec<String> = discrepancies.iter().map(ToString::to_string).collect();
    let file = job
        .file_path
        .map(|f| format!(" (file: {f})"))
        .unwrap_or_default();
    Some(format!(
        "{} '{}' signature mismatch{file}:\n    Expected params: {}\n    Actual params:   {}\n    {}",
        job.kind.label(),
        job.id,
        signature::format_names(job.declared.iter().map(|p| p.name.as_str())),
        signature::format_names(invocable.params.iter().map(|p| p.name.as_str())),
        details.join("; ")
    ))
}

/// Check `ir` against the source tree rooted at `root`, including datatype
/// definitions.
pub fn check(ir: &SpecIr, root: &Path) -> Result<IntegrityReport, IntegrityProbeError> {
    check_with(ir, root, DEFAULT_APPS_DIR, true)
}

/// [`check`] with an explicit apps directory and parallelism.
pub fn check_with(
    ir: &SpecIr,
    root: &Path,
    apps_dir: &str,
    parallel: bool,
) -> Result<IntegrityReport, IntegrityProbeError> {
    let probe = SourceTreeProbe::new(root, apps_dir);
    IntegrityChecker::new(ir, &probe)
        .layout(root, apps_dir)
        .parallel(parallel)
        .definitions(&probe)
        .check()
}
