//! Spec validation command
//! Usage: specloom validate <spec>

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::spec;

/// Execute the validate command
pub fn execute(spec_path: &Path) -> Result<bool> {
    println!(
        "{} Validating spec {}...",
        "→".cyan().bold(),
        spec_path.display()
    );

    let ir = match spec::load(spec_path) {
        Ok(ir) => ir,
        Err(e) => {
            println!("{} {e}", "✗".red().bold());
            return Ok(false);
        }
    };

    let warnings = spec::warnings(&ir);
    let name = if ir.meta.name.is_empty() {
        "<unnamed>"
    } else {
        ir.meta.name.as_str()
    };
    println!(
        "{} Spec '{}' is valid: {} checks, {} datatypes, {} transforms, {} stages",
        "✓".green().bold(),
        name,
        ir.checks.len(),
        ir.datatypes.len(),
        ir.transforms.len(),
        ir.dag_stages.len()
    );
    if !warnings.is_empty() {
        println!(
            "  {} {} advisory warning(s)",
            "⚠".yellow().bold(),
            warnings.len()
        );
    }
    Ok(true)
}
