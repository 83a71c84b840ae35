//! Implementation integrity command
//! Usage: specloom validate-integrity <spec> [--project-root DIR] [--json]

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::integrity;
use crate::settings::Settings;
use crate::spec;
use crate::validation::validate_meta_name;

/// Execute the validate-integrity command
pub fn execute(spec_path: &Path, project_root: &Path, json: bool, settings: &Settings) -> Result<bool> {
    if !json {
        println!(
            "{} Checking implementations of {} under {}...",
            "→".cyan().bold(),
            spec_path.display(),
            project_root.display()
        );
    }

    // Referential rules are skipped so that broken examples show up in the
    // report instead of aborting the load.
    let ir = match spec::load_unvalidated(spec_path)
        .map_err(|e| e.to_string())
        .and_then(|ir| validate_meta_name(&ir.meta.name).map(|_| ir).map_err(|e| e.to_string()))
    {
        Ok(ir) => ir,
        Err(message) => {
            println!("{} {message}", "✗".red().bold());
            return Ok(false);
        }
    };

    let report = match integrity::check_with(
        &ir,
        project_root,
        &settings.integrity.apps_dir,
        settings.integrity.parallel,
    ) {
        Ok(report) => report,
        Err(e) => {
            println!("{} {e}", "✗".red().bold());
            return Ok(false);
        }
    };

    if json {
        println!("{}", report.to_json());
        return Ok(report.is_clean());
    }

    if report.is_clean() {
        println!(
            "{} Implementation matches spec '{}'",
            "✓".green().bold(),
            ir.app_package()
        );
        return Ok(true);
    }

    print!("{report}");
    println!(
        "{} {} integrity issue(s) found (fingerprint {})",
        "✗".red().bold(),
        report.total(),
        &report.fingerprint()[..12]
    );
    Ok(false)
}
