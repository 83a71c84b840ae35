//! Config validation command
//! Usage: specloom plan <config> [--check-implementations] [--project-root DIR]

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

use crate::integrity::{CapabilityProbe, SourceTreeProbe};
use crate::plan::ConfigPlanner;
use crate::settings::Settings;

/// Execute the plan command
pub fn execute(
    config_path: &Path,
    check_implementations: bool,
    project_root: &Path,
    settings: &Settings,
) -> Result<bool> {
    println!(
        "{} Validating config {}...",
        "→".cyan().bold(),
        config_path.display()
    );

    let planner = match ConfigPlanner::from_path(config_path) {
        Ok(planner) => planner,
        Err(e) => {
            println!("{} {e}", "✗".red().bold());
            return Ok(false);
        }
    };

    let probe = check_implementations
        .then(|| SourceTreeProbe::new(project_root, &settings.integrity.apps_dir));
    let validation = match planner.validate(probe.as_ref().map(|p| p as &dyn CapabilityProbe)) {
        Ok(validation) => validation,
        Err(e) => {
            println!("{} {e}", "✗".red().bold());
            return Ok(false);
        }
    };

    println!("{}", "Execution plan:".bold());
    for (i, step) in validation.execution_plan.iter().enumerate() {
        let params = if step.params.is_empty() {
            String::new()
        } else {
            format!(" {}", Value::Object(step.params.clone()))
        };
        println!(
            "  {}. {} [{}] {} {}{}",
            i + 1,
            step.stage_id,
            step.mode,
            "→".dimmed(),
            step.transform_id.bold(),
            params.dimmed()
        );
    }

    let name = &planner.config().meta.config_name;
    println!(
        "{} Config '{}' is valid ({} steps)",
        "✓".green().bold(),
        if name.is_empty() { "<unnamed>" } else { name.as_str() },
        validation.execution_plan.len()
    );
    Ok(true)
}
