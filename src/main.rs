use anyhow::Result;
use clap::{Parser, Subcommand};
use specloom::commands::{integrity, plan, validate, version};
use specloom::logging;
use specloom::settings::{Settings, SETTINGS_FILE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "specloom")]
#[command(about = "Spec-driven pipeline validation, integrity checking and planning", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr (overridden by SPECLOOM_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ./specloom.toml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a spec document (YAML or JSON)
    Validate {
        /// Path to the spec file
        spec: PathBuf,
    },

    /// Check that the implementation tree matches a spec
    ValidateIntegrity {
        /// Path to the spec file
        spec: PathBuf,

        /// Project root containing the apps directory
        #[arg(long, default_value = ".")]
        project_root: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a config against its base spec and print the execution plan
    Plan {
        /// Path to the config file
        config: PathBuf,

        /// Also resolve every planned transform and check its arguments
        #[arg(long)]
        check_implementations: bool,

        /// Project root containing the apps directory
        #[arg(long, default_value = ".")]
        project_root: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::load(&PathBuf::from(SETTINGS_FILE))?,
    };
    logging::init(cli.verbose, &settings.logging.level);

    let ok = match cli.command {
        Commands::Validate { spec } => validate::execute(&spec)?,
        Commands::ValidateIntegrity {
            spec,
            project_root,
            json,
        } => integrity::execute(&spec, &project_root, json, &settings)?,
        Commands::Plan {
            config,
            check_implementations,
            project_root,
        } => plan::execute(&config, check_implementations, &project_root, &settings)?,
        Commands::Version => version::execute()?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
