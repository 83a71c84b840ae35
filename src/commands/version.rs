//! Version command

use anyhow::Result;

/// Print the package version
pub fn execute() -> Result<bool> {
    println!("specloom {}", env!("CARGO_PKG_VERSION"));
    Ok(true)
}
