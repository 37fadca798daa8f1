//! Installed-package inventory collectors.
//!
//! This module provides the [`Scanner`] trait and implementations that shell
//! out to the platform's package tooling.
//!
//! # Available Scanners
//!
//! | Scanner | Source | Platforms |
//! |---------|--------|-----------|
//! | [`DpkgScanner`] | `dpkg-query` | Linux |
//! | [`PipScanner`] | `pip list` | All |
//! | [`WmicScanner`] | `wmic product` | Windows |
//!
//! # Example
//!
//! ```no_run
//! use patchwatch::scanner::{all_scanners, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     for scanner in all_scanners() {
//!         if scanner.is_supported() {
//!             let packages = scanner.scan().await?;
//!             println!("{}: {} packages", scanner.name(), packages.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod dpkg;
mod pip;
mod wmic;

pub use dpkg::{parse_dpkg_output, DpkgScanner};
pub use pip::{parse_pip_freeze, PipScanner};
pub use wmic::{parse_wmic_output, WmicScanner};

use crate::model::{PackageRecord, Platform, Source};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Command;

/// Trait for enumerating installed packages from one source.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Returns the human-readable name of this scanner.
    fn name(&self) -> &'static str;

    /// Returns the source type this scanner handles.
    fn source(&self) -> Source;

    /// Returns the platforms this scanner supports.
    fn supported_platforms(&self) -> &[Platform];

    /// Returns true if this scanner is supported on the current platform.
    fn is_supported(&self) -> bool {
        let current = Platform::current();
        self.supported_platforms().contains(&current)
    }

    /// Lists installed packages in the order the tool reports them.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying command is missing or fails.
    async fn scan(&self) -> Result<Vec<PackageRecord>>;
}

/// Returns a list of all available scanners.
///
/// # Example
///
/// ```
/// use patchwatch::scanner::all_scanners;
///
/// assert_eq!(all_scanners().len(), 3);
/// ```
pub fn all_scanners() -> Vec<Box<dyn Scanner>> {
    vec![
        Box::new(DpkgScanner),
        Box::new(PipScanner),
        Box::new(WmicScanner),
    ]
}

/// Returns the scanner for a specific source.
///
/// # Example
///
/// ```
/// use patchwatch::{Source, scanner::get_scanner};
///
/// let scanner = get_scanner(Source::Pip);
/// assert_eq!(scanner.name(), "Python Packages");
/// ```
pub fn get_scanner(source: Source) -> Box<dyn Scanner> {
    match source {
        Source::Dpkg => Box::new(DpkgScanner),
        Source::Pip => Box::new(PipScanner),
        Source::Wmic => Box::new(WmicScanner),
    }
}

/// Runs a command and returns its stdout, failing on a non-zero exit.
fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {}. Is it installed?", program))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scanner_matches_source() {
        for source in [Source::Dpkg, Source::Pip, Source::Wmic] {
            assert_eq!(get_scanner(source).source(), source);
        }
    }

    #[test]
    fn test_pip_supported_everywhere() {
        assert!(PipScanner.is_supported());
    }

    #[test]
    fn test_run_command_missing_program() {
        let err = run_command("patchwatch-definitely-not-a-binary", &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}
