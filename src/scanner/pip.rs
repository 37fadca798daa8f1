use super::run_command;
use crate::model::{PackageRecord, Platform, Source};
use anyhow::Result;
use async_trait::async_trait;

pub struct PipScanner;

/// Parses `pip list --format=freeze` output (`name==version` per line).
///
/// Editable installs and other lines without `==` are ignored.
pub fn parse_pip_freeze(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once("==")?;
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(PackageRecord::new(name, version))
        })
        .collect()
}

#[async_trait]
impl super::Scanner for PipScanner {
    fn name(&self) -> &'static str {
        "Python Packages"
    }

    fn source(&self) -> Source {
        Source::Pip
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Linux, Platform::MacOS, Platform::Windows]
    }

    async fn scan(&self) -> Result<Vec<PackageRecord>> {
        let python = if cfg!(target_os = "windows") { "python" } else { "python3" };
        let stdout = run_command(python, &["-m", "pip", "list", "--format=freeze"])?;
        Ok(parse_pip_freeze(&stdout))
    }
}
