use super::run_command;
use crate::model::{PackageRecord, Platform, Source};
use anyhow::Result;
use async_trait::async_trait;

pub struct WmicScanner;

/// Parses `wmic product get name,version` output.
///
/// The first line is the column header. Product names contain spaces, so
/// each row is split at its last space.
pub fn parse_wmic_output(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let (name, version) = line.trim().rsplit_once(' ')?;
            let name = name.trim();
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(PackageRecord::new(name, version))
        })
        .collect()
}

#[async_trait]
impl super::Scanner for WmicScanner {
    fn name(&self) -> &'static str {
        "Windows Products"
    }

    fn source(&self) -> Source {
        Source::Wmic
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Windows]
    }

    async fn scan(&self) -> Result<Vec<PackageRecord>> {
        let stdout = run_command("wmic", &["product", "get", "name,version"])?;
        Ok(parse_wmic_output(&stdout))
    }
}
