use super::run_command;
use crate::model::{PackageRecord, Platform, Source};
use anyhow::Result;
use async_trait::async_trait;

pub struct DpkgScanner;

/// Parses `dpkg-query -W -f='${binary:Package} ${Version}\n'` output.
///
/// Lines are split at the first space; lines without a version are skipped.
pub fn parse_dpkg_output(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once(' ')?;
            let version = version.trim();
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(PackageRecord::new(name, version))
        })
        .collect()
}

#[async_trait]
impl super::Scanner for DpkgScanner {
    fn name(&self) -> &'static str {
        "Debian Packages"
    }

    fn source(&self) -> Source {
        Source::Dpkg
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Linux]
    }

    async fn scan(&self) -> Result<Vec<PackageRecord>> {
        let stdout = run_command("dpkg-query", &["-W", "-f=${binary:Package} ${Version}\n"])?;
        Ok(parse_dpkg_output(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dpkg_output() {
        let output = "\
adduser 3.118ubuntu5
libssl3:amd64 3.0.2-0ubuntu1.12
openssl 3.0.2-0ubuntu1.12
";
        let packages = parse_dpkg_output(output);
        assert_eq!(
            packages,
            vec![
                PackageRecord::new("adduser", "3.118ubuntu5"),
                PackageRecord::new("libssl3:amd64", "3.0.2-0ubuntu1.12"),
                PackageRecord::new("openssl", "3.0.2-0ubuntu1.12"),
            ]
        );
    }

    #[test]
    fn test_parse_dpkg_output_skips_incomplete_lines() {
        let output = "\nbroken-no-version\nbroken-blank \nbash 5.1-6ubuntu1\n";
        assert_eq!(
            parse_dpkg_output(output),
            vec![PackageRecord::new("bash", "5.1-6ubuntu1")]
        );
    }
}
