use super::{PackageRecord, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier used when the lookup service returns a hit without an `id`.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// A confirmed association between an installed package and a vulnerability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityMatch {
    pub package_name: String,
    pub package_version: String,
    /// Opaque vulnerability-database reference, e.g. a CVE ID.
    pub identifier: String,
}

impl VulnerabilityMatch {
    pub fn from_hit(package: &PackageRecord, identifier: impl Into<String>) -> Self {
        Self {
            package_name: package.name.clone(),
            package_version: package.version.clone(),
            identifier: identifier.into(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.identifier == UNKNOWN_IDENTIFIER
    }

    /// Link to the NVD detail page for this identifier.
    pub fn reference_url(&self) -> String {
        format!("https://nvd.nist.gov/vuln/detail/{}", self.identifier)
    }

    pub fn matches_package(&self, package: &PackageRecord) -> bool {
        self.package_name == package.name && self.package_version == package.version
    }
}

/// The full outcome of one run, handed to output and notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub platform: Platform,
    pub packages: Vec<PackageRecord>,
    pub vulnerabilities: Vec<VulnerabilityMatch>,
}

impl ScanReport {
    pub fn new(packages: Vec<PackageRecord>, vulnerabilities: Vec<VulnerabilityMatch>) -> Self {
        Self {
            scan_time: Utc::now(),
            platform: Platform::current(),
            packages,
            vulnerabilities,
        }
    }

    pub fn is_vulnerable(&self, package: &PackageRecord) -> bool {
        self.vulnerabilities
            .iter()
            .any(|v| v.matches_package(package))
    }

    /// Number of distinct `(name, version)` pairs with at least one match.
    pub fn vulnerable_package_count(&self) -> usize {
        self.vulnerabilities
            .iter()
            .map(|v| (v.package_name.as_str(), v.package_version.as_str()))
            .collect::<HashSet<_>>()
            .len()
    }

    /// Percentage of scanned packages with at least one match.
    pub fn vulnerability_rate(&self) -> f64 {
        if self.packages.is_empty() {
            return 0.0;
        }
        self.vulnerable_package_count() as f64 / self.packages.len() as f64 * 100.0
    }
}
