//! Core data types for packages, vulnerability matches, and scan reports.
//!
//! This module contains the fundamental types used throughout patchwatch:
//!
//! - [`PackageRecord`] - One installed package, as reported by the inventory
//! - [`Source`] - The inventory collector a package came from
//! - [`Platform`] - Operating system platform
//! - [`VulnerabilityMatch`] - A package confirmed to carry a known vulnerability
//! - [`ScanReport`] - Everything the output and notification layers consume
//!
//! # Example
//!
//! ```
//! use patchwatch::{PackageRecord, ScanReport, VulnerabilityMatch};
//!
//! let openssl = PackageRecord::new("openssl", "1.1.1");
//! let hit = VulnerabilityMatch::from_hit(&openssl, "CVE-2021-0001");
//! let report = ScanReport::new(vec![openssl], vec![hit]);
//!
//! assert_eq!(report.vulnerable_package_count(), 1);
//! ```

mod package;
mod vulnerability;

pub use package::*;
pub use vulnerability::*;
