use crate::model::ScanReport;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Reference")]
    reference: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    println!();
    println!(
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.vulnerabilities.is_empty() {
        println!("\x1b[32m[ok]\x1b[0m No vulnerable packages found.");
    } else {
        println!(
            "\x1b[31m[!]\x1b[0m Found {} vulnerabilities:",
            report.vulnerabilities.len()
        );
        println!();
        println!("{}", render_match_table(report));
    }

    println!();
    print_summary(report);

    Ok(())
}

fn render_match_table(report: &ScanReport) -> String {
    let rows: Vec<MatchRow> = report
        .vulnerabilities
        .iter()
        .map(|v| MatchRow {
            package: truncate(&v.package_name, 40),
            version: truncate(&v.package_version, 30),
            cve: v.identifier.clone(),
            reference: if v.is_unknown() {
                "-".to_string()
            } else {
                v.reference_url()
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn print_summary(report: &ScanReport) {
    println!("Summary:");
    println!("  Platform: {}", report.platform.display_name());
    println!("  Packages scanned: {}", report.packages.len());
    println!("  Vulnerabilities: {}", report.vulnerabilities.len());

    if !report.vulnerabilities.is_empty() {
        println!(
            "  Vulnerable packages: {} ({:.1}%)",
            report.vulnerable_package_count(),
            report.vulnerability_rate()
        );

        let unknown = report
            .vulnerabilities
            .iter()
            .filter(|v| v.is_unknown())
            .count();
        if unknown > 0 {
            println!("  Matches without identifier: {}", unknown);
        }
    }
}
