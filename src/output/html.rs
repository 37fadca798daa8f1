//! HTML report output format.
//!
//! Generates a self-contained HTML report with styling for easy viewing and sharing.

use crate::model::ScanReport;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Generate and print HTML report output
pub fn print_html(report: &ScanReport) -> Result<()> {
    println!("{}", generate_html_string(report));
    Ok(())
}

/// Writes the report as `patchwatch_report_<timestamp>.html` under `dir`.
///
/// The directory is created if needed. Reports from the same second get a
/// numeric suffix instead of replacing each other. Returns the path of the
/// new file.
pub fn write_html_report(report: &ScanReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let stamp = report.scan_time.format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("patchwatch_report_{}.html", stamp));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("patchwatch_report_{}_{}.html", stamp, suffix));
        suffix += 1;
    }

    fs::write(&path, generate_html_string(report))
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    Ok(path)
}

/// Generate HTML as a string (for file output)
pub fn generate_html_string(report: &ScanReport) -> String {
    let total = report.packages.len();
    let found = report.vulnerabilities.len();
    let rate = report.vulnerability_rate();

    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>patchwatch Report - {}</title>
    <style>
        :root {{
            --bg-color: #f8f9fa;
            --card-bg: #ffffff;
            --text-color: #333;
            --text-muted: #7f8c8d;
            --header-bg: #2c3e50;
            --critical: #e74c3c;
            --warning: #f39c12;
            --safe: #27ae60;
            --info: #3498db;
        }}
        * {{ box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-color);
            color: var(--text-color);
            line-height: 1.6;
            max-width: 1200px;
            margin: 0 auto;
            padding: 20px;
        }}
        header {{
            background: var(--header-bg);
            color: white;
            padding: 20px;
            border-radius: 5px;
            margin-bottom: 20px;
        }}
        header h1 {{ margin: 0; }}
        .stats {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
            gap: 1rem;
            margin-bottom: 20px;
        }}
        .stat-card, section {{
            background: var(--card-bg);
            border-radius: 5px;
            padding: 20px;
            box-shadow: 0 2px 5px rgba(0,0,0,0.1);
        }}
        section {{ margin-bottom: 20px; }}
        .stat-card {{ text-align: center; }}
        .stat-value {{ font-size: 2.5em; font-weight: bold; }}
        .stat-label {{ color: #555; }}
        .critical {{ color: var(--critical); }}
        .warning {{ color: var(--warning); }}
        .safe {{ color: var(--safe); }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 12px 15px; text-align: left; border-bottom: 1px solid #ddd; }}
        th {{ background: #34495e; color: white; }}
        a {{ color: var(--info); text-decoration: none; }}
        .badge {{ padding: 4px 8px; border-radius: 3px; font-size: 0.8em; font-weight: bold; color: white; }}
        .badge-vulnerable {{ background: var(--critical); }}
        .badge-ok {{ background: var(--info); }}
        .all-clear {{ background: var(--safe); color: white; padding: 15px; border-radius: 5px; text-align: center; font-weight: bold; }}
        footer {{ text-align: center; color: var(--text-muted); font-size: 0.9em; margin-top: 30px; }}
    </style>
</head>
<body>
    <header>
        <h1>patchwatch Report</h1>
        <p>Installed package audit - {}</p>
    </header>
"#,
        report.scan_time.format("%Y-%m-%d"),
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let found_class = if found > 0 { "critical" } else { "safe" };
    let rate_class = if rate > 5.0 {
        "critical"
    } else if rate > 0.0 {
        "warning"
    } else {
        "safe"
    };

    html.push_str(&format!(
        r#"    <div class="stats">
        <div class="stat-card">
            <div class="stat-value">{}</div>
            <div class="stat-label">Packages scanned</div>
        </div>
        <div class="stat-card">
            <div class="stat-value {}">{}</div>
            <div class="stat-label">Vulnerabilities</div>
        </div>
        <div class="stat-card">
            <div class="stat-value {}">{:.1}%</div>
            <div class="stat-label">Vulnerability rate</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{}</div>
            <div class="stat-label">Platform</div>
        </div>
    </div>
"#,
        total,
        found_class,
        found,
        rate_class,
        rate,
        report.platform.display_name()
    ));

    // Vulnerabilities section
    html.push_str(
        r#"    <section>
        <h2>Vulnerabilities</h2>
"#,
    );

    if report.vulnerabilities.is_empty() {
        html.push_str(
            r#"        <div class="all-clear">No known vulnerabilities in installed packages.</div>
"#,
        );
    } else {
        html.push_str(
            r#"        <p>The following packages have known vulnerabilities and should be updated as soon as possible:</p>
        <table>
            <thead>
                <tr>
                    <th>Package</th>
                    <th>Version</th>
                    <th>CVE</th>
                </tr>
            </thead>
            <tbody>
"#,
        );

        for vuln in &report.vulnerabilities {
            let cve = if vuln.is_unknown() {
                html_escape(&vuln.identifier)
            } else {
                format!(
                    r#"<a href="{}" target="_blank">{}</a>"#,
                    html_escape(&vuln.reference_url()),
                    html_escape(&vuln.identifier)
                )
            };

            html.push_str(&format!(
                r#"                <tr>
                    <td><strong>{}</strong></td>
                    <td>{}</td>
                    <td>{}</td>
                </tr>
"#,
                html_escape(&vuln.package_name),
                html_escape(&vuln.package_version),
                cve
            ));
        }

        html.push_str(
            r#"            </tbody>
        </table>
"#,
        );
    }

    html.push_str("    </section>\n");

    // Packages section
    html.push_str(&format!(
        r#"    <section>
        <h2>All Packages ({})</h2>
"#,
        total
    ));

    if report.packages.is_empty() {
        html.push_str("        <p>No packages found.</p>\n");
    } else {
        html.push_str(
            r#"        <table>
            <thead>
                <tr>
                    <th>Package</th>
                    <th>Version</th>
                    <th>Status</th>
                </tr>
            </thead>
            <tbody>
"#,
        );

        for pkg in &report.packages {
            let status = if report.is_vulnerable(pkg) {
                r#"<span class="badge badge-vulnerable">Vulnerable</span>"#
            } else {
                r#"<span class="badge badge-ok">OK</span>"#
            };

            html.push_str(&format!(
                r#"                <tr>
                    <td><strong>{}</strong></td>
                    <td>{}</td>
                    <td>{}</td>
                </tr>
"#,
                html_escape(&pkg.name),
                html_escape(&pkg.version),
                status
            ));
        }

        html.push_str(
            r#"            </tbody>
        </table>
"#,
        );
    }

    html.push_str("    </section>\n");

    html.push_str(
        r#"    <section>
        <h2>Recommendations</h2>
        <ul>
            <li>Keep installed packages up to date.</li>
            <li>Prioritise the packages flagged as vulnerable above.</li>
            <li>Enable automatic security updates where possible.</li>
            <li>Run patchwatch regularly to track the state of this host.</li>
        </ul>
    </section>
    <footer>
        Generated by patchwatch
    </footer>
</body>
</html>
"#,
    );

    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
