//! Operating system update discovery and installation.
//!
//! Linux hosts are queried through apt, Windows hosts through the Windows
//! Update COM API driven by PowerShell.

use crate::model::Platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::debug;

const WINDOWS_SEARCH_SCRIPT: &str = r#"
$session = New-Object -ComObject Microsoft.Update.Session
$result = $session.CreateUpdateSearcher().Search("IsInstalled=0")
$updates = @()
foreach ($update in $result.Updates) {
    $updates += @{ "title" = $update.Title; "critical" = ($update.MsrcSeverity -eq "Critical") }
}
ConvertTo-Json -Depth 3 -InputObject @{ "count" = $result.Updates.Count; "updates" = $updates }
"#;

const WINDOWS_INSTALL_SCRIPT: &str = r#"
$session = New-Object -ComObject Microsoft.Update.Session
$result = $session.CreateUpdateSearcher().Search("IsInstalled=0")
if ($result.Updates.Count -eq 0) { Write-Output "No updates available."; exit 0 }
$toInstall = New-Object -ComObject Microsoft.Update.UpdateColl
foreach ($update in $result.Updates) {
    if ($update.IsDownloaded -and ($scope -ne "critical" -or $update.MsrcSeverity -eq "Critical")) {
        $toInstall.Add($update) | Out-Null
    }
}
if ($toInstall.Count -eq 0) { Write-Output "No updates to install."; exit 0 }
$installer = $session.CreateUpdateInstaller()
$installer.Updates = $toInstall
$outcome = $installer.Install()
Write-Output "ResultCode: $($outcome.ResultCode)"
Write-Output "RebootRequired: $($outcome.RebootRequired)"
"#;

/// Prepends the `$scope` assignment the install script filters on.
///
/// `-Command` does not populate `$args`, so the scope has to live in the
/// script text itself.
fn windows_install_script(critical_only: bool) -> String {
    let scope = if critical_only { "critical" } else { "all" };
    format!("$scope = '{}'\n{}", scope, WINDOWS_INSTALL_SCRIPT)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub package: String,
    pub critical: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub available: bool,
    pub critical: bool,
    pub updates: Vec<PendingUpdate>,
    pub command_output: String,
}

impl UpdateStatus {
    fn from_updates(updates: Vec<PendingUpdate>, command_output: String) -> Self {
        Self {
            available: !updates.is_empty(),
            critical: updates.iter().any(|u| u.critical),
            updates,
            command_output,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
    pub command_output: String,
}

/// Parses `apt list --upgradable`.
///
/// Entries look like `openssl/jammy-security 3.0.2-0ubuntu1.13 amd64
/// [upgradable from: 3.0.2-0ubuntu1.12]`.
pub fn parse_apt_upgradable(output: &str) -> Vec<PendingUpdate> {
    output
        .lines()
        .filter(|line| line.contains("upgradable"))
        .filter_map(|line| {
            let package = line.split('/').next()?.trim();
            if package.is_empty() || package.contains(' ') {
                return None;
            }
            Some(PendingUpdate {
                package: package.to_string(),
                critical: line.to_lowercase().contains("security"),
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct WindowsSearchResult {
    count: u32,
    #[serde(default)]
    updates: WindowsUpdates,
}

/// `ConvertTo-Json` collapses single-element arrays into an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum WindowsUpdates {
    Many(Vec<WindowsUpdate>),
    One(WindowsUpdate),
}

impl Default for WindowsUpdates {
    fn default() -> Self {
        WindowsUpdates::Many(Vec::new())
    }
}

#[derive(Deserialize)]
struct WindowsUpdate {
    title: String,
    #[serde(default)]
    critical: bool,
}

/// Parses the JSON emitted by the Windows Update search script.
pub fn parse_windows_updates(output: &str) -> Result<Vec<PendingUpdate>> {
    let result: WindowsSearchResult =
        serde_json::from_str(output.trim()).context("Failed to parse Windows Update output")?;

    if result.count == 0 {
        return Ok(Vec::new());
    }

    let updates = match result.updates {
        WindowsUpdates::Many(list) => list,
        WindowsUpdates::One(single) => vec![single],
    };

    Ok(updates
        .into_iter()
        .map(|u| PendingUpdate {
            package: u.title,
            critical: u.critical,
        })
        .collect())
}

fn run(program: &str, args: &[&str]) -> Result<(bool, String)> {
    debug!(program, ?args, "Running update command");
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {}", program))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() && !stderr.trim().is_empty() {
        text.push_str(&stderr);
    }
    Ok((output.status.success(), text))
}

/// Lists pending OS updates.
pub fn check_os_updates(platform: Platform) -> Result<UpdateStatus> {
    match platform {
        Platform::Linux => {
            let (_, output) = run("apt", &["list", "--upgradable"])?;
            let updates = parse_apt_upgradable(&output);
            Ok(UpdateStatus::from_updates(updates, output))
        }
        Platform::Windows => {
            let (ok, output) = run("powershell", &["-NoProfile", "-Command", WINDOWS_SEARCH_SCRIPT])?;
            if !ok {
                return Ok(UpdateStatus {
                    command_output: format!(
                        "Could not query Windows Update, check manually.\n{}",
                        output
                    ),
                    ..UpdateStatus::default()
                });
            }
            let updates = parse_windows_updates(&output)?;
            Ok(UpdateStatus::from_updates(updates, output))
        }
        Platform::MacOS => Ok(UpdateStatus {
            command_output: "OS update checks are not supported on macOS.".to_string(),
            ..UpdateStatus::default()
        }),
    }
}

/// Installs pending OS updates, security updates only when `critical_only`.
pub fn apply_os_updates(platform: Platform, critical_only: bool) -> Result<UpdateOutcome> {
    match platform {
        Platform::Linux => {
            let upgrade = if critical_only {
                "apt-get update -qq && apt-get upgrade -y \
                 -o Dpkg::Options::=--force-confdef -o Dpkg::Options::=--force-confold \
                 -t \"$(lsb_release -cs)-security\""
            } else {
                "apt-get update -qq && apt-get upgrade -y \
                 -o Dpkg::Options::=--force-confdef -o Dpkg::Options::=--force-confold"
            };
            let (success, output) = run("sh", &["-c", upgrade])?;
            Ok(UpdateOutcome {
                success,
                message: if success {
                    "Updates applied".to_string()
                } else {
                    "apt-get upgrade failed".to_string()
                },
                command_output: output,
            })
        }
        Platform::Windows => {
            let script = windows_install_script(critical_only);
            let (ok, output) = run("powershell", &["-NoProfile", "-Command", &script])?;
            let success = ok && windows_install_succeeded(&output);
            Ok(UpdateOutcome {
                success,
                message: if success {
                    "Windows updates applied".to_string()
                } else {
                    "Windows updates could not be applied, use Windows Update manually".to_string()
                },
                command_output: output,
            })
        }
        Platform::MacOS => Ok(UpdateOutcome {
            success: false,
            message: "Applying OS updates is not supported on macOS".to_string(),
            command_output: String::new(),
        }),
    }
}

/// `ResultCode` 2 is `orcSucceeded`.
fn windows_install_succeeded(output: &str) -> bool {
    output.contains("ResultCode: 2") || output.contains("No update")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apt_upgradable() {
        let output = "\
Listing... Done
openssl/jammy-security 3.0.2-0ubuntu1.13 amd64 [upgradable from: 3.0.2-0ubuntu1.12]
vim/jammy-updates 2:8.2.3995-1ubuntu2.15 amd64 [upgradable from: 2:8.2.3995-1ubuntu2.13]
";
        assert_eq!(
            parse_apt_upgradable(output),
            vec![
                PendingUpdate {
                    package: "openssl".into(),
                    critical: true
                },
                PendingUpdate {
                    package: "vim".into(),
                    critical: false
                },
            ]
        );
    }

    #[test]
    fn test_parse_apt_upgradable_nothing_pending() {
        assert!(parse_apt_upgradable("Listing... Done\n").is_empty());
    }

    #[test]
    fn test_update_status_flags() {
        let status = UpdateStatus::from_updates(
            parse_apt_upgradable("curl/jammy-security 7.81 amd64 [upgradable from: 7.80]\n"),
            String::new(),
        );
        assert!(status.available);
        assert!(status.critical);

        let empty = UpdateStatus::from_updates(Vec::new(), String::new());
        assert!(!empty.available);
        assert!(!empty.critical);
    }

    #[test]
    fn test_parse_windows_updates_list() {
        let output = r#"{
            "count": 2,
            "updates": [
                { "title": "2024-01 Cumulative Update", "critical": true },
                { "title": "Defender definitions", "critical": false }
            ]
        }"#;
        let updates = parse_windows_updates(output).unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].critical);
        assert_eq!(updates[1].package, "Defender definitions");
    }

    #[test]
    fn test_parse_windows_updates_single_object() {
        let output = r#"{ "count": 1, "updates": { "title": "KB5034441", "critical": false } }"#;
        let updates = parse_windows_updates(output).unwrap();
        assert_eq!(
            updates,
            vec![PendingUpdate {
                package: "KB5034441".into(),
                critical: false
            }]
        );
    }

    #[test]
    fn test_parse_windows_updates_none() {
        let updates = parse_windows_updates(r#"{ "count": 0, "updates": [] }"#).unwrap();
        assert!(updates.is_empty());
        assert!(parse_windows_updates("not json").is_err());
    }

    #[test]
    fn test_windows_install_succeeded() {
        assert!(windows_install_succeeded("ResultCode: 2\nRebootRequired: False"));
        assert!(windows_install_succeeded("No updates available."));
        assert!(!windows_install_succeeded("ResultCode: 4"));
    }

    #[test]
    fn test_windows_install_script_scope() {
        let critical = windows_install_script(true);
        assert!(critical.starts_with("$scope = 'critical'\n"));
        assert!(critical.contains("$scope -ne \"critical\""));
        assert!(!critical.contains("$args"));

        assert!(windows_install_script(false).starts_with("$scope = 'all'\n"));
    }

    #[test]
    fn test_macos_unsupported() {
        let status = check_os_updates(Platform::MacOS).unwrap();
        assert!(!status.available);
        assert!(!apply_os_updates(Platform::MacOS, true).unwrap().success);
    }
}
