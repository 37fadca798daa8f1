use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use patchwatch::{
    checker::{
        default_transport, LogProgress, ProgressEvent, ProgressObserver, RetryPolicy,
        ScanOrchestrator,
    },
    config::Config,
    logging::init_logger,
    model::{PackageRecord, Platform, ScanReport, Source},
    notify::{send_alert, NotifyMethod, NotifySettings},
    output::{format_result_to_string, print_result, write_html_report, OutputFormat},
    scanner::{all_scanners, get_scanner, Scanner},
    updates::{apply_os_updates, check_os_updates},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABLE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "patchwatch")]
#[command(
    author,
    version,
    about = "Check installed packages against a vulnerability database"
)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inventory installed packages and look up known vulnerabilities
    Scan {
        /// Only collect from this source (dpkg, pip, wmic)
        #[arg(short, long)]
        source: Option<String>,

        /// Output format (table, json, html)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<String>,

        /// Also write a timestamped HTML report to the report directory
        #[arg(long)]
        report: bool,

        /// Send an alert when vulnerabilities are found
        #[arg(long, value_enum)]
        notify: Option<NotifyMethod>,

        /// Exit with status 2 if any vulnerability is found
        #[arg(long)]
        fail_on_vuln: bool,

        /// Disable the interactive progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// List available inventory sources
    ListSources,

    /// Show pending operating system updates
    Updates {
        /// Install pending updates (security updates only unless --all)
        #[arg(long)]
        apply: bool,

        /// With --apply, install every pending update
        #[arg(long, requires = "apply")]
        all: bool,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

struct ScanOptions {
    source: Option<String>,
    format: String,
    output: Option<String>,
    report: bool,
    notify: Option<NotifyMethod>,
    fail_on_vuln: bool,
    show_progress: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Scan {
            source,
            format,
            output,
            report,
            notify,
            fail_on_vuln,
            no_progress,
        } => {
            let options = ScanOptions {
                source,
                format: format.unwrap_or_else(|| config.default_format.clone()),
                output,
                report,
                notify,
                fail_on_vuln,
                show_progress: !no_progress,
            };
            run_scan(&config, options).await
        }
        Commands::ListSources => {
            list_sources();
            Ok(exit_codes::SUCCESS)
        }
        Commands::Updates { apply, all } => run_updates(apply, all),
        Commands::Config { init, path } => {
            handle_config(&config_path, init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(config: &Config, options: ScanOptions) -> Result<u8> {
    let format = OutputFormat::from_str(&options.format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table && options.show_progress;

    let scanners: Vec<Box<dyn Scanner>> = match &options.source {
        Some(name) => vec![get_scanner(parse_source(name)?)],
        None => all_scanners(),
    };

    let mut packages = collect_inventory(&scanners).await;
    let before = packages.len();
    packages.retain(|p| !config.ignore.should_ignore_package(&p.name));
    if packages.len() < before {
        info!(ignored = before - packages.len(), "Skipping ignored packages");
    }

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_handler(cancel.clone());

    let observer: Box<dyn ProgressObserver> = if is_interactive {
        Box::new(BarProgress::new(packages.len())?)
    } else {
        Box::new(LogProgress)
    };

    let orchestrator = ScanOrchestrator::new(
        default_transport(&config.lookup)?,
        RetryPolicy::new(config.retry.clone()),
    )
    .with_pacing(config.lookup.pacing())
    .with_progress_every(config.lookup.progress_every)
    .with_fatal_details(config.lookup.log_fatal_details)
    .with_cancel_flag(cancel)
    .with_observer(observer);

    let mut matches = orchestrator.scan(&packages).await;
    // Clears an unfinished progress bar before results are printed.
    drop(orchestrator);
    matches.retain(|m| !config.ignore.should_ignore_vulnerability(&m.identifier));

    let report = ScanReport::new(packages, matches);

    if let Some(path) = &options.output {
        let content = format_result_to_string(&report, format)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
        if is_interactive {
            println!("Results written to: {}", path);
        }
    } else {
        print_result(&report, format)?;
    }

    if options.report {
        let path = write_html_report(&report, &config.report_dir)?;
        info!(path = %path.display(), "HTML report written");
    }

    if let Some(method) = options.notify {
        let settings = NotifySettings::from_env_and_config(&config.notify);
        if let Err(e) = send_alert(&report.vulnerabilities, method, &settings).await {
            warn!(error = %format!("{:#}", e), "Failed to send alert");
        }
    }

    if options.fail_on_vuln && !report.vulnerabilities.is_empty() {
        Ok(exit_codes::VULNERABLE)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

/// Runs every supported collector concurrently, keeping collector order.
async fn collect_inventory(scanners: &[Box<dyn Scanner>]) -> Vec<PackageRecord> {
    let futures: Vec<_> = scanners
        .iter()
        .map(|scanner| async move {
            if !scanner.is_supported() {
                debug!(scanner = scanner.name(), "Not supported on this platform");
                return Vec::new();
            }
            match scanner.scan().await {
                Ok(packages) => {
                    info!(scanner = scanner.name(), count = packages.len(), "Inventory collected");
                    packages
                }
                Err(e) => {
                    warn!(scanner = scanner.name(), error = %format!("{:#}", e), "Inventory failed");
                    Vec::new()
                }
            }
        })
        .collect();

    join_all(futures).await.into_iter().flatten().collect()
}

fn spawn_ctrl_c_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current package");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

/// Interactive progress bar fed by orchestrator progress events.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: usize) -> Result<Self> {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Checking packages...")?
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Ok(Self { bar })
    }
}

impl ProgressObserver for BarProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_position(event.processed as u64);
        if event.processed == event.total {
            self.bar.finish_and_clear();
        }
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn run_updates(apply: bool, all: bool) -> Result<u8> {
    let platform = Platform::current();
    let status = check_os_updates(platform)?;

    if status.updates.is_empty() {
        println!("No pending updates.");
        if !status.command_output.trim().is_empty() && !status.available {
            debug!(output = %status.command_output.trim(), "Update check output");
        }
    } else {
        println!("Pending updates ({}):", status.updates.len());
        for update in &status.updates {
            let marker = if update.critical { " [security]" } else { "" };
            println!("  {}{}", update.package, marker);
        }
    }

    if !apply {
        return Ok(exit_codes::SUCCESS);
    }

    let outcome = apply_os_updates(platform, !all)?;
    println!("{}", outcome.message);
    debug!(output = %outcome.command_output, "Update command output");

    Ok(if outcome.success {
        exit_codes::SUCCESS
    } else {
        exit_codes::ERROR
    })
}

fn list_sources() {
    println!("Available sources:");
    println!();

    for source in [Source::Dpkg, Source::Pip, Source::Wmic] {
        let scanner = get_scanner(source);
        let supported = if scanner.is_supported() { "yes" } else { "no" };

        println!(
            "  {:<8} {:<20} [supported: {}]",
            source.as_str(),
            scanner.name(),
            supported
        );
    }
}

fn handle_config(config_path: &Path, init: bool, show_path: bool) -> Result<()> {
    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save_to(config_path)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'patchwatch config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

fn parse_source(s: &str) -> Result<Source> {
    Source::from_str(s).map_err(|e| anyhow::anyhow!(e))
}
