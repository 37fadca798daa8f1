pub mod checker;
pub mod config;
pub mod logging;
pub mod model;
pub mod notify;
pub mod output;
pub mod scanner;
pub mod updates;

pub use checker::{LookupTransport, RetryPolicy, ScanOrchestrator};
pub use config::Config;
pub use model::{PackageRecord, Platform, ScanReport, Source, VulnerabilityMatch};
pub use scanner::Scanner;
