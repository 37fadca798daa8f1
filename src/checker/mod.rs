//! Vulnerability lookup engine.
//!
//! A [`LookupTransport`] turns one [`PackageRecord`] into one request against
//! the lookup service and classifies the outcome. The [`RetryPolicy`] decides
//! what to do after a failed attempt, and the [`ScanOrchestrator`] drives both
//! over the whole inventory, one package at a time.

mod orchestrator;
mod retry;
mod vulners;

pub use orchestrator::{
    LogProgress, ProgressEvent, ProgressObserver, ScanOrchestrator, DEFAULT_PACING,
    DEFAULT_PROGRESS_EVERY,
};
pub use retry::{RetryConfig, RetryDecision, RetryPolicy};
pub use vulners::{VulnersTransport, DEFAULT_API_URL};

use crate::config::LookupConfig;
use crate::model::PackageRecord;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// A single entry in the lookup service's search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHit {
    pub identifier: String,
}

impl LookupHit {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// Why a lookup attempt did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("rate limited by lookup service")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("lookup service returned HTTP {0}")]
    Http(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Coarse classification the retry policy decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Transient,
    Fatal,
}

impl LookupFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            LookupFailure::RateLimited => FailureClass::RateLimited,
            LookupFailure::Timeout | LookupFailure::Network(_) | LookupFailure::Http(_) => {
                FailureClass::Transient
            }
            LookupFailure::Malformed(_) => FailureClass::Fatal,
        }
    }
}

/// One request per package against a vulnerability lookup service.
///
/// `Ok` with an empty list means the package has no known vulnerabilities;
/// it is a final answer and is never retried.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup(&self, package: &PackageRecord) -> Result<Vec<LookupHit>, LookupFailure>;
}

pub fn default_transport(config: &LookupConfig) -> Result<VulnersTransport> {
    VulnersTransport::from_config(config)
}
