use super::{FailureClass, LookupFailure, LookupTransport, RetryDecision, RetryPolicy};
use crate::model::{PackageRecord, VulnerabilityMatch};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of packages between progress events.
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// Default pause before the first attempt of every package after the first.
pub const DEFAULT_PACING: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub processed: usize,
    pub total: usize,
}

/// Receives periodic progress notifications during a scan.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Writes progress as `tracing` info lines.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, event: ProgressEvent) {
        info!(
            processed = event.processed,
            total = event.total,
            "Checked {}/{} packages",
            event.processed,
            event.total
        );
    }
}

/// Per-package attempt bookkeeping, dropped once the package is resolved.
#[derive(Debug, Default)]
struct AttemptState {
    attempts_made: u32,
    exhausted: bool,
}

/// Looks up every package in order, one request in flight at a time.
///
/// Failures never escape [`scan`](Self::scan): a package whose attempts are
/// exhausted, or whose response cannot be parsed, contributes no matches and
/// the scan moves on.
pub struct ScanOrchestrator<T: LookupTransport> {
    transport: T,
    policy: RetryPolicy,
    pacing: Duration,
    progress_every: usize,
    observer: Option<Box<dyn ProgressObserver>>,
    cancel: Option<Arc<AtomicBool>>,
    log_fatal_details: bool,
}

impl<T: LookupTransport> ScanOrchestrator<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            pacing: DEFAULT_PACING,
            progress_every: DEFAULT_PROGRESS_EVERY,
            observer: None,
            cancel: None,
            log_fatal_details: false,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The flag is checked between packages; setting it ends the scan early
    /// with whatever matches were collected so far.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Log the full diagnostic of unparseable responses at `warn` instead of
    /// a one-line summary at `debug`.
    pub fn with_fatal_details(mut self, enabled: bool) -> Self {
        self.log_fatal_details = enabled;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn scan(&self, packages: &[PackageRecord]) -> Vec<VulnerabilityMatch> {
        let mut matches = Vec::new();
        let total = packages.len();

        if total == 0 {
            return matches;
        }

        info!(
            total,
            transport = self.transport.name(),
            "Starting vulnerability lookup"
        );

        for (index, package) in packages.iter().enumerate() {
            if self.is_cancelled() {
                warn!(processed = index, total, "Scan cancelled");
                break;
            }

            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            self.lookup_package(package, &mut matches).await;

            let processed = index + 1;
            if processed % self.progress_every == 0 || processed == total {
                self.emit_progress(ProgressEvent { processed, total });
            }
        }

        info!(matches = matches.len(), "Vulnerability lookup finished");
        matches
    }

    async fn lookup_package(&self, package: &PackageRecord, matches: &mut Vec<VulnerabilityMatch>) {
        let mut state = AttemptState::default();

        if self.policy.max_attempts() == 0 {
            debug!(package = %package, "No lookup attempts allowed, skipping package");
            return;
        }

        loop {
            let failure = match self.transport.lookup(package).await {
                Ok(hits) => {
                    if !hits.is_empty() {
                        debug!(package = %package, hits = hits.len(), "Vulnerabilities found");
                    }
                    matches.extend(
                        hits.into_iter()
                            .map(|hit| VulnerabilityMatch::from_hit(package, hit.identifier)),
                    );
                    return;
                }
                Err(failure) => failure,
            };

            state.attempts_made += 1;

            match self.policy.decide(state.attempts_made, &failure) {
                RetryDecision::Retry(delay) => {
                    debug!(
                        package = %package,
                        attempt = state.attempts_made,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Retrying lookup"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    state.exhausted = state.attempts_made >= self.policy.max_attempts();
                    self.log_abandoned(package, &state, &failure);
                    return;
                }
            }
        }
    }

    fn log_abandoned(
        &self,
        package: &PackageRecord,
        state: &AttemptState,
        failure: &LookupFailure,
    ) {
        if failure.class() == FailureClass::Fatal {
            if self.log_fatal_details {
                warn!(
                    package = %package,
                    attempts = state.attempts_made,
                    exhausted = state.exhausted,
                    error = %failure,
                    "Unusable lookup response"
                );
            } else {
                debug!(
                    package = %package,
                    attempts = state.attempts_made,
                    exhausted = state.exhausted,
                    "Unusable lookup response, skipping"
                );
            }
            return;
        }

        debug!(
            package = %package,
            attempts = state.attempts_made,
            error = %failure,
            "Retries exhausted, skipping package"
        );
    }

    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(observer) = &self.observer {
            observer.on_progress(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
