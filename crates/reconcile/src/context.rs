//! Run context: cancellation, deadlines and progress reporting
//!
//! These let the engine be driven by a CLI, a service or a test without
//! depending on any particular UI or clock source.

use crate::catalog::Kind;
use crate::error::TransportError;
use crate::report::{EntityReport, KindReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag for cancelling a run from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the in-flight kind aborts, later kinds never start
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits passed with every gateway call
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Instant after which the call must give up
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl CallOptions {
    /// Options for one call, starting the timeout clock now
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            cancel,
        }
    }

    /// Fail if the call has been cancelled or its deadline has passed
    ///
    /// Gateways call this before and between the blocking parts of a call.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }
}

/// Progress callback for reconciliation runs
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called once with the kinds that will be applied, in order
    fn on_run_start(&mut self, kinds: &[Kind]);

    /// Called when a kind's batch starts
    fn on_kind_start(&mut self, kind: Kind, count: usize);

    /// Called for every entity once its status is known
    fn on_entity_complete(&mut self, kind: Kind, entity: &EntityReport);

    /// Called when a kind finishes, including after a transport failure
    fn on_kind_complete(&mut self, report: &KindReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _kinds: &[Kind]) {}
    fn on_kind_start(&mut self, _kind: Kind, _count: usize) {}
    fn on_entity_complete(&mut self, _kind: Kind, _entity: &EntityReport) {}
    fn on_kind_complete(&mut self, _report: &KindReport) {}
}
