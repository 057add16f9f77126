//! Gateway seam - the remote side of a reconciliation run
//!
//! A gateway exposes two batch operations per kind: listing live entities
//! and applying a list of mutations. Implementations own the transport; the
//! engine owns matching, resolution and ordering.

use crate::catalog::Kind;
use crate::context::CallOptions;
use crate::entity::{EntityRecord, LiveEntity};
use crate::error::TransportError;
use crate::types::{DetailedStatus, Goid, MutationAction};

/// One resolved change submitted to a gateway
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a new entity from the desired record
    Create { record: EntityRecord },
    /// Replace the live entity `goid` with the desired record
    Update { goid: Goid, record: EntityRecord },
    /// Remove the live entity `goid`
    Delete { goid: Goid, record: EntityRecord },
}

impl Mutation {
    pub fn record(&self) -> &EntityRecord {
        match self {
            Self::Create { record } | Self::Update { record, .. } | Self::Delete { record, .. } => {
                record
            }
        }
    }

    /// Directive the record was submitted under
    pub fn action(&self) -> MutationAction {
        self.record().effective_action()
    }

    /// Target goid for updates and deletes
    pub fn goid(&self) -> Option<&Goid> {
        match self {
            Self::Create { .. } => None,
            Self::Update { goid, .. } | Self::Delete { goid, .. } => Some(goid),
        }
    }

    /// Short verb for logs
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Transport to a live gateway
///
/// Implement this trait to connect the engine to a real gateway.
pub trait Gateway {
    /// Human-readable name for logs and reports
    fn name(&self) -> &str {
        "gateway"
    }

    /// All live entities of one kind
    fn list(&self, kind: Kind, call: &CallOptions) -> Result<Vec<LiveEntity>, TransportError>;

    /// Apply one kind's mutations as a single batch call
    ///
    /// Must return exactly one status per submitted mutation, in submission
    /// order. Per-entity failures are ERROR statuses, never an `Err`.
    fn apply(
        &mut self,
        kind: Kind,
        mutations: &[Mutation],
        call: &CallOptions,
    ) -> Result<Vec<DetailedStatus>, TransportError>;
}
