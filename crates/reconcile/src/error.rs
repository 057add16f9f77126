//! Error types for reconciliation.
//!
//! Two families are kept apart: [`Error`] covers failures of the run itself
//! (a bad bundle, an inconsistent catalog), while [`TransportError`] covers a
//! failed batch call and only ever affects the kind being applied. Per-entity
//! failures are neither: they are ERROR status records in the run report.

use crate::catalog::Kind;
use serde::Serialize;
use thiserror::Error;

/// Errors that stop a run before or outside of any batch call
#[derive(Debug, Error)]
pub enum Error {
    /// The kind dependency graph has a cycle
    #[error("dependency cycle among kinds: {}", join_kinds(.kinds))]
    DependencyCycle {
        /// Kinds that could not be ordered
        kinds: Vec<Kind>,
    },

    /// A kind name that is not in the catalog
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// Bundle JSON could not be read
    #[error("invalid bundle: {0}")]
    Bundle(#[from] serde_json::Error),
}

fn join_kinds(kinds: &[Kind]) -> String {
    kinds
        .iter()
        .map(Kind::key)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a whole batch call
///
/// Fatal for the kind being applied only; later kinds still run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportError {
    /// Deadline passed before or during the call
    #[error("call timed out")]
    Timeout,

    /// The run was cancelled by the caller
    #[error("call cancelled")]
    Cancelled,

    /// Connection-level failure
    #[error("connection failed: {message}")]
    Connection {
        /// Details from the transport
        message: String,
    },

    /// The gateway refused the credentials
    #[error("authentication failed: {message}")]
    Auth {
        /// Details from the gateway
        message: String,
    },

    /// The reply broke the batch contract (e.g. wrong number of statuses)
    #[error("protocol violation: {message}")]
    Protocol {
        /// What was wrong with the reply
        message: String,
    },
}

impl TransportError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
