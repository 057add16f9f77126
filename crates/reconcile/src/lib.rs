//! # Reconcile
//!
//! A reconciliation engine for policy-driven API gateway configuration.
//!
//! A bundle declares the desired entities of ~46 gateway kinds. The engine
//! matches each one against live gateway state, resolves what to do from
//! its mutation directive and drift, and applies one batch per kind in
//! dependency order, collecting one status per entity into a run report.
//!
//! ## Core Concepts
//!
//! - **Catalog**: per-kind identity rules, no-effect fields and references
//! - **Matcher**: finds the live counterpart by goid, then by natural key
//! - **Resolver**: the directive / matched / checksum-equal decision table
//! - **Orderer**: topological order over kinds
//! - **Executor**: list, resolve, apply, merge statuses, one kind at a time
//! - **RunReport**: totals, error list and SUCCESS / PARTIAL verdict
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Bundle, Catalog, MemoryGateway, MutationStatus, Kind, execute_simple};
//!
//! let bundle = Bundle::from_json(r#"{
//!     "folders":  [{ "name": "Root/API" }],
//!     "services": [{ "name": "svc1", "folderPath": "Root/API" }]
//! }"#)?;
//!
//! let catalog = Catalog::builtin();
//! let mut gateway = MemoryGateway::new();
//!
//! let report = execute_simple(&catalog, &mut gateway, &bundle)?;
//! assert_eq!(report.statuses(Kind::Services), vec![MutationStatus::Created]);
//!
//! // Re-applying an unchanged bundle converges without changes
//! let report = execute_simple(&catalog, &mut gateway, &bundle)?;
//! assert_eq!(report.totals().total_changes(), 0);
//! ```
//!
//! ## Provider Traits
//!
//! - [`Gateway`]: the transport to a live gateway
//! - [`ProgressCallback`]: receives progress updates
//!
//! [`MemoryGateway`] implements [`Gateway`] in process and is what the CLI
//! and the tests run against.

pub mod bundle;
pub mod catalog;
pub mod context;
pub mod entity;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod matcher;
pub mod memory;
pub mod orderer;
pub mod report;
pub mod resolver;
pub mod types;

// Re-export main types at crate root
pub use bundle::Bundle;
pub use catalog::{Catalog, IdentityRule, Kind, KindSpec, NaturalKey, Reference};
pub use context::{CallOptions, CancelToken, NoProgress, ProgressCallback};
pub use entity::{Entity, EntityRecord, EntityRef, LiveEntity};
pub use error::{Error, Result, TransportError};
pub use executor::{ExecuteOptions, execute, execute_simple};
pub use gateway::{Gateway, Mutation};
pub use matcher::{MatchBasis, MatchOutcome, Matcher};
pub use memory::MemoryGateway;
pub use orderer::DependencyGraph;
pub use report::{EntityReport, ErrorEntry, KindOutcome, KindReport, RunReport, RunResult, Totals};
pub use resolver::{
    FieldDiff, PlanStep, Resolution, plan_entity, reject_duplicate_keys, resolve,
};
pub use types::{
    Checksum, DetailedStatus, Goid, MutationAction, MutationStatus, NameValue, Properties,
    PropertyValue, UnknownWireValue, properties,
};
