//! Run report - per-entity statuses aggregated across kinds

use crate::catalog::Kind;
use crate::entity::EntityRef;
use crate::error::TransportError;
use crate::types::{DetailedStatus, MutationStatus, NameValue};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final status of one desired entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub entity: EntityRef,
    #[serde(flatten)]
    pub status: DetailedStatus,
}

/// How a kind's batch ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KindOutcome {
    /// The batch call returned; individual entities may still be ERROR
    Completed,
    /// The batch call itself failed; no entity results exist for this kind
    TransportFailed { error: TransportError },
}

/// Everything that happened to one kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindReport {
    pub kind: Kind,
    #[serde(flatten)]
    pub outcome: KindOutcome,
    pub entities: Vec<EntityReport>,
}

impl KindReport {
    pub fn completed(kind: Kind, entities: Vec<EntityReport>) -> Self {
        Self {
            kind,
            outcome: KindOutcome::Completed,
            entities,
        }
    }

    pub fn transport_failed(kind: Kind, error: TransportError) -> Self {
        Self {
            kind,
            outcome: KindOutcome::TransportFailed { error },
            entities: Vec::new(),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self.outcome, KindOutcome::TransportFailed { .. })
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for entity in &self.entities {
            totals.add(entity.status.status);
        }
        totals
    }
}

/// Counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub none: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub used_existing: usize,
    pub ignored: usize,
    pub error: usize,
}

impl Totals {
    pub fn add(&mut self, status: MutationStatus) {
        match status {
            MutationStatus::None => self.none += 1,
            MutationStatus::Created => self.created += 1,
            MutationStatus::Updated => self.updated += 1,
            MutationStatus::Deleted => self.deleted += 1,
            MutationStatus::UsedExisting => self.used_existing += 1,
            MutationStatus::Ignored => self.ignored += 1,
            MutationStatus::Error => self.error += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.none += other.none;
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.used_existing += other.used_existing;
        self.ignored += other.ignored;
        self.error += other.error;
    }

    /// Number of entities that changed live state
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn total(&self) -> usize {
        self.none
            + self.created
            + self.updated
            + self.deleted
            + self.used_existing
            + self.ignored
            + self.error
    }
}

/// One ERROR entity, flattened for the error list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub kind: Kind,
    pub entity: EntityRef,
    pub description: String,
    pub source: Vec<NameValue>,
    pub target: Vec<NameValue>,
}

/// Overall run verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    Success,
    /// Some entities failed or some kinds could not be applied
    Partial,
}

/// Report for a whole run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    /// Start an empty report now
    pub fn begin(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            kinds: Vec::new(),
        }
    }

    pub fn push_kind(&mut self, report: KindReport) {
        self.kinds.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn kind(&self, kind: Kind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Statuses of a kind, in submission order
    pub fn statuses(&self, kind: Kind) -> Vec<MutationStatus> {
        self.kind(kind)
            .map(|k| k.entities.iter().map(|e| e.status.status).collect())
            .unwrap_or_default()
    }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for kind in &self.kinds {
            totals.merge(&kind.totals());
        }
        totals
    }

    /// Every ERROR entity across all kinds
    pub fn errors(&self) -> Vec<ErrorEntry> {
        self.kinds
            .iter()
            .flat_map(|k| k.entities.iter().map(move |e| (k.kind, e)))
            .filter(|(_, e)| e.status.status.is_error())
            .map(|(kind, e)| ErrorEntry {
                kind,
                entity: e.entity.clone(),
                description: e.status.description.clone(),
                source: e.status.source.clone(),
                target: e.status.target.clone(),
            })
            .collect()
    }

    /// Kinds whose batch call failed, with the failure
    pub fn failed_kinds(&self) -> Vec<(Kind, &TransportError)> {
        self.kinds
            .iter()
            .filter_map(|k| match &k.outcome {
                KindOutcome::TransportFailed { error } => Some((k.kind, error)),
                KindOutcome::Completed => None,
            })
            .collect()
    }

    /// SUCCESS only with no ERROR entity and no failed kind
    pub fn result(&self) -> RunResult {
        if self.totals().error == 0 && self.failed_kinds().is_empty() {
            RunResult::Success
        } else {
            RunResult::Partial
        }
    }

    pub fn is_success(&self) -> bool {
        self.result() == RunResult::Success
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ReportDocument {
            result: self.result(),
            totals: self.totals(),
            report: self,
            errors: self.errors(),
        })
    }
}

/// Exported form: the report plus derived verdict, totals and error list
#[derive(Serialize)]
struct ReportDocument<'a> {
    result: RunResult,
    totals: Totals,
    #[serde(flatten)]
    report: &'a RunReport,
    errors: Vec<ErrorEntry>,
}
