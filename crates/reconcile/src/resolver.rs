//! Action resolution - decide what to do with each desired entity
//!
//! [`resolve`] is the pure decision table over (directive, matched,
//! checksum-equal). [`plan_entity`] wraps it with matching, drift detection
//! and the per-entity resolution errors (ambiguous match, delete of a
//! missing entity).

use crate::catalog::{Catalog, KindSpec};
use crate::entity::{Entity, EntityRecord};
use crate::gateway::Mutation;
use crate::matcher::{MatchOutcome, Matcher};
use crate::types::{
    DetailedStatus, Goid, MutationAction, MutationStatus, NameValue, PropertyValue,
};
use std::collections::{BTreeSet, HashSet};

/// Resolved action for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Create,
    Update,
    Delete,
    /// Matched and left as is
    UseExisting,
    /// Skipped by directive
    Ignore,
    /// DELETE without a live counterpart
    NotFound,
}

/// The resolution table
///
/// `checksum_equal` is only consulted for a matched NEW_OR_UPDATE entity.
pub const fn resolve(action: MutationAction, matched: bool, checksum_equal: bool) -> Resolution {
    match (action, matched) {
        (MutationAction::Ignore, _) => Resolution::Ignore,
        (MutationAction::AlwaysCreateNew, _) => Resolution::Create,
        (MutationAction::NewOrUpdate | MutationAction::NewOrExisting, false) => Resolution::Create,
        (MutationAction::NewOrUpdate, true) if checksum_equal => Resolution::UseExisting,
        (MutationAction::NewOrUpdate, true) => Resolution::Update,
        (MutationAction::NewOrExisting, true) => Resolution::UseExisting,
        (MutationAction::Delete, false) => Resolution::NotFound,
        (MutationAction::Delete, true) => Resolution::Delete,
    }
}

/// Field-level difference between a desired and a live entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDiff {
    /// Desired values of the differing fields
    pub source: Vec<NameValue>,
    /// Live values of the differing fields
    pub target: Vec<NameValue>,
}

impl FieldDiff {
    /// Compare the significant fields of two property maps
    pub fn between(spec: &KindSpec, desired: &impl Entity, live: &impl Entity) -> Self {
        let desired = spec.significant(desired.properties());
        let live = spec.significant(live.properties());

        let names: BTreeSet<&str> = desired.keys().chain(live.keys()).copied().collect();
        let mut diff = Self::default();
        for name in names {
            let (d, l) = (desired.get(name), live.get(name));
            if d == l {
                continue;
            }
            if let Some(value) = d {
                diff.source.push(NameValue::new(name, (*value).clone()));
            }
            if let Some(value) = l {
                diff.target.push(NameValue::new(name, (*value).clone()));
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }

    /// Names of all differing fields
    pub fn fields(&self) -> BTreeSet<&str> {
        self.source
            .iter()
            .chain(&self.target)
            .map(|nv| nv.name.as_str())
            .collect()
    }
}

/// Whether desired and live agree on every significant field
///
/// Checksums are compared verbatim when both sides carry one; otherwise the
/// masked property maps are compared.
pub fn checksum_equal(spec: &KindSpec, desired: &impl Entity, live: &impl Entity) -> bool {
    match (desired.checksum(), live.checksum()) {
        (Some(d), Some(l)) => d == l,
        _ => spec.significant(desired.properties()) == spec.significant(live.properties()),
    }
}

/// What the executor will do with one desired entity
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Create,
    Update { goid: Goid, diff: FieldDiff },
    Delete { goid: Goid },
    UseExisting { goid: Goid },
    Ignore,
    /// Resolution error; never submitted
    Reject { description: String },
}

impl PlanStep {
    /// Outcome this step produces when it succeeds
    pub fn expected_status(&self) -> MutationStatus {
        match self {
            Self::Create => MutationStatus::Created,
            Self::Update { .. } => MutationStatus::Updated,
            Self::Delete { .. } => MutationStatus::Deleted,
            Self::UseExisting { .. } => MutationStatus::UsedExisting,
            Self::Ignore => MutationStatus::Ignored,
            Self::Reject { .. } => MutationStatus::Error,
        }
    }

    /// Live entity the step targets
    pub fn goid(&self) -> Option<&Goid> {
        match self {
            Self::Update { goid, .. } | Self::Delete { goid } | Self::UseExisting { goid } => {
                Some(goid)
            }
            Self::Create | Self::Ignore | Self::Reject { .. } => None,
        }
    }

    /// Whether the step needs a gateway call
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update { .. } | Self::Delete { .. })
    }

    /// The gateway mutation for this step, if any
    pub fn mutation(&self, record: &EntityRecord) -> Option<Mutation> {
        match self {
            Self::Create => Some(Mutation::Create {
                record: record.clone(),
            }),
            Self::Update { goid, .. } => Some(Mutation::Update {
                goid: goid.clone(),
                record: record.clone(),
            }),
            Self::Delete { goid } => Some(Mutation::Delete {
                goid: goid.clone(),
                record: record.clone(),
            }),
            Self::UseExisting { .. } | Self::Ignore | Self::Reject { .. } => None,
        }
    }

    /// Status for a step that is settled without a gateway call
    ///
    /// In a dry run, mutation steps report their expected outcome.
    pub fn local_status(&self, action: MutationAction, dry_run: bool) -> DetailedStatus {
        let status = self.expected_status();
        match self {
            Self::UseExisting { goid } => {
                DetailedStatus::new(action, status, format!("using existing entity {goid}"))
            }
            Self::Ignore => DetailedStatus::new(action, status, "ignored by mutation action"),
            Self::Reject { description } => DetailedStatus::error(action, description.clone()),
            Self::Update { diff, .. } => DetailedStatus::new(
                action,
                status,
                describe_planned(self, dry_run),
            )
            .with_diff(diff.source.clone(), diff.target.clone()),
            Self::Create | Self::Delete { .. } => {
                DetailedStatus::new(action, status, describe_planned(self, dry_run))
            }
        }
    }
}

fn describe_planned(step: &PlanStep, dry_run: bool) -> String {
    let verb = match step {
        PlanStep::Create => "create",
        PlanStep::Update { .. } => "update",
        PlanStep::Delete { .. } => "delete",
        _ => "apply",
    };
    if dry_run {
        format!("dry run: would {verb}")
    } else {
        format!("pending {verb}")
    }
}

/// Match and resolve one desired entity
pub fn plan_entity(spec: &KindSpec, matcher: &Matcher<'_>, record: &EntityRecord) -> PlanStep {
    let action = record.effective_action();

    // Neither directive looks at the live side.
    match action {
        MutationAction::Ignore => return PlanStep::Ignore,
        MutationAction::AlwaysCreateNew => return PlanStep::Create,
        _ => {}
    }

    let live = match matcher.find(record) {
        MatchOutcome::Matched { live, .. } => Some(live),
        MatchOutcome::Unmatched => None,
        MatchOutcome::Ambiguous { key, candidates } => {
            return PlanStep::Reject {
                description: format!(
                    "ambiguous match: {candidates} live {} entities share {key}",
                    matcher.kind()
                ),
            };
        }
    };

    let equal = live.is_some_and(|l| checksum_equal(spec, record, l));
    match (resolve(action, live.is_some(), equal), live) {
        (Resolution::Create, _) => PlanStep::Create,
        (Resolution::Ignore, _) => PlanStep::Ignore,
        (Resolution::UseExisting, Some(l)) => PlanStep::UseExisting {
            goid: l.goid.clone(),
        },
        (Resolution::Update, Some(l)) => PlanStep::Update {
            goid: l.goid.clone(),
            diff: FieldDiff::between(spec, record, l),
        },
        (Resolution::Delete, Some(l)) => PlanStep::Delete {
            goid: l.goid.clone(),
        },
        (Resolution::NotFound, _) | (_, None) => PlanStep::Reject {
            description: not_found(spec, matcher, record),
        },
    }
}

fn not_found(spec: &KindSpec, matcher: &Matcher<'_>, record: &EntityRecord) -> String {
    let kind = matcher.kind();
    if let Some(key) = record.natural_key(matcher.catalog()) {
        return format!("not found: no live {kind} entity matches {key}");
    }

    let missing: Vec<&str> = spec
        .identity
        .fields()
        .iter()
        .copied()
        .filter(|field| record.property(field).and_then(PropertyValue::key_text).is_none())
        .collect();
    match &record.goid {
        Some(goid) => format!(
            "not found: no live {kind} entity with goid={goid}; missing key field(s) {}",
            missing.join(", ")
        ),
        None => format!(
            "not found: {kind} entity has no goid and is missing key field(s) {}",
            missing.join(", ")
        ),
    }
}

/// Reject records that repeat an earlier record's natural key
///
/// Every record is planned against the live list as it was before the
/// batch, so two records sharing a key would both resolve to CREATE.
/// ALWAYS_CREATE_NEW and IGNORE records are exempt.
pub fn reject_duplicate_keys(
    catalog: &Catalog,
    records: &[EntityRecord],
    steps: &mut [PlanStep],
) {
    let mut seen = HashSet::new();
    for (record, step) in records.iter().zip(steps.iter_mut()) {
        if matches!(
            record.effective_action(),
            MutationAction::Ignore | MutationAction::AlwaysCreateNew
        ) {
            continue;
        }
        let Some(key) = record.natural_key(catalog) else {
            continue;
        };
        if seen.contains(&key) {
            *step = PlanStep::Reject {
                description: format!("duplicate natural key in bundle: {key}"),
            };
        } else {
            seen.insert(key);
        }
    }
}
