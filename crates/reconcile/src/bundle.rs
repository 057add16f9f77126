//! Bundle model - desired entities grouped by kind
//!
//! The JSON form is an object keyed by kind, each holding a list of flat
//! entity objects. `goid`, `checksum` and `action` are reserved keys; every
//! other key is a property:
//!
//! ```json
//! {
//!   "folders":  [{ "name": "Root/API" }],
//!   "services": [{ "name": "svc1", "folderPath": "Root/API", "policy": { "xml": "<policy/>" } }]
//! }
//! ```

use crate::catalog::Kind;
use crate::entity::EntityRecord;
use crate::error::Result;
use crate::types::{Checksum, Goid, MutationAction, Properties};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The complete desired state for one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BundleDocument", into = "BundleDocument")]
pub struct Bundle {
    batches: BTreeMap<Kind, Vec<EntityRecord>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a bundle from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append a record to its kind's batch
    pub fn push(&mut self, record: EntityRecord) {
        self.batches.entry(record.kind).or_default().push(record);
    }

    /// Builder form of [`Bundle::push`]
    pub fn with(mut self, record: EntityRecord) -> Self {
        self.push(record);
        self
    }

    /// Records of one kind, in bundle order
    pub fn batch(&self, kind: Kind) -> &[EntityRecord] {
        self.batches.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Kinds with at least one record
    pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        self.batches
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(kind, _)| *kind)
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the given kinds
    pub fn retain_kinds(&mut self, keep: impl Fn(Kind) -> bool) {
        self.batches.retain(|kind, _| keep(*kind));
    }
}

/// Wire shape of one entity inside a bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntityDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    goid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<MutationAction>,
    #[serde(flatten)]
    properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct BundleDocument(BTreeMap<Kind, Vec<EntityDocument>>);

impl From<BundleDocument> for Bundle {
    fn from(doc: BundleDocument) -> Self {
        let batches = doc
            .0
            .into_iter()
            .map(|(kind, docs)| {
                let records = docs
                    .into_iter()
                    .map(|d| EntityRecord {
                        kind,
                        goid: d.goid.and_then(Goid::new),
                        checksum: d.checksum.and_then(Checksum::new),
                        action: d.action,
                        properties: d.properties,
                    })
                    .collect();
                (kind, records)
            })
            .collect();
        Self { batches }
    }
}

impl From<Bundle> for BundleDocument {
    fn from(bundle: Bundle) -> Self {
        Self(
            bundle
                .batches
                .into_iter()
                .map(|(kind, records)| {
                    let docs = records
                        .into_iter()
                        .map(|r| EntityDocument {
                            goid: r.goid.map(|g| g.as_str().to_string()),
                            checksum: r.checksum.map(|c| c.as_str().to_string()),
                            action: r.action,
                            properties: r.properties,
                        })
                        .collect();
                    (kind, docs)
                })
                .collect(),
        )
    }
}
