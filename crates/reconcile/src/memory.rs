//! In-memory gateway
//!
//! A complete [`Gateway`] that keeps live state in a map. It enforces the
//! same per-entity rules a real gateway does (checked references, goid
//! uniqueness, no deletion of referenced entities) so engine behaviour can
//! be exercised end to end. The state serializes, which lets the CLI keep a
//! local snapshot between runs.

use crate::catalog::{Catalog, Kind};
use crate::context::CallOptions;
use crate::entity::{Entity, EntityRecord, LiveEntity};
use crate::error::TransportError;
use crate::gateway::{Gateway, Mutation};
use crate::types::{DetailedStatus, Goid, MutationAction, MutationStatus, Properties};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryGateway {
    /// Live entities per kind, in insertion order
    #[serde(default)]
    entities: BTreeMap<Kind, Vec<LiveEntity>>,

    /// Counter for generated goids
    #[serde(default)]
    next_goid: u64,

    #[serde(skip)]
    catalog: Catalog,

    /// Injected transport failures, keyed by kind
    #[serde(skip)]
    faults: HashMap<Kind, TransportError>,

    /// Kinds passed to `apply`, in call order
    #[serde(skip)]
    applied: Vec<Kind>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway enforcing a custom catalog's rules
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// Add a live entity with a generated goid and computed checksum
    pub fn seed(&mut self, kind: Kind, properties: Properties) -> Goid {
        let goid = self.allocate_goid();
        let checksum = Some(self.catalog.spec(kind).checksum(&properties));
        self.insert(LiveEntity {
            kind,
            goid: goid.clone(),
            checksum,
            properties,
        });
        goid
    }

    /// Add a live entity exactly as given
    pub fn insert(&mut self, entity: LiveEntity) {
        self.entities.entry(entity.kind).or_default().push(entity);
    }

    /// Live entities of one kind
    pub fn entities(&self, kind: Kind) -> &[LiveEntity] {
        self.entities.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Total number of live entities
    pub fn len(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every call for `kind` fail with `error`
    pub fn fail_kind(&mut self, kind: Kind, error: TransportError) {
        self.faults.insert(kind, error);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Kinds that reached `apply`, in call order
    pub fn applied_kinds(&self) -> &[Kind] {
        &self.applied
    }

    fn check_call(&self, kind: Kind, call: &CallOptions) -> Result<(), TransportError> {
        call.check()?;
        match self.faults.get(&kind) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn goid_in_use(&self, goid: &Goid) -> bool {
        self.entities.values().flatten().any(|e| &e.goid == goid)
    }

    fn allocate_goid(&mut self) -> Goid {
        loop {
            self.next_goid += 1;
            let goid = Goid::generated(self.next_goid);
            if !self.goid_in_use(&goid) {
                return goid;
            }
        }
    }

    fn position(&self, kind: Kind, goid: &Goid) -> Option<usize> {
        self.entities(kind).iter().position(|e| &e.goid == goid)
    }

    /// First checked reference of `record` that does not resolve
    fn dangling_reference(&self, record: &EntityRecord) -> Option<String> {
        let spec = self.catalog.spec(record.kind);
        spec.references.iter().find_map(|r| {
            let value = record.property(r.field)?.key_text()?;
            let resolved = self.entities(r.target).iter().any(|e| {
                e.property(r.target_field).and_then(|v| v.key_text()).as_ref() == Some(&value)
            });
            (!resolved).then(|| format!("referenced {} '{value}' not found", r.target))
        })
    }

    /// A live entity of another kind that points at `target`
    fn referrer_of(&self, target: &LiveEntity) -> Option<(Kind, &LiveEntity)> {
        Kind::ALL.iter().find_map(|&kind| {
            let spec = self.catalog.spec(kind);
            spec.references
                .iter()
                .filter(|r| r.target == target.kind)
                .find_map(|r| {
                    let wanted = target.property(r.target_field)?.key_text()?;
                    self.entities(kind)
                        .iter()
                        .find(|e| {
                            e.property(r.field).and_then(|v| v.key_text()).as_ref() == Some(&wanted)
                        })
                        .map(|e| (kind, e))
                })
        })
    }

    fn live_from(&self, kind: Kind, goid: Goid, record: &EntityRecord) -> LiveEntity {
        let checksum = record
            .checksum
            .clone()
            .or_else(|| Some(self.catalog.spec(kind).checksum(&record.properties)));
        LiveEntity {
            kind,
            goid,
            checksum,
            properties: record.properties.clone(),
        }
    }

    fn apply_one(&mut self, kind: Kind, mutation: &Mutation) -> DetailedStatus {
        let action = mutation.action();
        match mutation {
            Mutation::Create { record } => self.create(kind, action, record),
            Mutation::Update { goid, record } => self.update(kind, action, goid, record),
            Mutation::Delete { goid, .. } => self.delete(kind, action, goid),
        }
    }

    fn create(
        &mut self,
        kind: Kind,
        action: MutationAction,
        record: &EntityRecord,
    ) -> DetailedStatus {
        if let Some(problem) = self.dangling_reference(record) {
            return DetailedStatus::error(action, problem);
        }
        let goid = match &record.goid {
            Some(goid) if self.goid_in_use(goid) => {
                // ALWAYS_CREATE_NEW of a matched entity lands here with its old goid
                if action == MutationAction::AlwaysCreateNew {
                    self.allocate_goid()
                } else {
                    return DetailedStatus::error(
                        action,
                        format!("goid {goid} already in use"),
                    );
                }
            }
            Some(goid) => goid.clone(),
            None => self.allocate_goid(),
        };
        let entity = self.live_from(kind, goid.clone(), record);
        self.insert(entity);
        DetailedStatus::new(
            action,
            MutationStatus::Created,
            format!("created {kind} {goid}"),
        )
    }

    fn update(
        &mut self,
        kind: Kind,
        action: MutationAction,
        goid: &Goid,
        record: &EntityRecord,
    ) -> DetailedStatus {
        let Some(index) = self.position(kind, goid) else {
            return DetailedStatus::error(
                action,
                format!("not found: no {kind} with goid {goid}"),
            );
        };
        if let Some(problem) = self.dangling_reference(record) {
            return DetailedStatus::error(action, problem);
        }
        let entity = self.live_from(kind, goid.clone(), record);
        if let Some(slot) = self.entities.get_mut(&kind).and_then(|v| v.get_mut(index)) {
            *slot = entity;
        }
        DetailedStatus::new(
            action,
            MutationStatus::Updated,
            format!("updated {kind} {goid}"),
        )
    }

    fn delete(&mut self, kind: Kind, action: MutationAction, goid: &Goid) -> DetailedStatus {
        let Some(index) = self.position(kind, goid) else {
            return DetailedStatus::error(
                action,
                format!("not found: no {kind} with goid {goid}"),
            );
        };
        let target = &self.entities(kind)[index];
        if let Some((referrer_kind, referrer)) = self.referrer_of(target) {
            return DetailedStatus::error(
                action,
                format!("still referenced by {referrer_kind} {}", referrer.goid),
            );
        }
        if let Some(batch) = self.entities.get_mut(&kind) {
            batch.remove(index);
        }
        DetailedStatus::new(
            action,
            MutationStatus::Deleted,
            format!("deleted {kind} {goid}"),
        )
    }
}

impl Gateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    fn list(&self, kind: Kind, call: &CallOptions) -> Result<Vec<LiveEntity>, TransportError> {
        self.check_call(kind, call)?;
        Ok(self.entities(kind).to_vec())
    }

    fn apply(
        &mut self,
        kind: Kind,
        mutations: &[Mutation],
        call: &CallOptions,
    ) -> Result<Vec<DetailedStatus>, TransportError> {
        self.check_call(kind, call)?;
        self.applied.push(kind);
        log::debug!("memory gateway: applying {} {kind} mutation(s)", mutations.len());
        Ok(mutations.iter().map(|m| self.apply_one(kind, m)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelToken;
    use crate::types::properties;

    fn create(kind: Kind, props: Properties) -> Mutation {
        Mutation::Create {
            record: EntityRecord::new(kind, props),
        }
    }

    fn apply(gw: &mut MemoryGateway, kind: Kind, mutations: &[Mutation]) -> Vec<DetailedStatus> {
        gw.apply(kind, mutations, &CallOptions::default()).unwrap()
    }

    #[test]
    fn test_create_assigns_goid_and_checksum() {
        let mut gw = MemoryGateway::new();
        let statuses = apply(
            &mut gw,
            Kind::Folders,
            &[create(Kind::Folders, properties([("name", "Root/API")]))],
        );
        assert_eq!(statuses[0].status, MutationStatus::Created);

        let live = &gw.entities(Kind::Folders)[0];
        assert_eq!(live.goid.as_str().len(), 32);
        assert!(live.checksum.is_some());
        assert_eq!(gw.applied_kinds(), &[Kind::Folders]);
    }

    #[test]
    fn test_supplied_goid_is_kept_unless_taken() {
        let mut gw = MemoryGateway::new();
        let goid = Goid::new("abc123").unwrap();
        let record = EntityRecord::new(Kind::Secrets, properties([("name", "db")]))
            .with_goid(goid.clone());
        let statuses = apply(
            &mut gw,
            Kind::Secrets,
            &[
                Mutation::Create { record: record.clone() },
                Mutation::Create { record },
            ],
        );
        assert_eq!(statuses[0].status, MutationStatus::Created);
        assert_eq!(gw.entities(Kind::Secrets)[0].goid, goid);
        assert_eq!(statuses[1].status, MutationStatus::Error);
        assert!(statuses[1].description.contains("already in use"));
    }

    #[test]
    fn test_dangling_reference_is_entity_error() {
        let mut gw = MemoryGateway::new();
        gw.seed(Kind::Folders, properties([("name", "Root/API")]));
        let statuses = apply(
            &mut gw,
            Kind::Services,
            &[
                create(
                    Kind::Services,
                    properties([("name", "a"), ("folderPath", "Root/API")]),
                ),
                create(
                    Kind::Services,
                    properties([("name", "b"), ("folderPath", "Root/Missing")]),
                ),
            ],
        );
        assert_eq!(statuses[0].status, MutationStatus::Created);
        assert_eq!(statuses[1].status, MutationStatus::Error);
        assert_eq!(statuses[1].description, "referenced folders 'Root/Missing' not found");
        assert_eq!(gw.entities(Kind::Services).len(), 1);
    }

    #[test]
    fn test_update_replaces_properties() {
        let mut gw = MemoryGateway::new();
        let goid = gw.seed(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "30")]),
        );
        let record = EntityRecord::new(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "60")]),
        );
        let statuses = apply(
            &mut gw,
            Kind::ClusterProperties,
            &[Mutation::Update { goid: goid.clone(), record }],
        );
        assert_eq!(statuses[0].status, MutationStatus::Updated);
        let live = &gw.entities(Kind::ClusterProperties)[0];
        assert_eq!(live.goid, goid);
        assert_eq!(live.property("value").and_then(|v| v.as_str()), Some("60"));
    }

    #[test]
    fn test_update_of_missing_goid_fails() {
        let mut gw = MemoryGateway::new();
        let record = EntityRecord::new(Kind::Secrets, properties([("name", "db")]));
        let statuses = apply(
            &mut gw,
            Kind::Secrets,
            &[Mutation::Update { goid: Goid::new("nope").unwrap(), record }],
        );
        assert_eq!(statuses[0].status, MutationStatus::Error);
        assert!(statuses[0].description.starts_with("not found"));
    }

    #[test]
    fn test_referenced_entity_cannot_be_deleted() {
        let mut gw = MemoryGateway::new();
        let folder = gw.seed(Kind::Folders, properties([("name", "Root/API")]));
        gw.seed(Kind::Services, properties([("name", "svc1"), ("folderPath", "Root/API")]));

        let record = EntityRecord::new(Kind::Folders, properties([("name", "Root/API")]))
            .with_action(MutationAction::Delete);
        let statuses = apply(
            &mut gw,
            Kind::Folders,
            &[Mutation::Delete { goid: folder, record }],
        );
        assert_eq!(statuses[0].status, MutationStatus::Error);
        assert!(statuses[0].description.starts_with("still referenced by services"));
        assert_eq!(gw.entities(Kind::Folders).len(), 1);
    }

    #[test]
    fn test_delete_removes_entity() {
        let mut gw = MemoryGateway::new();
        let goid = gw.seed(Kind::Secrets, properties([("name", "db")]));
        let record = EntityRecord::new(Kind::Secrets, properties([("name", "db")]))
            .with_action(MutationAction::Delete);
        let statuses = apply(&mut gw, Kind::Secrets, &[Mutation::Delete { goid, record }]);
        assert_eq!(statuses[0].status, MutationStatus::Deleted);
        assert!(gw.entities(Kind::Secrets).is_empty());
    }

    #[test]
    fn test_injected_fault_and_cancellation() {
        let mut gw = MemoryGateway::new();
        gw.fail_kind(Kind::Keys, TransportError::connection("reset by peer"));
        assert_eq!(
            gw.list(Kind::Keys, &CallOptions::default()),
            Err(TransportError::connection("reset by peer"))
        );
        assert!(gw.list(Kind::Folders, &CallOptions::default()).is_ok());

        let cancel = CancelToken::new();
        cancel.cancel();
        let call = CallOptions::new(None, cancel);
        assert_eq!(gw.apply(Kind::Folders, &[], &call), Err(TransportError::Cancelled));
        assert!(gw.applied_kinds().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut gw = MemoryGateway::new();
        gw.seed(Kind::Folders, properties([("name", "Root/API")]));
        gw.fail_kind(Kind::Folders, TransportError::Timeout);

        let json = serde_json::to_string(&gw).unwrap();
        let restored: MemoryGateway = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entities(Kind::Folders), gw.entities(Kind::Folders));
        // faults are runtime-only
        assert!(restored.list(Kind::Folders, &CallOptions::default()).is_ok());

        // the counter survives, so new goids never collide
        let mut restored = restored;
        let next = restored.seed(Kind::Folders, properties([("name", "Root/B")]));
        assert_ne!(next, gw.entities(Kind::Folders)[0].goid);
    }
}
