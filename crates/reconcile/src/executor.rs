//! Execution engine - applies a bundle kind by kind in dependency order

use crate::bundle::Bundle;
use crate::catalog::{Catalog, Kind};
use crate::context::{CallOptions, CancelToken, NoProgress, ProgressCallback};
use crate::entity::{EntityRecord, EntityRef};
use crate::error::{Result, TransportError};
use crate::gateway::{Gateway, Mutation};
use crate::matcher::Matcher;
use crate::orderer::DependencyGraph;
use crate::report::{EntityReport, KindReport, RunReport};
use crate::resolver::{PlanStep, plan_entity, reject_duplicate_keys};
use crate::types::{DetailedStatus, MutationStatus};
use std::collections::BTreeSet;
use std::time::Duration;

/// Options for a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Resolve and report, but never call `apply`
    pub dry_run: bool,
    /// Only apply these kinds; None applies every kind in the bundle
    pub kinds: Option<BTreeSet<Kind>>,
    /// Per-call timeout
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl ExecuteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn includes(&self, kind: Kind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Reconcile a bundle against a gateway
///
/// # Type Parameters
/// * `G` - Gateway transport
/// * `P` - Progress callback type
///
/// # Arguments
/// * `catalog` - Identity and dependency rules
/// * `gateway` - Remote side; listed once and applied once per kind
/// * `bundle` - Desired state
/// * `opts` - Dry run, kind filter, timeout and cancellation
/// * `progress` - Progress callback
///
/// # Returns
/// The run report. Only a catalog dependency cycle is an `Err`; transport
/// failures and per-entity errors are recorded in the report.
pub fn execute<G, P>(
    catalog: &Catalog,
    gateway: &mut G,
    bundle: &Bundle,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunReport>
where
    G: Gateway,
    P: ProgressCallback,
{
    let graph = DependencyGraph::from_catalog(catalog);
    let order = graph.order_for(bundle.kinds().filter(|k| opts.includes(*k)))?;

    log::info!(
        "Reconciling {} kind(s) against {}{}",
        order.len(),
        gateway.name(),
        if opts.dry_run { " (dry run)" } else { "" }
    );
    progress.on_run_start(&order);

    let mut report = RunReport::begin(opts.dry_run);
    for kind in order {
        let records = bundle.batch(kind);
        progress.on_kind_start(kind, records.len());

        let kind_report = if opts.cancel.is_cancelled() {
            log::warn!("Run cancelled, not applying {kind}");
            KindReport::transport_failed(kind, TransportError::Cancelled)
        } else {
            apply_kind(catalog, gateway, kind, records, opts, progress)
        };

        progress.on_kind_complete(&kind_report);
        report.push_kind(kind_report);
    }
    report.finish();

    log::info!("Run finished: {:?}", report.result());
    Ok(report)
}

/// Resolve and apply one kind's batch
fn apply_kind<G, P>(
    catalog: &Catalog,
    gateway: &mut G,
    kind: Kind,
    records: &[EntityRecord],
    opts: &ExecuteOptions,
    progress: &mut P,
) -> KindReport
where
    G: Gateway,
    P: ProgressCallback,
{
    let call = CallOptions::new(opts.timeout, opts.cancel.clone());

    let live = match gateway.list(kind, &call) {
        Ok(live) => live,
        Err(e) => {
            log::warn!("Listing {kind} failed: {e}");
            return KindReport::transport_failed(kind, e);
        }
    };

    let matcher = Matcher::new(catalog, kind, &live);
    let spec = catalog.spec(kind);
    let mut steps: Vec<PlanStep> = records
        .iter()
        .map(|record| plan_entity(spec, &matcher, record))
        .collect();
    reject_duplicate_keys(catalog, records, &mut steps);

    let statuses = if opts.dry_run {
        steps
            .iter()
            .zip(records)
            .map(|(step, record)| step.local_status(record.effective_action(), true))
            .collect()
    } else {
        match submit(gateway, kind, &steps, records, &call) {
            Ok(statuses) => statuses,
            Err(e) => {
                log::warn!("Applying {kind} failed: {e}");
                return KindReport::transport_failed(kind, e);
            }
        }
    };

    let mut entities = Vec::with_capacity(records.len());
    for ((record, step), status) in records.iter().zip(&steps).zip(statuses) {
        let mut entity = EntityRef::of(record, catalog);
        if entity.goid.is_none() {
            entity.goid = step.goid().cloned();
        }
        log::debug!("{entity}: {} ({})", status.status, status.description);

        let report = EntityReport { entity, status };
        progress.on_entity_complete(kind, &report);
        entities.push(report);
    }
    KindReport::completed(kind, entities)
}

/// Submit the mutation steps as one batch and merge the reply back in order
fn submit<G: Gateway>(
    gateway: &mut G,
    kind: Kind,
    steps: &[PlanStep],
    records: &[EntityRecord],
    call: &CallOptions,
) -> std::result::Result<Vec<DetailedStatus>, TransportError> {
    let mutations: Vec<Mutation> = steps
        .iter()
        .zip(records)
        .filter_map(|(step, record)| step.mutation(record))
        .collect();

    let replies = if mutations.is_empty() {
        log::debug!("Nothing to submit for {kind}");
        Vec::new()
    } else {
        log::info!("Applying {} {kind} mutation(s)", mutations.len());
        let replies = gateway.apply(kind, &mutations, call)?;
        if replies.len() != mutations.len() {
            return Err(TransportError::protocol(format!(
                "{kind}: submitted {} entities, received {} statuses",
                mutations.len(),
                replies.len()
            )));
        }
        replies
    };

    let mut replies = replies.into_iter();
    Ok(steps
        .iter()
        .zip(records)
        .map(|(step, record)| {
            let action = record.effective_action();
            if !step.is_mutation() {
                return step.local_status(action, false);
            }
            match replies.next() {
                Some(status) => with_plan_diff(step, status),
                None => DetailedStatus::error(action, "no status returned"),
            }
        })
        .collect())
}

/// Attach the resolver's field diff when the gateway reply carries none
fn with_plan_diff(step: &PlanStep, status: DetailedStatus) -> DetailedStatus {
    let wants_diff = matches!(status.status, MutationStatus::Updated | MutationStatus::Error);
    match step {
        PlanStep::Update { diff, .. }
            if wants_diff && status.source.is_empty() && status.target.is_empty() =>
        {
            status.with_diff(diff.source.clone(), diff.target.clone())
        }
        _ => status,
    }
}

/// Simple execution without progress reporting
///
/// For basic use cases: default options, builtin behaviour.
pub fn execute_simple<G: Gateway>(
    catalog: &Catalog,
    gateway: &mut G,
    bundle: &Bundle,
) -> Result<RunReport> {
    execute(
        catalog,
        gateway,
        bundle,
        &ExecuteOptions::default(),
        &mut NoProgress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::LiveEntity;
    use crate::memory::MemoryGateway;
    use crate::report::{KindOutcome, RunResult};
    use crate::types::{Checksum, MutationAction, Properties, properties};
    use serde_json::json;

    fn record(kind: Kind, props: Properties) -> EntityRecord {
        EntityRecord::new(kind, props)
    }

    fn scenario_a() -> Bundle {
        let mut service = properties([("name", "svc1"), ("folderPath", "Root/API")]);
        service.insert("policy".into(), json!({ "xml": "<policy/>" }).into());
        Bundle::new()
            .with(record(Kind::Folders, properties([("name", "Root/API")])))
            .with(record(Kind::Services, service))
    }

    #[test]
    fn test_rerun_uses_existing() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let bundle = scenario_a();

        let first = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(first.statuses(Kind::Folders), vec![MutationStatus::Created]);
        assert_eq!(first.statuses(Kind::Services), vec![MutationStatus::Created]);
        assert_eq!(first.result(), RunResult::Success);

        let second = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(second.statuses(Kind::Folders), vec![MutationStatus::UsedExisting]);
        assert_eq!(second.statuses(Kind::Services), vec![MutationStatus::UsedExisting]);
        assert_eq!(second.totals().created, 0);
        assert_eq!(gw.len(), 2);
    }

    #[test]
    fn test_duplicate_names_in_bundle_converge() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let bundle = Bundle::new()
            .with(record(Kind::Folders, properties([("name", "Root")])))
            .with(record(Kind::Folders, properties([("name", "Root")])));

        let first = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            first.statuses(Kind::Folders),
            vec![MutationStatus::Created, MutationStatus::Error]
        );
        assert_eq!(
            first.errors()[0].description,
            "duplicate natural key in bundle: name=Root"
        );
        assert_eq!(gw.entities(Kind::Folders).len(), 1);

        // the surviving record matches on every later run
        let second = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            second.statuses(Kind::Folders),
            vec![MutationStatus::UsedExisting, MutationStatus::Error]
        );
        assert_eq!(gw.entities(Kind::Folders).len(), 1);
    }

    #[test]
    fn test_rerun_after_update_uses_existing() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.seed(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "30")]),
        );
        let bundle = Bundle::new().with(record(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "60")]),
        ));

        let first = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(first.statuses(Kind::ClusterProperties), vec![MutationStatus::Updated]);

        let second = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            second.statuses(Kind::ClusterProperties),
            vec![MutationStatus::UsedExisting]
        );
        assert_eq!(second.totals().total_changes(), 0);
        assert!(second.is_success());
    }

    #[test]
    fn test_rerun_after_update_with_checksum_uses_existing() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.seed(Kind::Secrets, properties([("name", "db"), ("description", "old")]));
        let bundle = Bundle::new().with(
            record(Kind::Secrets, properties([("name", "db"), ("description", "new")]))
                .with_checksum(Checksum::new("producer-v2").unwrap()),
        );

        let first = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(first.statuses(Kind::Secrets), vec![MutationStatus::Updated]);
        let stored = &gw.entities(Kind::Secrets)[0];
        assert_eq!(stored.checksum.as_ref().map(Checksum::as_str), Some("producer-v2"));

        let second = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(second.statuses(Kind::Secrets), vec![MutationStatus::UsedExisting]);
        assert_eq!(second.totals().total_changes(), 0);
        assert_eq!(gw.len(), 1);
    }

    #[test]
    fn test_delete_of_missing_cert_does_not_affect_other_kinds() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.seed(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "30")]),
        );

        let bundle = Bundle::new()
            .with(
                record(Kind::TrustedCerts, properties([("name", "cert-x")]))
                    .with_action(MutationAction::Delete),
            )
            .with(record(
                Kind::ClusterProperties,
                properties([("name", "io.timeout"), ("value", "60")]),
            ))
            .with(record(
                Kind::ClusterProperties,
                properties([("name", "log.level"), ("value", "INFO")]),
            ));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(report.statuses(Kind::TrustedCerts), vec![MutationStatus::Error]);
        assert_eq!(
            report.statuses(Kind::ClusterProperties),
            vec![MutationStatus::Updated, MutationStatus::Created]
        );

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].description.contains("not found"));
        assert_eq!(report.result(), RunResult::Partial);
        assert!(report.failed_kinds().is_empty());
    }

    #[test]
    fn test_statuses_keep_submission_order() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.seed(Kind::Folders, properties([("name", "Root/API")]));
        gw.seed(Kind::Secrets, properties([("name", "shared")]));
        gw.seed(Kind::Secrets, properties([("name", "shared")]));

        let bundle = Bundle::new()
            .with(record(
                Kind::Services,
                properties([("name", "a"), ("folderPath", "Root/API")]),
            ))
            .with(record(
                Kind::Services,
                properties([("name", "b"), ("folderPath", "Root/Gone")]),
            ))
            .with(
                record(
                    Kind::Services,
                    properties([("name", "c"), ("folderPath", "Root/API")]),
                )
                .with_action(MutationAction::Ignore),
            )
            .with(record(
                Kind::Services,
                properties([("name", "d"), ("folderPath", "Root/API")]),
            ))
            .with(record(Kind::Secrets, properties([("name", "shared")])))
            .with(record(Kind::Secrets, properties([("name", "other")])));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            report.statuses(Kind::Services),
            vec![
                MutationStatus::Created,
                MutationStatus::Error,
                MutationStatus::Ignored,
                MutationStatus::Created,
            ]
        );
        assert_eq!(
            report.statuses(Kind::Secrets),
            vec![MutationStatus::Error, MutationStatus::Created]
        );

        let names: Vec<String> = report
            .kind(Kind::Services)
            .unwrap()
            .entities
            .iter()
            .map(|e| e.entity.key.as_ref().unwrap().value_of("name").unwrap().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_transport_failure_is_isolated_to_its_kind() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.fail_kind(Kind::Keys, TransportError::connection("reset by peer"));

        let bundle = Bundle::new()
            .with(record(Kind::Keys, properties([("keystoreId", "ks1"), ("alias", "ssl")])))
            .with(record(
                Kind::ListenPorts,
                properties([("name", "https"), ("keyAlias", "ssl")]),
            ))
            .with(record(
                Kind::ClusterProperties,
                properties([("name", "a"), ("value", "1")]),
            ));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            report.failed_kinds(),
            vec![(Kind::Keys, &TransportError::connection("reset by peer"))]
        );
        assert_eq!(report.statuses(Kind::ClusterProperties), vec![MutationStatus::Created]);

        // later kinds still run and fail on the missing dependency
        assert_eq!(report.statuses(Kind::ListenPorts), vec![MutationStatus::Error]);
        assert_eq!(
            report.errors()[0].description,
            "referenced keys 'ssl' not found"
        );
        assert_eq!(report.result(), RunResult::Partial);
    }

    /// Drops the last status of every reply
    struct ShortReplies(MemoryGateway);

    impl Gateway for ShortReplies {
        fn list(
            &self,
            kind: Kind,
            call: &CallOptions,
        ) -> std::result::Result<Vec<LiveEntity>, TransportError> {
            self.0.list(kind, call)
        }

        fn apply(
            &mut self,
            kind: Kind,
            mutations: &[Mutation],
            call: &CallOptions,
        ) -> std::result::Result<Vec<DetailedStatus>, TransportError> {
            let mut statuses = self.0.apply(kind, mutations, call)?;
            statuses.pop();
            Ok(statuses)
        }
    }

    #[test]
    fn test_short_reply_is_protocol_error() {
        let catalog = Catalog::builtin();
        let mut gw = ShortReplies(MemoryGateway::new());
        let bundle = Bundle::new()
            .with(record(Kind::Secrets, properties([("name", "a")])))
            .with(record(Kind::Secrets, properties([("name", "b")])));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        let secrets = report.kind(Kind::Secrets).unwrap();
        assert!(secrets.entities.is_empty());
        match &secrets.outcome {
            KindOutcome::TransportFailed { error: TransportError::Protocol { message } } => {
                assert!(message.contains("submitted 2 entities, received 1 statuses"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Cancels the run once a given kind has been applied
    struct CancelAfter {
        inner: MemoryGateway,
        kind: Kind,
        cancel: CancelToken,
    }

    impl Gateway for CancelAfter {
        fn list(
            &self,
            kind: Kind,
            call: &CallOptions,
        ) -> std::result::Result<Vec<LiveEntity>, TransportError> {
            self.inner.list(kind, call)
        }

        fn apply(
            &mut self,
            kind: Kind,
            mutations: &[Mutation],
            call: &CallOptions,
        ) -> std::result::Result<Vec<DetailedStatus>, TransportError> {
            let statuses = self.inner.apply(kind, mutations, call)?;
            if kind == self.kind {
                self.cancel.cancel();
            }
            Ok(statuses)
        }
    }

    #[test]
    fn test_cancel_keeps_applied_kinds() {
        let catalog = Catalog::builtin();
        let cancel = CancelToken::new();
        let mut gw = CancelAfter {
            inner: MemoryGateway::new(),
            kind: Kind::Folders,
            cancel: cancel.clone(),
        };
        let opts = ExecuteOptions::default().with_cancel(cancel);

        let report = execute(&catalog, &mut gw, &scenario_a(), &opts, &mut NoProgress).unwrap();
        assert_eq!(report.statuses(Kind::Folders), vec![MutationStatus::Created]);
        assert_eq!(
            report.failed_kinds(),
            vec![(Kind::Services, &TransportError::Cancelled)]
        );
        // no rollback
        assert_eq!(gw.inner.entities(Kind::Folders).len(), 1);
        assert!(gw.inner.entities(Kind::Services).is_empty());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let opts = ExecuteOptions::dry_run();

        let report = execute(&catalog, &mut gw, &scenario_a(), &opts, &mut NoProgress).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.statuses(Kind::Folders), vec![MutationStatus::Created]);
        let folder = &report.kind(Kind::Folders).unwrap().entities[0];
        assert_eq!(folder.status.description, "dry run: would create");
        assert!(gw.is_empty());
        assert!(gw.applied_kinds().is_empty());
    }

    #[test]
    fn test_kinds_apply_in_dependency_order() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let bundle = Bundle::new()
            .with(record(
                Kind::JdbcConnections,
                properties([("name", "orders"), ("securePasswordName", "db")]),
            ))
            .with(record(
                Kind::Services,
                properties([("name", "svc"), ("folderPath", "Root")]),
            ))
            .with(record(Kind::Secrets, properties([("name", "db")])))
            .with(record(Kind::Folders, properties([("name", "Root")])));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert!(report.is_success());
        assert_eq!(
            gw.applied_kinds(),
            &[Kind::Folders, Kind::Secrets, Kind::JdbcConnections, Kind::Services]
        );
    }

    #[test]
    fn test_kind_filter() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let opts = ExecuteOptions::default().with_kinds([Kind::Folders]);

        let report = execute(&catalog, &mut gw, &scenario_a(), &opts, &mut NoProgress).unwrap();
        assert_eq!(report.kinds.len(), 1);
        assert_eq!(gw.applied_kinds(), &[Kind::Folders]);
    }

    #[test]
    fn test_update_reports_field_diff() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let goid = gw.seed(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "30")]),
        );
        let bundle = Bundle::new().with(record(
            Kind::ClusterProperties,
            properties([("name", "io.timeout"), ("value", "60")]),
        ));

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        let entity = &report.kind(Kind::ClusterProperties).unwrap().entities[0];
        assert_eq!(entity.status.status, MutationStatus::Updated);
        assert_eq!(entity.entity.goid.as_ref(), Some(&goid));
        assert_eq!(entity.status.source[0].name, "value");
        assert_eq!(entity.status.target[0].value.as_str(), Some("30"));
    }

    #[test]
    fn test_unchanged_batch_makes_no_apply_call() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        gw.seed(Kind::Folders, properties([("name", "Root")]));
        let bundle = Bundle::new()
            .with(record(Kind::Folders, properties([("name", "Root")])))
            .with(
                record(Kind::Folders, properties([("name", "Other")]))
                    .with_action(MutationAction::Ignore),
            );

        let report = execute_simple(&catalog, &mut gw, &bundle).unwrap();
        assert_eq!(
            report.statuses(Kind::Folders),
            vec![MutationStatus::UsedExisting, MutationStatus::Ignored]
        );
        assert!(gw.applied_kinds().is_empty());
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_run_start(&mut self, kinds: &[Kind]) {
            self.events.push(format!("run {}", kinds.len()));
        }
        fn on_kind_start(&mut self, kind: Kind, count: usize) {
            self.events.push(format!("start {kind} {count}"));
        }
        fn on_entity_complete(&mut self, _kind: Kind, entity: &EntityReport) {
            self.events.push(format!("entity {}", entity.status.status));
        }
        fn on_kind_complete(&mut self, report: &KindReport) {
            self.events.push(format!("done {}", report.kind));
        }
    }

    #[test]
    fn test_progress_events() {
        let catalog = Catalog::builtin();
        let mut gw = MemoryGateway::new();
        let mut progress = Recorder::default();
        execute(
            &catalog,
            &mut gw,
            &scenario_a(),
            &ExecuteOptions::default(),
            &mut progress,
        )
        .unwrap();
        assert_eq!(
            progress.events,
            [
                "run 2",
                "start folders 1",
                "entity CREATED",
                "done folders",
                "start services 1",
                "entity CREATED",
                "done services",
            ]
        );
    }
}
