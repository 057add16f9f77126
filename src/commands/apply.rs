//! `apply` and `plan` - reconcile a bundle against the gateway snapshot

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use reconcile::{
    Bundle, Catalog, ExecuteOptions, Kind, KindOutcome, MemoryGateway, NameValue, NoProgress,
    PropertyValue, RunReport, RunResult, execute,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::Context;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::progress::KindProgress;
use crate::snapshot;
use crate::ui;

/// Apply a bundle; returns the run verdict so `main` can set the exit status
pub fn apply(ctx: &Context, args: &RunArgs, dry_run: bool, yes: bool) -> Result<RunResult> {
    let config = Config::load()?;
    let bundle = load_bundle(&args.bundle)?;
    let snapshot_path = match &args.snapshot {
        Some(path) => path.clone(),
        None => config.snapshot_path()?,
    };
    let mut gateway = snapshot::load(&snapshot_path)?;
    let catalog = Catalog::builtin();

    let opts = ExecuteOptions {
        dry_run,
        kinds: parse_kinds(&args.kinds)?,
        timeout: args.timeout.map(Duration::from_secs).or(config.timeout()),
        ..ExecuteOptions::default()
    };

    if !ctx.quiet {
        ui::header(if dry_run { "Plan" } else { "Apply" });
        ui::kv("bundle", &args.bundle.display().to_string());
        ui::kv("snapshot", &snapshot_path.display().to_string());
        ui::kv("entities", &bundle.len().to_string());
    }

    if !dry_run && config.confirm && !yes && !confirm_changes(&catalog, &gateway, &bundle, &opts)? {
        ui::warn("Aborted, nothing applied");
        return Ok(RunResult::Success);
    }

    let mut progress = KindProgress::new(ctx.quiet);
    let report = execute(&catalog, &mut gateway, &bundle, &opts, &mut progress)?;
    progress.finish();

    if !dry_run {
        snapshot::save(&snapshot_path, &gateway)?;
    }

    if !ctx.quiet {
        print_report(&report, ctx.verbose > 0);
        if dry_run {
            ui::info("Dry run, snapshot not modified");
        } else {
            ui::success(&format!("Snapshot saved to {}", snapshot_path.display()));
        }
    }

    if let Some(path) = &args.report {
        let json = report.to_json_pretty().context("Failed to serialize run report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("Wrote report to {}", path.display());
    }

    Ok(report.result())
}

/// Dry run against a copy of the gateway and ask before the real run
fn confirm_changes(
    catalog: &Catalog,
    gateway: &MemoryGateway,
    bundle: &Bundle,
    opts: &ExecuteOptions,
) -> Result<bool> {
    let preview_opts = ExecuteOptions {
        dry_run: true,
        ..opts.clone()
    };
    let preview = execute(
        catalog,
        &mut gateway.clone(),
        bundle,
        &preview_opts,
        &mut NoProgress,
    )?;
    let totals = preview.totals();
    if totals.total_changes() == 0 {
        return Ok(true);
    }

    println!();
    println!(
        "  {} to create, {} to update, {} to delete, {} unchanged",
        totals.created.to_string().green(),
        totals.updated.to_string().yellow(),
        totals.deleted.to_string().magenta(),
        totals.used_existing
    );
    if totals.error > 0 {
        println!("  {} entities will fail", totals.error.to_string().red());
    }
    println!();

    confirm_proceed()
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply changes?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn load_bundle(path: &Path) -> Result<Bundle> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle: {}", path.display()))?;
    Bundle::from_json(&content)
        .with_context(|| format!("Invalid bundle: {}", path.display()))
}

/// Parse `--kinds`; empty means every kind
pub fn parse_kinds(names: &[String]) -> Result<Option<BTreeSet<Kind>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut kinds = BTreeSet::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        kinds.insert(name.parse::<Kind>()?);
    }
    if kinds.is_empty() {
        bail!("--kinds needs at least one kind name");
    }
    Ok(Some(kinds))
}

/// Print the per-kind results and the final summary
fn print_report(report: &RunReport, verbose: bool) {
    for kind in &report.kinds {
        let totals = kind.totals();
        match &kind.outcome {
            KindOutcome::Completed => ui::section(&format!("{} ({})", kind.kind, totals.total())),
            KindOutcome::TransportFailed { error } => {
                ui::section(&format!("{} {}", kind.kind, "(not applied)".red()));
                ui::error(&error.to_string());
                continue;
            }
        }

        for entity in &kind.entities {
            let status = entity.status.status;
            if !verbose && !status.is_change() && !status.is_error() {
                continue;
            }
            println!(
                "  {} {} {}",
                ui::status_icon(status),
                ui::status_label(status),
                entity.entity
            );
            if status.is_error() || verbose {
                ui::dim(&entity.status.description);
            }
            for (name, change) in diff_lines(&entity.status.source, &entity.status.target) {
                ui::kv(name, &change);
            }
        }
        if !verbose && totals.total_changes() == 0 && totals.error == 0 {
            ui::dim("no changes");
        }
    }

    print_summary(report);
}

/// Pair bundle and live values by field name as `live -> bundle`
///
/// A field present on one side only shows `(none)` for the other.
fn diff_lines<'a>(source: &'a [NameValue], target: &'a [NameValue]) -> Vec<(&'a str, String)> {
    let mut fields: BTreeMap<&str, (Option<&PropertyValue>, Option<&PropertyValue>)> =
        BTreeMap::new();
    for nv in source {
        fields.entry(nv.name.as_str()).or_default().0 = Some(&nv.value);
    }
    for nv in target {
        fields.entry(nv.name.as_str()).or_default().1 = Some(&nv.value);
    }

    let render = |value: Option<&PropertyValue>| {
        value.map_or_else(|| "(none)".to_string(), ToString::to_string)
    };
    fields
        .into_iter()
        .map(|(name, (desired, live))| (name, format!("{} -> {}", render(live), render(desired))))
        .collect()
}

/// Print final summary
fn print_summary(report: &RunReport) {
    let totals = report.totals();
    println!();
    match report.result() {
        RunResult::Success if report.dry_run => {
            println!("  {} Plan complete", "✓".green().bold());
        }
        RunResult::Success => {
            println!("  {} Bundle applied successfully!", "✓".green().bold());
        }
        RunResult::Partial => {
            println!("  {} Bundle applied with errors", "⚠".yellow().bold());
        }
    }

    if totals.created > 0 {
        println!("    • {} created", totals.created);
    }
    if totals.updated > 0 {
        println!("    • {} updated", totals.updated);
    }
    if totals.deleted > 0 {
        println!("    • {} deleted", totals.deleted);
    }
    if totals.used_existing > 0 {
        println!("    • {} unchanged", totals.used_existing);
    }
    if totals.ignored > 0 {
        println!("    • {} ignored", totals.ignored);
    }
    if totals.error > 0 {
        println!("    • {} {}", totals.error, "failed".red());
    }
    for (kind, error) in report.failed_kinds() {
        println!("    • {} {}: {}", kind, "not applied".red(), error);
    }

    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        ui::dim(&format!("finished in {} ms", elapsed.num_milliseconds()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(parse_kinds(&[]).unwrap(), None);

        let kinds = parse_kinds(&["services".into(), " Folders ".into()]).unwrap().unwrap();
        assert_eq!(
            kinds.into_iter().collect::<Vec<_>>(),
            vec![Kind::Folders, Kind::Services]
        );

        assert!(parse_kinds(&["widgets".into()]).is_err());
        assert!(parse_kinds(&[String::new()]).is_err());
    }

    #[test]
    fn test_diff_lines_align_fields_by_name() {
        let source = vec![
            NameValue::new("description", "primary"),
            NameValue::new("value", "60"),
        ];
        let target = vec![
            NameValue::new("secretType", "PASSWORD"),
            NameValue::new("value", "30"),
        ];

        assert_eq!(
            diff_lines(&source, &target),
            vec![
                ("description", "(none) -> primary".to_string()),
                ("secretType", "PASSWORD -> (none)".to_string()),
                ("value", "30 -> 60".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_bundle_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(&path, r#"{ "folders": [ { "name": "Root/API" } ] }"#).unwrap();
        assert_eq!(load_bundle(&path).unwrap().len(), 1);

        fs::write(&path, r#"{ "widgets": [] }"#).unwrap();
        let err = load_bundle(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid bundle"));
    }

    #[test]
    fn test_apply_persists_snapshot_and_report() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("bundle.json");
        let snapshot_path = dir.path().join("snapshot.json");
        let report_path = dir.path().join("report.json");
        fs::write(
            &bundle,
            r#"{
                "folders": [ { "name": "Root/API" } ],
                "services": [ { "name": "svc1", "folderPath": "Root/API" } ]
            }"#,
        )
        .unwrap();

        let ctx = Context {
            verbose: 0,
            quiet: true,
        };
        let args = RunArgs {
            bundle,
            snapshot: Some(snapshot_path.clone()),
            kinds: Vec::new(),
            timeout: None,
            report: Some(report_path.clone()),
        };

        let result = apply(&ctx, &args, false, true).unwrap();
        assert_eq!(result, RunResult::Success);
        assert_eq!(snapshot::load(&snapshot_path).unwrap().len(), 2);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["result"], "SUCCESS");
        assert_eq!(report["totals"]["created"], 2);

        // a dry run leaves the snapshot alone
        let plan_args = RunArgs {
            snapshot: Some(dir.path().join("other.json")),
            report: None,
            ..args
        };
        apply(&ctx, &plan_args, true, false).unwrap();
        assert!(!dir.path().join("other.json").exists());
    }
}
