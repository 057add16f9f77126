//! `order` and `kinds` - inspect the built-in entity catalog

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::{Bundle, Catalog, DependencyGraph, Kind};
use std::fs;
use std::path::Path;

use crate::commands::apply::parse_kinds;
use crate::ui;

/// Print the application order, for every kind or for a bundle's kinds
pub fn order(bundle: Option<&Path>) -> Result<()> {
    let catalog = Catalog::builtin();
    let graph = DependencyGraph::from_catalog(&catalog);

    let order = match bundle {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read bundle: {}", path.display()))?;
            let bundle = Bundle::from_json(&content)
                .with_context(|| format!("Invalid bundle: {}", path.display()))?;
            graph.order_for(bundle.kinds())?
        }
        None => graph.topological_sort()?,
    };

    ui::header("Application order");
    let total = order.len();
    for (i, kind) in order.iter().enumerate() {
        let deps: Vec<String> = graph.dependencies_of(*kind).map(|k| k.to_string()).collect();
        if deps.is_empty() {
            ui::step(i + 1, total, kind.key());
        } else {
            ui::step(
                i + 1,
                total,
                &format!(
                    "{} {}",
                    kind.key(),
                    format!("after {}", deps.join(", ")).dimmed()
                ),
            );
        }
    }
    Ok(())
}

/// Print identity rules and dependencies per kind
pub fn kinds(filter: &[String]) -> Result<()> {
    let catalog = Catalog::builtin();
    let graph = DependencyGraph::from_catalog(&catalog);
    let selected = parse_kinds(filter)?;

    for &kind in Kind::ALL {
        if selected.as_ref().is_some_and(|s| !s.contains(&kind)) {
            continue;
        }
        print_kind(&catalog, &graph, kind);
    }
    Ok(())
}

fn print_kind(catalog: &Catalog, graph: &DependencyGraph, kind: Kind) {
    let spec = catalog.spec(kind);
    ui::section(kind.key());
    ui::kv("identity", &spec.identity.fields().join(" + "));

    if !spec.no_effect.is_empty() {
        ui::kv("ignored for drift", &spec.no_effect.join(", "));
    }
    for reference in spec.references {
        ui::kv(
            "references",
            &format!(
                "{} -> {}.{}",
                reference.field, reference.target, reference.target_field
            ),
        );
    }

    let dependents: Vec<String> = graph.dependents_of(kind).map(|k| k.to_string()).collect();
    if !dependents.is_empty() {
        ui::kv("needed by", &dependents.join(", "));
    }
}
