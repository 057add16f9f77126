//! Dependency ordering of kinds
//!
//! Edges come from the catalog: a kind depends on every kind its checked
//! references point at, plus its declared order-only prerequisites. The
//! application order is a topological sort (Kahn's algorithm) that always
//! picks the earliest-declared ready kind, so the order is deterministic.

use crate::catalog::{Catalog, Kind};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Static dependency graph over all kinds
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// kind -> kinds it depends on
    dependencies: BTreeMap<Kind, BTreeSet<Kind>>,
    /// kind -> kinds that depend on it
    dependents: BTreeMap<Kind, BTreeSet<Kind>>,
}

impl DependencyGraph {
    /// Build the graph for every kind in the catalog
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut graph = Self::default();
        for &kind in Kind::ALL {
            let deps: BTreeSet<Kind> = catalog.prerequisites(kind).into_iter().collect();
            for &dep in &deps {
                graph.dependents.entry(dep).or_default().insert(kind);
            }
            graph.dependents.entry(kind).or_default();
            graph.dependencies.insert(kind, deps);
        }
        graph
    }

    /// Kinds `kind` must wait for
    pub fn dependencies_of(&self, kind: Kind) -> impl Iterator<Item = Kind> + '_ {
        self.dependencies.get(&kind).into_iter().flatten().copied()
    }

    /// Kinds waiting for `kind`
    pub fn dependents_of(&self, kind: Kind) -> impl Iterator<Item = Kind> + '_ {
        self.dependents.get(&kind).into_iter().flatten().copied()
    }

    /// Order every kind, prerequisites first
    ///
    /// Returns [`Error::DependencyCycle`] naming the kinds left unordered.
    pub fn topological_sort(&self) -> Result<Vec<Kind>> {
        let mut remaining: BTreeMap<Kind, usize> = self
            .dependencies
            .iter()
            .map(|(kind, deps)| (*kind, deps.len()))
            .collect();

        let mut ready: BTreeSet<Kind> = remaining
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(kind, _)| *kind)
            .collect();

        let mut order = Vec::with_capacity(remaining.len());
        while let Some(kind) = ready.pop_first() {
            remaining.remove(&kind);
            order.push(kind);
            for dependent in self.dependents_of(kind) {
                if let Some(degree) = remaining.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            return Err(Error::DependencyCycle {
                kinds: remaining.into_keys().collect(),
            });
        }
        Ok(order)
    }

    /// Order a subset of kinds, keeping the global relative order
    pub fn order_for(&self, kinds: impl IntoIterator<Item = Kind>) -> Result<Vec<Kind>> {
        let wanted: BTreeSet<Kind> = kinds.into_iter().collect();
        Ok(self
            .topological_sort()?
            .into_iter()
            .filter(|kind| wanted.contains(kind))
            .collect())
    }
}
