//! Superposition check: two features sharing a grid cell should be joined by a
//! network link.
//!
//! For each configured `(base, secondary)` case a name → names map is built
//! once from the network links.  A cell fails a case when its base winner has
//! at least one qualifying link and its secondary winner is not among that
//! element's connections.  Failures are advisory only.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::config::ConnectivityCase;
use crate::diagnostics::{Diagnostics, Scope};
use crate::grid::{ConsolidatedGrid, LayerKind};
use crate::network::Network;

/// Base element name → names of the secondary elements it is linked to.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityMap {
    case: ConnectivityCase,
    connections: HashMap<String, BTreeSet<String>>,
}

impl ConnectivityMap {
    /// Keys are the base elements with at least one qualifying link.  Links
    /// count in either direction.
    pub fn build(network: &Network, case: ConnectivityCase) -> Self {
        let mut connections: HashMap<String, BTreeSet<String>> = HashMap::new();

        for link in network.links() {
            let (Some(src), Some(dst)) = (network.node(link.src), network.node(link.dst)) else {
                continue;
            };
            let pair = if src.kind == case.base && dst.kind == case.secondary {
                Some((src, dst))
            } else if src.kind == case.secondary && dst.kind == case.base {
                Some((dst, src))
            } else {
                None
            };
            if let Some((base, secondary)) = pair {
                connections
                    .entry(base.display_name().to_string())
                    .or_default()
                    .insert(secondary.display_name().to_string());
            }
        }
        Self { case, connections }
    }

    pub fn case(&self) -> ConnectivityCase {
        self.case
    }

    pub fn contains_base(&self, base: &str) -> bool {
        self.connections.contains_key(base)
    }

    pub fn connected(&self, base: &str) -> Option<&BTreeSet<String>> {
        self.connections.get(base)
    }

    /// A base element without qualifying links never fails.
    pub fn is_satisfied(&self, base: &str, secondary: &str) -> bool {
        match self.connections.get(base) {
            None => true,
            Some(set) => set.contains(secondary),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub case: ConnectivityCase,
    /// base → disconnected secondary → number of cells where they overlap.
    pub failures: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectivityReport {
    pub cases: Vec<CaseReport>,
}

impl ConnectivityReport {
    pub fn failure_count(&self) -> usize {
        self.cases
            .iter()
            .flat_map(|c| c.failures.values())
            .map(|secondaries| secondaries.len())
            .sum()
    }
}

pub fn check_connectivity(
    network: &Network,
    grid: &ConsolidatedGrid,
    cases: &[ConnectivityCase],
    diagnostics: &mut Diagnostics,
) -> ConnectivityReport {
    let mut report = ConnectivityReport::default();

    for &case in cases {
        let (Some(base_layer), Some(secondary_layer)) =
            (LayerKind::from_feature(case.base), LayerKind::from_feature(case.secondary))
        else {
            diagnostics.warn(
                Scope::Connectivity,
                format!(
                    "connectivity case {} - {} has no matching grid layers; skipped",
                    case.base, case.secondary
                ),
            );
            continue;
        };

        let map = ConnectivityMap::build(network, case);
        let mut failures: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

        for cell in grid.cells() {
            let (Some(b), Some(s)) = (cell.winner(base_layer), cell.winner(secondary_layer)) else {
                continue;
            };
            if !map.is_satisfied(b, s) {
                *failures
                    .entry(b.to_string())
                    .or_default()
                    .entry(s.to_string())
                    .or_default() += 1;
            }
        }

        for (base, secondaries) in &failures {
            let names: Vec<&str> = secondaries.keys().map(String::as_str).collect();
            diagnostics.warn(
                Scope::Connectivity,
                format!(
                    "element [{}] of type {} is not connected to elements [{}] of type {} it overlaps",
                    base,
                    case.base,
                    names.join(", "),
                    case.secondary
                ),
            );
        }
        tracing::info!(
            base = %case.base,
            secondary = %case.secondary,
            failing_elements = failures.len(),
            "connectivity case checked"
        );
        report.cases.push(CaseReport { case, failures });
    }
    report
}
