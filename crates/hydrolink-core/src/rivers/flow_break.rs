//! Flow-break resolution: places every flow-altering node on the river it
//! modifies and tells the main river apart from a tributary.

use std::collections::HashMap;

use geo::{LineString, Point};
use serde::{Deserialize, Serialize};

use super::projection::LineProjector;
use crate::diagnostics::{Diagnostics, Scope};
use crate::network::{ArcId, FeatureKind, Node, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    TributaryInflow,
    CatchmentInflow,
    RiverWithdrawal,
    DiversionOutflow,
}

impl BreakKind {
    pub fn from_feature(kind: FeatureKind) -> Option<Self> {
        match kind {
            FeatureKind::TributaryInflow => Some(BreakKind::TributaryInflow),
            FeatureKind::CatchmentInflowNode => Some(BreakKind::CatchmentInflow),
            FeatureKind::RiverWithdrawal => Some(BreakKind::RiverWithdrawal),
            FeatureKind::DiversionOutflow => Some(BreakKind::DiversionOutflow),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BreakKind::TributaryInflow => "tributary inflow",
            BreakKind::CatchmentInflow => "catchment inflow node",
            BreakKind::RiverWithdrawal => "river withdrawal",
            BreakKind::DiversionOutflow => "diversion outflow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiverPosition {
    pub river: ArcId,
    /// Along-line distance from the river's first vertex.
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakNode {
    pub node_id: NodeId,
    pub name: String,
    pub kind: BreakKind,
    pub x: f64,
    pub y: f64,
    pub main: Option<RiverPosition>,
    /// Tributary joining at this node; only tributary inflows carry one.
    pub secondary: Option<RiverPosition>,
}

impl BreakNode {
    pub fn is_resolved(&self) -> bool {
        self.main.is_some()
    }

    /// Landed on no named river at all, neither as main nor as tributary.
    pub fn is_unplaced(&self) -> bool {
        self.main.is_none() && self.secondary.is_none()
    }
}

/// Order-insensitive similarity in `[0, 1]`: twice the size of the shared
/// character multiset over the total length.  Reordered words score 1.
pub fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut shared = 0usize;
    for c in a.chars() {
        if let Some(n) = available.get_mut(&c).filter(|n| **n > 0) {
            *n -= 1;
            shared += 1;
        }
    }
    2.0 * shared as f64 / total as f64
}

/// Outcome of comparing a tributary inflow's name with `"<river> Inflow"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TributaryMatch {
    Exact,
    /// Close enough to claim the river as tributary; carries the similarity.
    Tolerated(f64),
    /// The river is the node's main river.
    Main,
}

pub fn match_tributary(node_name: &str, river_name: &str, threshold: f64) -> TributaryMatch {
    let expected = format!("{river_name} Inflow");
    if node_name == expected {
        return TributaryMatch::Exact;
    }
    let ratio = similarity(node_name, &expected);
    if ratio >= threshold {
        TributaryMatch::Tolerated(ratio)
    } else {
        TributaryMatch::Main
    }
}

/// Accumulates break nodes during the node pass and resolves them against each
/// river arc as the arc pass reaches it.
pub struct FlowBreakResolver<'a> {
    projector: &'a dyn LineProjector,
    threshold: f64,
    pending: Vec<BreakNode>,
}

impl<'a> FlowBreakResolver<'a> {
    pub fn new(projector: &'a dyn LineProjector, threshold: f64) -> Self {
        Self { projector, threshold, pending: Vec::new() }
    }

    /// Queues a flow-altering node.  Unnamed nodes and other kinds are
    /// ignored; returns whether the node was queued.
    pub fn register(&mut self, node: &Node) -> bool {
        let Some(kind) = BreakKind::from_feature(node.kind) else {
            return false;
        };
        let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) else {
            tracing::debug!(node = %node.id, kind = %node.kind, "unnamed flow-altering node skipped");
            return false;
        };
        self.pending.push(BreakNode {
            node_id: node.id,
            name: name.to_string(),
            kind,
            x: node.x,
            y: node.y,
            main: None,
            secondary: None,
        });
        true
    }

    /// Tests every queued node against one named river arc.  A later river
    /// overrides an earlier one for the same slot.
    pub fn observe_river(
        &mut self,
        river: ArcId,
        river_name: &str,
        line: &LineString<f64>,
        diagnostics: &mut Diagnostics,
    ) {
        for node in &mut self.pending {
            let hit = self.projector.project(line, Point::new(node.x, node.y));
            if !hit.on_line {
                continue;
            }
            let position = RiverPosition { river, distance: hit.distance_from_start };

            if node.kind != BreakKind::TributaryInflow {
                node.main = Some(position);
                continue;
            }
            match match_tributary(&node.name, river_name, self.threshold) {
                TributaryMatch::Exact => node.secondary = Some(position),
                TributaryMatch::Tolerated(ratio) => {
                    diagnostics.warn(
                        Scope::Network,
                        format!(
                            "tributary inflow [{}] has a name slightly different from the river it joins [{}] (similarity {:.2})",
                            node.name, river_name, ratio
                        ),
                    );
                    node.secondary = Some(position);
                }
                TributaryMatch::Main => node.main = Some(position),
            }
        }
    }

    /// Ends the arc pass.  Nodes that never landed on a named river are
    /// reported; all nodes are returned, resolved or not.
    pub fn finish(self, diagnostics: &mut Diagnostics) -> Vec<BreakNode> {
        for node in self.pending.iter().filter(|n| !n.is_resolved()) {
            if !node.is_unplaced() {
                tracing::debug!(node = %node.node_id, name = %node.name, "tributary inflow with no main river");
                continue;
            }
            diagnostics.warn(
                Scope::River,
                format!(
                    "{} node [{}] (ObjID={}) does not lie on any named river; it will not split a river",
                    node.kind.label(), node.name, node.node_id
                ),
            );
        }
        tracing::info!(
            resolved = self.pending.iter().filter(|n| n.is_resolved()).count(),
            total = self.pending.len(),
            "flow-break nodes resolved"
        );
        self.pending
    }
}
