//! River segmentation tree.
//!
//! Arena of tree nodes: a synthetic root, one node per river that carries at
//! least one break node, and the break nodes below their main river in
//! ascending distance.  Walking it yields the segment list of every river.

use std::collections::HashMap;

use serde::Serialize;

use super::flow_break::{BreakKind, BreakNode, RiverPosition};
use super::segments::{Offset, Segment, SegmentPlan};
use crate::network::{ArcId, Network, NodeId, River, RiverKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TreeLabel {
    Root,
    River { river: ArcId, internal_id: i64 },
    Break { node: NodeId, kind: BreakKind },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub label: TreeLabel,
    pub name: String,
    /// Distance from the start of the parent river; 0 for root and rivers.
    pub distance: f64,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub main_river: Option<ArcId>,
    pub secondary_river: Option<RiverPosition>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiverSegmentTree {
    nodes: Vec<TreeNode>,
    #[serde(skip)]
    river_nodes: HashMap<ArcId, usize>,
}

impl Default for RiverSegmentTree {
    fn default() -> Self {
        Self {
            nodes: vec![TreeNode {
                label: TreeLabel::Root,
                name: "root".to_string(),
                distance: 0.0,
                parent: None,
                children: Vec::new(),
                main_river: None,
                secondary_river: None,
            }],
            river_nodes: HashMap::new(),
        }
    }
}

impl RiverSegmentTree {
    pub const ROOT: usize = 0;

    /// Builds the tree from resolved break nodes.  Unresolved nodes and nodes
    /// whose main river is a canal are left out.
    pub fn build(break_nodes: &[BreakNode], network: &Network) -> Self {
        let mut tree = Self::default();

        for bn in break_nodes {
            let Some(main) = bn.main else { continue };
            let Some(river) = network.river(main.river) else { continue };
            if river.kind == RiverKind::Canal {
                tracing::debug!(node = %bn.node_id, canal = %river.name, "break node on a canal discarded");
                continue;
            }

            let parent = tree.river_node(river);
            let idx = tree.nodes.len();
            tree.nodes.push(TreeNode {
                label: TreeLabel::Break { node: bn.node_id, kind: bn.kind },
                name: bn.name.clone(),
                distance: main.distance,
                parent: Some(parent),
                children: Vec::new(),
                main_river: Some(main.river),
                secondary_river: bn.secondary,
            });
            tree.nodes[parent].children.push(idx);
        }

        // Stable: equal distances keep insertion order.
        let rivers = tree.nodes[Self::ROOT].children.clone();
        for r in rivers {
            let mut children = std::mem::take(&mut tree.nodes[r].children);
            children.sort_by(|&a, &b| tree.nodes[a].distance.total_cmp(&tree.nodes[b].distance));
            tree.nodes[r].children = children;
        }

        tracing::info!(
            rivers = tree.river_nodes.len(),
            break_nodes = tree.nodes.len() - 1 - tree.river_nodes.len(),
            "river segment tree built"
        );
        tree
    }

    /// Index of the node for `river`, created under the root on first use.
    fn river_node(&mut self, river: &River) -> usize {
        if let Some(&idx) = self.river_nodes.get(&river.id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            label: TreeLabel::River { river: river.id, internal_id: river.internal_id },
            name: river.name.clone(),
            distance: 0.0,
            parent: Some(Self::ROOT),
            children: Vec::new(),
            main_river: None,
            secondary_river: None,
        });
        self.nodes[Self::ROOT].children.push(idx);
        self.river_nodes.insert(river.id, idx);
        idx
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn river_index(&self, river: ArcId) -> Option<usize> {
        self.river_nodes.get(&river).copied()
    }

    /// River nodes in first-reference order.
    pub fn rivers(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes[Self::ROOT].children.iter().map(|&i| &self.nodes[i])
    }

    /// Break nodes of `river` in ascending distance.
    pub fn breaks_of(&self, river: ArcId) -> impl Iterator<Item = &TreeNode> {
        self.river_index(river)
            .map(|r| self.nodes[r].children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.nodes[i])
    }

    // ── Segment derivation ────────────────────────────────────────────────────

    /// Depth-first walk of every river, numbered into a [`SegmentPlan`].
    pub fn segment_plan(&self, network: &Network) -> SegmentPlan {
        let mut segments = Vec::new();
        for &r in &self.nodes[Self::ROOT].children {
            self.derive(r, network, &mut segments);
        }
        tracing::info!(segments = segments.len(), "river segments derived");
        SegmentPlan::from_segments(segments)
    }

    fn derive(&self, idx: usize, network: &Network, out: &mut Vec<Segment>) {
        let node = &self.nodes[idx];
        let (river, internal_id) = match node.label {
            TreeLabel::River { river, internal_id } => (river, internal_id),
            _ => match node.main_river.and_then(|r| network.river(r)) {
                Some(r) => (r.id, r.internal_id),
                None => return,
            },
        };
        if node.children.is_empty() {
            return;
        }

        let mut prev_name = node.name.as_str();
        let mut prev_distance = Offset::START;

        for (i, &c) in node.children.iter().enumerate() {
            let child = &self.nodes[c];

            if child.is_leaf() {
                if let Some(seg) = self.headflow_segment(child, network) {
                    out.push(seg);
                }
            } else {
                self.derive(c, network, out);
            }

            let break_name = if i == 0 {
                format!("Below {prev_name} Headflow")
            } else {
                format!("Below {prev_name}")
            };
            out.push(Segment {
                sequence_id: 0,
                river,
                river_internal_id: internal_id,
                start: prev_distance,
                end: Offset::Distance(child.distance),
                break_name,
                river_name: node.name.clone(),
            });
            prev_name = &child.name;
            prev_distance = Offset::Distance(child.distance);
        }

        out.push(Segment {
            sequence_id: 0,
            river,
            river_internal_id: internal_id,
            start: prev_distance,
            end: Offset::Full,
            break_name: format!("Below {prev_name}"),
            river_name: node.name.clone(),
        });
    }

    /// Full-length segment for the tributary joining at `child`, one per
    /// tributary inflow node.  A tributary with break nodes of its own is
    /// segmented under its own river node instead.
    fn headflow_segment(&self, child: &TreeNode, network: &Network) -> Option<Segment> {
        if !matches!(child.label, TreeLabel::Break { kind: BreakKind::TributaryInflow, .. }) {
            return None;
        }
        let secondary = network.river(child.secondary_river?.river)?;
        if self.river_nodes.contains_key(&secondary.id) {
            return None;
        }
        Some(Segment {
            sequence_id: 0,
            river: secondary.id,
            river_internal_id: secondary.internal_id,
            start: Offset::START,
            end: Offset::Full,
            break_name: format!("Below {} Headflow", secondary.name),
            river_name: secondary.name.clone(),
        })
    }
}
