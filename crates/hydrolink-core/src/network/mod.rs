//! Typed water-resources network: nodes, arcs, rivers and the links derived
//! from legal arc endpoints.
//!
//! Storage is arena style: records live in `Vec`s in scan order and are found
//! through id → index maps, so lookups never walk the tables.

pub mod classifier;
pub mod schema;

use std::collections::HashMap;
use std::fmt;

use geo::LineString;
use serde::{Deserialize, Serialize};

pub use classifier::{classify, Classification};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Object id of a node in the network attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

/// Object id of an arc in the network attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArcId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// Semantic node type, resolved from the raw type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Groundwater,
    Catchment,
    DemandSite,
    ReturnFlowNode,
    TributaryInflow,
    CatchmentInflowNode,
    RiverWithdrawal,
    DiversionOutflow,
    Reservoir,
    /// Any code not listed in the configuration; carries the raw code.
    Other(i64),
}

impl FeatureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FeatureKind::Groundwater => "groundwater",
            FeatureKind::Catchment => "catchment",
            FeatureKind::DemandSite => "demand site",
            FeatureKind::ReturnFlowNode => "return flow node",
            FeatureKind::TributaryInflow => "tributary inflow",
            FeatureKind::CatchmentInflowNode => "catchment inflow node",
            FeatureKind::RiverWithdrawal => "river withdrawal",
            FeatureKind::DiversionOutflow => "diversion outflow",
            FeatureKind::Reservoir => "reservoir",
            FeatureKind::Other(_) => "other",
        }
    }

    /// Node types that split the river they sit on.
    pub fn is_flow_break(&self) -> bool {
        matches!(
            self,
            FeatureKind::TributaryInflow
                | FeatureKind::CatchmentInflowNode
                | FeatureKind::RiverWithdrawal
                | FeatureKind::DiversionOutflow
        )
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Other(code) => write!(f, "other ({code})"),
            k => f.write_str(k.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcKind {
    RunoffInfiltration,
    TransmissionLink,
    ReturnFlow,
    River,
    Canal,
    Other(i64),
}

impl ArcKind {
    /// Link category for arcs with endpoint semantics; `None` for rivers,
    /// canals and unknown codes.
    pub fn link_category(&self) -> Option<LinkCategory> {
        match self {
            ArcKind::RunoffInfiltration => Some(LinkCategory::RunoffInfiltration),
            ArcKind::TransmissionLink => Some(LinkCategory::TransmissionLink),
            ArcKind::ReturnFlow => Some(LinkCategory::ReturnFlow),
            _ => None,
        }
    }

    pub fn river_kind(&self) -> Option<RiverKind> {
        match self {
            ArcKind::River => Some(RiverKind::River),
            ArcKind::Canal => Some(RiverKind::Canal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    RunoffInfiltration,
    TransmissionLink,
    ReturnFlow,
}

impl LinkCategory {
    pub const ALL: [LinkCategory; 3] = [
        LinkCategory::RunoffInfiltration,
        LinkCategory::TransmissionLink,
        LinkCategory::ReturnFlow,
    ];
}

impl fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkCategory::RunoffInfiltration => "Runoff/Infiltration",
            LinkCategory::TransmissionLink => "Transmission Link",
            LinkCategory::ReturnFlow => "Return Flow",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiverKind {
    River,
    Canal,
}

// ── Raw records ───────────────────────────────────────────────────────────────

/// One row of the node table, with its point geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub type_code: i64,
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub internal_id: i64,
}

/// One row of the arc table, with its polyline geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcRecord {
    pub id: ArcId,
    pub type_code: i64,
    pub name: Option<String>,
    pub internal_id: i64,
    pub src: Option<NodeId>,
    pub dst: Option<NodeId>,
    pub line: LineString<f64>,
}

// ── Classified tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: FeatureKind,
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub internal_id: i64,
}

impl Node {
    /// Name, or the kind label for an unnamed node.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kind.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arc {
    pub id: ArcId,
    pub kind: ArcKind,
    pub name: Option<String>,
    pub internal_id: i64,
    pub src: Option<NodeId>,
    pub dst: Option<NodeId>,
    pub line: LineString<f64>,
}

/// A named river or canal arc.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct River {
    pub id: ArcId,
    pub name: String,
    pub internal_id: i64,
    pub kind: RiverKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub category: LinkCategory,
    pub arc: ArcId,
    pub src: NodeId,
    pub dst: NodeId,
}

/// Classified network.  Built once by [`classify`] and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    arcs: Vec<Arc>,
    arc_index: HashMap<ArcId, usize>,
    rivers: Vec<River>,
    river_index: HashMap<ArcId, usize>,
    links: Vec<Link>,
}

impl Network {
    // ── Construction (classifier only) ────────────────────────────────────────

    /// Returns `false` and keeps the existing record when the id is taken.
    pub(crate) fn insert_node(&mut self, node: Node) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub(crate) fn insert_arc(&mut self, arc: Arc) -> bool {
        if self.arc_index.contains_key(&arc.id) {
            return false;
        }
        self.arc_index.insert(arc.id, self.arcs.len());
        self.arcs.push(arc);
        true
    }

    pub(crate) fn insert_river(&mut self, river: River) {
        match self.river_index.get(&river.id) {
            Some(&i) => self.rivers[i] = river,
            None => {
                self.river_index.insert(river.id, self.rivers.len());
                self.rivers.push(river);
            }
        }
    }

    pub(crate) fn push_link(&mut self, link: Link) {
        self.links.push(link);
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn arc(&self, id: ArcId) -> Option<&Arc> {
        self.arc_index.get(&id).map(|&i| &self.arcs[i])
    }

    pub fn river(&self, id: ArcId) -> Option<&River> {
        self.river_index.get(&id).map(|&i| &self.rivers[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn rivers(&self) -> &[River] {
        &self.rivers
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn nodes_of_kind(&self, kind: FeatureKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn catchments(&self) -> impl Iterator<Item = &Node> {
        self.nodes_of_kind(FeatureKind::Catchment)
    }

    pub fn groundwaters(&self) -> impl Iterator<Item = &Node> {
        self.nodes_of_kind(FeatureKind::Groundwater)
    }

    pub fn demand_sites(&self) -> impl Iterator<Item = &Node> {
        self.nodes_of_kind(FeatureKind::DemandSite)
    }

    /// Nodes not in any of the catchment, groundwater, demand-site or
    /// flow-break groups.
    pub fn other_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| {
            !n.kind.is_flow_break()
                && !matches!(
                    n.kind,
                    FeatureKind::Catchment | FeatureKind::Groundwater | FeatureKind::DemandSite
                )
        })
    }

    /// First node of `kind` whose display name equals `name`.
    pub fn find_named(&self, kind: FeatureKind, name: &str) -> Option<&Node> {
        self.nodes_of_kind(kind).find(|n| n.display_name() == name)
    }

    pub fn links_of(&self, category: LinkCategory) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.category == category)
    }

    /// Destinations reached from `src` through links of `category`.
    pub fn link_targets(
        &self,
        category: LinkCategory,
        src: NodeId,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.links_of(category).filter(move |l| l.src == src).map(|l| l.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, kind: FeatureKind, name: Option<&str>) -> Node {
        Node {
            id: NodeId(id),
            kind,
            name: name.map(str::to_string),
            x: 0.0,
            y: 0.0,
            internal_id: id,
        }
    }

    #[test]
    fn duplicate_node_id_keeps_first() {
        let mut net = Network::default();
        assert!(net.insert_node(node(1, FeatureKind::Catchment, Some("C1"))));
        assert!(!net.insert_node(node(1, FeatureKind::Groundwater, Some("G1"))));
        assert_eq!(net.nodes().len(), 1);
        assert_eq!(net.node(NodeId(1)).map(|n| n.kind), Some(FeatureKind::Catchment));
    }

    #[test]
    fn unnamed_node_displays_kind_label() {
        let n = node(7, FeatureKind::ReturnFlowNode, None);
        assert_eq!(n.display_name(), "return flow node");
    }

    #[test]
    fn kind_views_and_link_targets() {
        let mut net = Network::default();
        net.insert_node(node(1, FeatureKind::Catchment, Some("C1")));
        net.insert_node(node(2, FeatureKind::Groundwater, Some("G1")));
        net.insert_node(node(3, FeatureKind::CatchmentInflowNode, Some("CI")));
        net.insert_node(node(4, FeatureKind::Reservoir, Some("R")));
        net.push_link(Link {
            category: LinkCategory::RunoffInfiltration,
            arc: ArcId(10),
            src: NodeId(1),
            dst: NodeId(2),
        });
        net.push_link(Link {
            category: LinkCategory::RunoffInfiltration,
            arc: ArcId(11),
            src: NodeId(1),
            dst: NodeId(3),
        });

        let targets: Vec<_> = net.link_targets(LinkCategory::RunoffInfiltration, NodeId(1)).collect();
        assert_eq!(targets, vec![NodeId(2), NodeId(3)]);
        assert_eq!(net.link_targets(LinkCategory::ReturnFlow, NodeId(1)).count(), 0);
        assert_eq!(net.catchments().count(), 1);
        assert_eq!(net.other_nodes().map(|n| n.id).collect::<Vec<_>>(), vec![NodeId(4)]);
        assert_eq!(net.find_named(FeatureKind::Groundwater, "G1").map(|n| n.id), Some(NodeId(2)));
        assert!(net.find_named(FeatureKind::Catchment, "G1").is_none());
    }
}
