//! Network classification: one pass over the node table, one over the arc
//! table.
//!
//! Nodes are typed from their raw code and flow-altering ones are queued for
//! break resolution.  Arcs with endpoint semantics become links only when the
//! (source, destination) kinds are on their category's whitelist; river and
//! canal arcs feed the break resolver as they are scanned.  Nothing here
//! aborts: every problem is a warning and the pass always completes.

use crate::config::LinkageConfig;
use crate::diagnostics::{Diagnostics, Scope};
use crate::network::{
    Arc, ArcKind, ArcRecord, FeatureKind, Link, LinkCategory, Network, Node, NodeRecord, River,
};
use crate::rivers::flow_break::{BreakNode, FlowBreakResolver};
use crate::rivers::projection::LineProjector;

use FeatureKind::*;

// ── Link whitelists ───────────────────────────────────────────────────────────

const RUNOFF_INFILTRATION: &[(FeatureKind, &[FeatureKind])] =
    &[(Catchment, &[Groundwater, CatchmentInflowNode])];

const TRANSMISSION_LINK: &[(FeatureKind, &[FeatureKind])] = &[
    (Groundwater, &[DemandSite, Catchment]),
    (DemandSite, &[Catchment, RiverWithdrawal, TributaryInflow]),
    (RiverWithdrawal, &[DemandSite, Catchment]),
    (Reservoir, &[DemandSite, Catchment]),
];

const RETURN_FLOW: &[(FeatureKind, &[FeatureKind])] =
    &[(DemandSite, &[Groundwater, ReturnFlowNode])];

/// Allowed `(source, destinations)` groups of a link category.
pub fn allowed_pairs(category: LinkCategory) -> &'static [(FeatureKind, &'static [FeatureKind])] {
    match category {
        LinkCategory::RunoffInfiltration => RUNOFF_INFILTRATION,
        LinkCategory::TransmissionLink => TRANSMISSION_LINK,
        LinkCategory::ReturnFlow => RETURN_FLOW,
    }
}

pub fn is_allowed(category: LinkCategory, src: FeatureKind, dst: FeatureKind) -> bool {
    allowed_pairs(category)
        .iter()
        .any(|(s, dsts)| *s == src && dsts.contains(&dst))
}

fn describe_whitelist(category: LinkCategory) -> String {
    allowed_pairs(category)
        .iter()
        .map(|(src, dsts)| {
            let dsts: Vec<&str> = dsts.iter().map(|d| d.label()).collect();
            format!("{} -> {}", src.label(), dsts.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Public entry point ────────────────────────────────────────────────────────

pub struct Classification {
    pub network: Network,
    /// Every named flow-altering node, resolved or not, in node-table order.
    pub break_nodes: Vec<BreakNode>,
}

pub fn classify(
    nodes: &[NodeRecord],
    arcs: &[ArcRecord],
    config: &LinkageConfig,
    projector: &dyn LineProjector,
    diagnostics: &mut Diagnostics,
) -> Classification {
    let mut network = Network::default();
    let mut resolver = FlowBreakResolver::new(projector, config.tributary_match_threshold);

    // 1. Nodes
    for record in nodes {
        let node = Node {
            id: record.id,
            kind: config.node_codes.kind_of(record.type_code),
            name: record.name.clone().filter(|n| !n.is_empty()),
            x: record.x,
            y: record.y,
            internal_id: record.internal_id,
        };
        if network.node(node.id).is_some() {
            diagnostics.warn(
                Scope::Network,
                format!(
                    "node ObjID=[{}] appears more than once; keeping the first record, [{}] ignored",
                    node.id,
                    node.display_name()
                ),
            );
            continue;
        }
        resolver.register(&node);
        network.insert_node(node);
    }

    // 2. Arcs
    for record in arcs {
        let kind = config.arc_codes.kind_of(record.type_code);
        let name = record.name.clone().filter(|n| !n.is_empty());
        if network.arc(record.id).is_some() {
            diagnostics.warn(
                Scope::Network,
                format!(
                    "arc ObjID=[{}] appears more than once; keeping the first record, [{}] ignored",
                    record.id,
                    name.as_deref().unwrap_or("unnamed")
                ),
            );
            continue;
        }

        if let Some(category) = kind.link_category() {
            classify_link(&mut network, record, category, diagnostics);
        } else if let Some(river_kind) = kind.river_kind() {
            match &name {
                Some(river_name) => {
                    resolver.observe_river(record.id, river_name, &record.line, diagnostics);
                    network.insert_river(River {
                        id: record.id,
                        name: river_name.clone(),
                        internal_id: record.internal_id,
                        kind: river_kind,
                    });
                }
                None => diagnostics.warn(
                    Scope::Network,
                    format!("river or canal arc ObjID=[{}] has no name; it will not be segmented", record.id),
                ),
            }
        } else if let ArcKind::Other(code) = kind {
            diagnostics.warn(
                Scope::Network,
                format!(
                    "arc [{}] ObjID=[{}] has type code {}; allowed arc types: {}, {}, {}, River, Canal",
                    name.as_deref().unwrap_or("unnamed"),
                    record.id,
                    code,
                    LinkCategory::RunoffInfiltration,
                    LinkCategory::TransmissionLink,
                    LinkCategory::ReturnFlow,
                ),
            );
        }

        network.insert_arc(Arc {
            id: record.id,
            kind,
            name,
            internal_id: record.internal_id,
            src: record.src,
            dst: record.dst,
            line: record.line.clone(),
        });
    }

    let break_nodes = resolver.finish(diagnostics);

    tracing::info!(
        nodes = network.nodes().len(),
        arcs = network.arcs().len(),
        rivers = network.rivers().len(),
        links = network.links().len(),
        "network classified"
    );

    Classification { network, break_nodes }
}

fn classify_link(
    network: &mut Network,
    record: &ArcRecord,
    category: LinkCategory,
    diagnostics: &mut Diagnostics,
) {
    let endpoints = match (record.src, record.dst) {
        (Some(s), Some(d)) => network.node(s).zip(network.node(d)),
        _ => None,
    };
    let Some((src, dst)) = endpoints else {
        diagnostics.warn(
            Scope::Network,
            format!(
                "{} arc ObjID=[{}] references a node that is not in the network (src={:?}, dst={:?})",
                category,
                record.id,
                record.src.map(|n| n.0),
                record.dst.map(|n| n.0),
            ),
        );
        return;
    };

    if is_allowed(category, src.kind, dst.kind) {
        let link = Link { category, arc: record.id, src: src.id, dst: dst.id };
        network.push_link(link);
    } else {
        diagnostics.warn(
            Scope::Network,
            format!(
                "{} arc ObjID=[{}] joins [{}] ({}) -> [{}] ({}); allowed: {}",
                category,
                record.id,
                src.display_name(),
                src.kind,
                dst.display_name(),
                dst.kind,
                describe_whitelist(category),
            ),
        );
    }
}
