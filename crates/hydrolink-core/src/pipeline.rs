//! Pipeline orchestrator.
//!
//! Two stages around the external collaborators: `plan_network` classifies
//! the network and derives the river segment plan (handed to the line
//! splitter), then `link_grid` takes the overlay results of every layer and
//! produces the consolidated grid, its output rows and the connectivity
//! report.  All run state travels in the returned values.

use serde::{Deserialize, Serialize};

use crate::config::LinkageConfig;
use crate::connectivity::{check_connectivity, ConnectivityReport};
use crate::diagnostics::Diagnostics;
use crate::grid::{
    consolidate, unknown_wells, validate_layer_names, ConsolidatedGrid, LayerGrid, LayerInput,
    LayerKind, LinkageRow,
};
use crate::network::{classify, ArcRecord, Network, NodeRecord};
use crate::rivers::{
    BreakNode, LineProjector, PlanarProjector, RiverSegmentTree, SegmentPiece, SegmentPlan,
};

// ── Stage outputs ─────────────────────────────────────────────────────────────

/// Output of [`LinkagePipeline::plan_network`].  Owns the segment lookup the
/// second stage needs to name river pieces.
pub struct NetworkStage {
    pub network: Network,
    pub break_nodes: Vec<BreakNode>,
    pub tree: RiverSegmentTree,
    pub plan: SegmentPlan,
    pub diagnostics: Diagnostics,
}

/// Split-river pieces intersected with the grid, keyed by segment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiverPieces {
    pub primary_map: String,
    #[serde(default)]
    pub secondary_maps: Vec<String>,
    pub pieces: Vec<SegmentPiece>,
}

/// Overlay results for the second stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridInputs {
    #[serde(default)]
    pub layers: Vec<LayerInput>,
    #[serde(default)]
    pub river_pieces: Option<RiverPieces>,
}

pub struct LinkageOutcome {
    pub grid: ConsolidatedGrid,
    pub rows: Vec<LinkageRow>,
    pub connectivity: ConnectivityReport,
    /// Diagnostics of both stages, in the order they were raised.
    pub diagnostics: Diagnostics,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct LinkagePipeline {
    config: LinkageConfig,
    projector: Box<dyn LineProjector>,
}

impl LinkagePipeline {
    pub fn new(config: LinkageConfig) -> Self {
        let projector = Box::new(PlanarProjector::new(config.projection_tolerance));
        Self { config, projector }
    }

    pub fn with_projector(config: LinkageConfig, projector: Box<dyn LineProjector>) -> Self {
        Self { config, projector }
    }

    pub fn config(&self) -> &LinkageConfig {
        &self.config
    }

    pub fn plan_network(&self, nodes: &[NodeRecord], arcs: &[ArcRecord]) -> NetworkStage {
        let mut diagnostics = Diagnostics::new();

        // 1. Classification and break resolution
        let classification =
            classify(nodes, arcs, &self.config, self.projector.as_ref(), &mut diagnostics);

        // 2. Segmentation
        let tree = RiverSegmentTree::build(&classification.break_nodes, &classification.network);
        let plan = tree.segment_plan(&classification.network);

        NetworkStage {
            network: classification.network,
            break_nodes: classification.break_nodes,
            tree,
            plan,
            diagnostics,
        }
    }

    pub fn link_grid(&self, stage: &NetworkStage, inputs: GridInputs) -> LinkageOutcome {
        let mut diagnostics = stage.diagnostics.clone();
        let GridInputs { mut layers, river_pieces } = inputs;

        // 1. River pieces → river layer records
        if let Some(rp) = river_pieces {
            let records = stage.plan.river_records(&rp.pieces, &mut diagnostics);
            layers.push(LayerInput {
                kind: LayerKind::River,
                primary_map: rp.primary_map,
                secondary_maps: rp.secondary_maps,
                wells: Vec::new(),
                records,
            });
        }

        // 2. Name validation and per-layer grids
        let mut grids = Vec::with_capacity(layers.len());
        for input in layers {
            for well in unknown_wells(&input, &stage.network) {
                diagnostics.warn(
                    input.kind.scope(),
                    format!("well [{well}] is not a demand site of the network; ignored"),
                );
            }
            let errors = validate_layer_names(&input, &stage.network);
            if !errors.is_empty() {
                for e in errors {
                    diagnostics.error(input.kind.scope(), e.to_string());
                }
                tracing::warn!(layer = %input.kind, "layer left out of the grid");
                continue;
            }
            let criterion = self.config.layers.get(input.kind).order_criterion;
            grids.push(LayerGrid::build(input, criterion));
        }

        // 3. Consolidation and output rows
        let grid = consolidate(grids);
        let rows = grid.rows(&self.config, &mut diagnostics);

        // 4. Connectivity
        let connectivity = check_connectivity(
            &stage.network,
            &grid,
            &self.config.connectivity_cases,
            &mut diagnostics,
        );

        tracing::info!(
            cells = grid.len(),
            warnings = diagnostics.warnings().count(),
            errors = diagnostics.errors().count(),
            "linkage complete"
        );
        LinkageOutcome { grid, rows, connectivity, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Scope;
    use crate::grid::{Cell, LayerCellRecord};
    use crate::network::{ArcId, LinkCategory, NodeId};
    use crate::rivers::Offset;
    use geo::{line_string, LineString};

    fn node(id: i64, code: i64, name: &str, x: f64, y: f64) -> NodeRecord {
        NodeRecord { id: NodeId(id), type_code: code, name: Some(name.into()), x, y, internal_id: id }
    }

    fn arc(id: i64, code: i64, name: Option<&str>, src: Option<i64>, dst: Option<i64>, line: LineString<f64>) -> ArcRecord {
        ArcRecord {
            id: ArcId(id),
            type_code: code,
            name: name.map(String::from),
            internal_id: id,
            src: src.map(NodeId),
            dst: dst.map(NodeId),
            line,
        }
    }

    fn record(row: i64, col: i64, name: &str, metric: f64, map: &str) -> LayerCellRecord {
        LayerCellRecord {
            cell: Cell::new(row, col),
            feature_name: name.into(),
            metric,
            external_cell_id: row * 100 + col,
            layer_name: map.into(),
        }
    }

    fn pipeline() -> LinkagePipeline {
        LinkagePipeline::new(LinkageConfig::default())
    }

    #[test]
    fn catchment_runoff_to_groundwater_is_a_clean_link() {
        let stage = pipeline().plan_network(
            &[node(1, 21, "C1", 0.0, 0.0), node(2, 3, "G1", 0.0, 0.0)],
            &[arc(1, 22, None, Some(1), Some(2), LineString::new(vec![]))],
        );
        let targets: Vec<_> = stage
            .network
            .link_targets(LinkCategory::RunoffInfiltration, NodeId(1))
            .collect();
        assert_eq!(targets, vec![NodeId(2)]);
        assert!(stage.diagnostics.is_empty(), "{:?}", stage.diagnostics);
    }

    #[test]
    fn demand_site_runoff_source_warns_once() {
        let stage = pipeline().plan_network(
            &[node(3, 1, "DS", 0.0, 0.0), node(4, 3, "G1", 0.0, 0.0)],
            &[arc(1, 22, None, Some(3), Some(4), LineString::new(vec![]))],
        );
        assert!(stage.network.links().is_empty());
        assert_eq!(stage.diagnostics.warnings().count(), 1);
        assert!(!stage.diagnostics.has_errors());
    }

    #[test]
    fn rio_grande_inflow_resolves_as_tributary() {
        let stage = pipeline().plan_network(
            &[node(7, 13, "Rio Grande Inflow", 0.0, 0.0)],
            &[arc(50, 6, Some("Rio Grande"), None, None, line_string![(x: 0.0, y: 10.0), (x: 0.0, y: 0.0)])],
        );
        let bn = &stage.break_nodes[0];
        assert_eq!(bn.secondary.map(|p| p.river), Some(ArcId(50)));
        assert!(bn.main.is_none());
        assert!(stage.diagnostics.is_empty(), "{:?}", stage.diagnostics);
    }

    #[test]
    fn configured_threshold_decides_tributary_matching() {
        let nodes = [node(7, 13, "Rio Grand Inflow", 0.0, 0.0)];
        let arcs = [arc(50, 6, Some("Rio Grande"), None, None, line_string![(x: 0.0, y: 10.0), (x: 0.0, y: 0.0)])];

        let lenient = pipeline().plan_network(&nodes, &arcs);
        assert!(lenient.break_nodes[0].secondary.is_some());
        assert_eq!(lenient.diagnostics.in_scope(Scope::Network).count(), 1, "near-miss name warns");

        let config = LinkageConfig { tributary_match_threshold: 0.99, ..LinkageConfig::default() };
        let strict = LinkagePipeline::new(config).plan_network(&nodes, &arcs);
        let bn = &strict.break_nodes[0];
        assert_eq!(bn.main.map(|p| p.river), Some(ArcId(50)));
        assert!(bn.secondary.is_none());
        assert!(strict.diagnostics.is_empty());
        assert_eq!(strict.plan.segments().len(), 2);
    }

    fn basin() -> (Vec<NodeRecord>, Vec<ArcRecord>) {
        let nodes = vec![
            node(1, 21, "C1", -5.0, 5.0),
            node(2, 3, "G1", -5.0, -5.0),
            node(3, 1, "D1", 5.0, -5.0),
            node(4, 1, "D2", 15.0, -5.0),
            node(5, 10, "W1", 40.0, 0.0),
        ];
        let arcs = vec![
            arc(10, 22, None, Some(1), Some(2), LineString::new(vec![])),
            arc(11, 7, None, Some(2), Some(3), LineString::new(vec![])),
            arc(12, 6, Some("Maipo"), None, None, line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]),
        ];
        (nodes, arcs)
    }

    #[test]
    fn full_run_links_every_layer() {
        let p = pipeline();
        let (nodes, arcs) = basin();
        let stage = p.plan_network(&nodes, &arcs);
        assert_eq!(stage.plan.segments().len(), 2);
        assert_eq!(stage.plan.segment_rules(), "L 1 12 0 40\nL 2 12 40 100%\n");

        let inputs = GridInputs {
            layers: vec![
                LayerInput {
                    kind: LayerKind::Catchment,
                    primary_map: "catchments".into(),
                    secondary_maps: vec![],
                    wells: vec![],
                    records: vec![record(0, 0, "C1", 10.0, "catchments"), record(0, 1, "C1", 3.0, "catchments")],
                },
                LayerInput {
                    kind: LayerKind::Groundwater,
                    primary_map: "aquifers".into(),
                    secondary_maps: vec![],
                    wells: vec![],
                    records: vec![record(0, 0, "G1", 10.0, "aquifers"), record(0, 1, "G1", 10.0, "aquifers")],
                },
                LayerInput {
                    kind: LayerKind::DemandSite,
                    primary_map: "demand".into(),
                    secondary_maps: vec![],
                    wells: vec![],
                    records: vec![record(0, 0, "D1", 2.0, "demand"), record(0, 1, "D2", 2.0, "demand")],
                },
            ],
            river_pieces: Some(RiverPieces {
                primary_map: "rivers".into(),
                secondary_maps: vec![],
                pieces: vec![
                    SegmentPiece { cell: Cell::new(0, 1), segment_id: 2, length: 7.0, external_cell_id: 1, layer_name: "rivers".into() },
                    SegmentPiece { cell: Cell::new(0, 1), segment_id: 1, length: 2.0, external_cell_id: 1, layer_name: "rivers".into() },
                ],
            }),
        };
        let out = p.link_grid(&stage, inputs);

        assert_eq!(out.rows.len(), 2);
        let second = &out.rows[1];
        assert_eq!(second.rc, "0x1");
        assert_eq!(second.value("River1"), Some("Maipo,Below W1"), "longest piece wins");
        assert_eq!(second.value("Catchme1"), Some("C1"));
        assert_eq!(second.value("DemandS1"), Some("D2"));

        // G1 feeds D1 but not D2.
        let failures = &out.connectivity.cases[0].failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures["G1"]["D2"], 1);
        // River layer has two segments in one cell with one column.
        assert_eq!(out.diagnostics.in_scope(Scope::River).count(), 1);
        assert!(!out.diagnostics.has_errors());
    }

    #[test]
    fn invalid_layer_names_drop_only_that_layer() {
        let p = pipeline();
        let (nodes, arcs) = basin();
        let stage = p.plan_network(&nodes, &arcs);
        let inputs = GridInputs {
            layers: vec![
                LayerInput {
                    kind: LayerKind::Groundwater,
                    primary_map: "aquifers".into(),
                    secondary_maps: vec![],
                    wells: vec![],
                    records: vec![record(0, 0, "G-unknown", 1.0, "aquifers")],
                },
                LayerInput {
                    kind: LayerKind::Catchment,
                    primary_map: "catchments".into(),
                    secondary_maps: vec![],
                    wells: vec![],
                    records: vec![record(0, 0, "C1", 1.0, "catchments")],
                },
            ],
            river_pieces: None,
        };
        let out = p.link_grid(&stage, inputs);
        assert!(out.diagnostics.has_errors_in(Scope::Groundwater));
        assert!(!out.diagnostics.has_errors_in(Scope::Catchment));
        let cell = out.grid.get(&Cell::new(0, 0)).unwrap();
        assert!(cell.groundwater.is_none());
        assert_eq!(cell.winner(LayerKind::Catchment), Some("C1"));
        assert_eq!(out.rows[0].value("Groundw1"), Some(""));
    }

    #[test]
    fn wells_are_placed_once_and_unknown_wells_warn() {
        let p = pipeline();
        let (nodes, arcs) = basin();
        let stage = p.plan_network(&nodes, &arcs);
        let inputs = GridInputs {
            layers: vec![LayerInput {
                kind: LayerKind::DemandSite,
                primary_map: "wells".into(),
                secondary_maps: vec![],
                wells: vec!["D1".into(), "Pozo X".into()],
                records: vec![record(2, 2, "D1", 1.0, "wells"), record(2, 3, "D1", 5.0, "wells")],
            }],
            river_pieces: None,
        };
        let out = p.link_grid(&stage, inputs);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].rc, "2x2");
        assert_eq!(out.diagnostics.in_scope(Scope::DemandSite).count(), 1);
        assert!(!out.diagnostics.has_errors());
    }

    #[test]
    fn repeated_runs_do_not_share_segment_ids() {
        let p = pipeline();
        let (nodes, arcs) = basin();
        let first = p.plan_network(&nodes, &arcs);
        let second = p.plan_network(&nodes[..4], &arcs);
        assert_eq!(first.plan.lookup().len(), 2);
        assert!(second.plan.lookup().is_empty(), "no break nodes, no segments");
        assert_eq!(first.plan.segments()[1].start, Offset::Distance(40.0));
    }
}
