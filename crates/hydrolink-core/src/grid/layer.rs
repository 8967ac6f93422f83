//! Single-layer cell grid.
//!
//! Records are grouped by cell; repeated names inside one cell (multi-part
//! geometries) are merged by summing their metric, and the distinct features
//! of the cell are ranked by metric, largest first.  The sort is stable, so
//! equal metrics keep the order the records arrived in.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Cell, LayerCellRecord, LayerKind, OrderCriterion};
use crate::error::LinkageError;
use crate::network::{FeatureKind, Network};

/// Overlay output for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInput {
    pub kind: LayerKind,
    /// Map whose features fill the primary columns.
    pub primary_map: String,
    /// Informative maps; each gets one output column.
    #[serde(default)]
    pub secondary_maps: Vec<String>,
    /// Demand sites drawn as buffered well points.  Only the first record of
    /// a well is kept, so each well lands in exactly one cell.
    #[serde(default)]
    pub wells: Vec<String>,
    pub records: Vec<LayerCellRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    pub feature_count: usize,
    pub winning_external_cell_id: i64,
    /// Distinct features, metric descending.
    pub features: Vec<LayerCellRecord>,
}

impl CellSummary {
    pub fn winner(&self) -> &LayerCellRecord {
        &self.features[0]
    }

    pub fn in_map<'a>(&'a self, map: &'a str) -> impl Iterator<Item = &'a LayerCellRecord> {
        self.features.iter().filter(move |f| f.layer_name == map)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerGrid {
    pub kind: LayerKind,
    pub criterion: OrderCriterion,
    pub primary_map: String,
    pub secondary_maps: Vec<String>,
    cells: BTreeMap<Cell, CellSummary>,
}

impl LayerGrid {
    pub fn build(input: LayerInput, criterion: OrderCriterion) -> Self {
        let LayerInput { kind, primary_map, secondary_maps, wells, records } = input;
        let records = first_record_per_well(records, &wells);

        // cell → distinct features in first-seen order, plus a name index.
        let mut grouped: BTreeMap<Cell, (Vec<LayerCellRecord>, HashMap<String, usize>)> =
            BTreeMap::new();
        for record in records {
            let (features, index) = grouped.entry(record.cell).or_default();
            match index.get(&record.feature_name) {
                Some(&i) => features[i].metric += record.metric,
                None => {
                    index.insert(record.feature_name.clone(), features.len());
                    features.push(record);
                }
            }
        }

        let cells: BTreeMap<Cell, CellSummary> = grouped
            .into_iter()
            .map(|(cell, (mut features, _))| {
                features.sort_by(|a, b| b.metric.total_cmp(&a.metric));
                let summary = CellSummary {
                    feature_count: features.len(),
                    winning_external_cell_id: features[0].external_cell_id,
                    features,
                };
                (cell, summary)
            })
            .collect();

        tracing::info!(layer = %kind, ?criterion, cells = cells.len(), "layer grid built");
        Self { kind, criterion, primary_map, secondary_maps, cells }
    }

    pub fn cell(&self, cell: &Cell) -> Option<&CellSummary> {
        self.cells.get(cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&Cell, &CellSummary)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn into_parts(self) -> (LayerKind, String, Vec<String>, BTreeMap<Cell, CellSummary>) {
        (self.kind, self.primary_map, self.secondary_maps, self.cells)
    }
}

fn first_record_per_well(records: Vec<LayerCellRecord>, wells: &[String]) -> Vec<LayerCellRecord> {
    if wells.is_empty() {
        return records;
    }
    let wells: HashSet<&str> = wells.iter().map(String::as_str).collect();
    let mut placed: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|r| !wells.contains(r.feature_name.as_str()) || placed.insert(r.feature_name.clone()))
        .collect()
}

/// Well names that no demand-site node of the network carries.
pub fn unknown_wells<'a>(input: &'a LayerInput, network: &Network) -> Vec<&'a str> {
    input
        .wells
        .iter()
        .filter(|w| network.find_named(FeatureKind::DemandSite, w).is_none())
        .map(String::as_str)
        .collect()
}

/// Name checks run before a polygon layer is consolidated: every feature name
/// must belong to a network node of the layer's kind, and no name may come
/// from more than one map.  Returns every violation found.
pub fn validate_layer_names(input: &LayerInput, network: &Network) -> Vec<LinkageError> {
    let Some(kind) = input.kind.feature_kind() else {
        return Vec::new();
    };

    // name → maps it appears in, both in first-seen order.
    let mut names: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for r in &input.records {
        let i = *index.entry(r.feature_name.as_str()).or_insert_with(|| {
            names.push((r.feature_name.as_str(), Vec::new()));
            names.len() - 1
        });
        let maps = &mut names[i].1;
        if !maps.contains(&r.layer_name.as_str()) {
            maps.push(r.layer_name.as_str());
        }
    }

    let mut errors = Vec::new();
    let unknown: Vec<String> = names
        .iter()
        .filter(|(name, _)| network.find_named(kind, name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !unknown.is_empty() {
        errors.push(LinkageError::UnknownFeatures { layer: input.kind.to_string(), names: unknown });
    }
    for (name, maps) in names.iter().filter(|(_, maps)| maps.len() > 1) {
        errors.push(LinkageError::DuplicatedAcrossMaps {
            layer: input.kind.to_string(),
            name: name.to_string(),
            maps: maps.iter().map(|m| m.to_string()).collect(),
        });
    }
    errors
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn rec(row: i64, col: i64, name: &str, metric: f64, cell_id: i64, map: &str) -> LayerCellRecord {
        LayerCellRecord {
            cell: Cell::new(row, col),
            feature_name: name.to_string(),
            metric,
            external_cell_id: cell_id,
            layer_name: map.to_string(),
        }
    }

    fn input(kind: LayerKind, records: Vec<LayerCellRecord>) -> LayerInput {
        LayerInput { kind, primary_map: "main".into(), secondary_maps: Vec::new(), wells: Vec::new(), records }
    }

    #[test]
    fn multipart_features_are_summed_before_ranking() {
        let grid = LayerGrid::build(
            input(
                LayerKind::Catchment,
                vec![
                    rec(1, 1, "A", 4.0, 10, "main"),
                    rec(1, 1, "B", 6.0, 11, "main"),
                    rec(1, 1, "A", 3.0, 12, "main"),
                ],
            ),
            OrderCriterion::Area,
        );
        let s = grid.cell(&Cell::new(1, 1)).unwrap();
        assert_eq!(s.feature_count, 2);
        assert_eq!(s.winner().feature_name, "A");
        assert_relative_eq!(s.winner().metric, 7.0);
        assert_eq!(s.winning_external_cell_id, 10, "merged record keeps its first cell id");
    }

    #[test]
    fn metric_ties_keep_input_order() {
        let records = vec![
            rec(0, 0, "A", 5.0, 1, "main"),
            rec(0, 0, "B", 8.0, 2, "main"),
            rec(0, 0, "C", 8.0, 3, "main"),
        ];
        let grid = LayerGrid::build(input(LayerKind::Groundwater, records.clone()), OrderCriterion::Area);
        let names: Vec<_> = grid.cell(&Cell::new(0, 0)).unwrap().features.iter().map(|f| f.feature_name.clone()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);

        let again = LayerGrid::build(input(LayerKind::Groundwater, records), OrderCriterion::Area);
        assert_eq!(again, grid, "same input must give the same ranking");
    }

    #[test]
    fn cells_are_grouped_independently() {
        let grid = LayerGrid::build(
            input(LayerKind::River, vec![rec(0, 1, "R,x", 1.0, 1, "main"), rec(0, 0, "R,y", 2.0, 2, "main")]),
            OrderCriterion::Length,
        );
        assert_eq!(grid.len(), 2);
        let order: Vec<_> = grid.cells().map(|(c, _)| *c).collect();
        assert_eq!(order, vec![Cell::new(0, 0), Cell::new(0, 1)]);
    }

    #[test]
    fn well_counts_only_in_its_first_cell() {
        let mut wells = input(
            LayerKind::DemandSite,
            vec![
                rec(0, 0, "Pozo 1", 2.0, 1, "main"),
                rec(0, 1, "Pozo 1", 2.0, 2, "main"),
                rec(0, 1, "DS-A", 1.0, 2, "main"),
                rec(0, 1, "DS-A", 1.0, 2, "main"),
            ],
        );
        wells.wells = vec!["Pozo 1".into()];
        let grid = LayerGrid::build(wells, OrderCriterion::Area);
        assert_eq!(grid.cell(&Cell::new(0, 0)).unwrap().winner().feature_name, "Pozo 1");
        let second = grid.cell(&Cell::new(0, 1)).unwrap();
        assert_eq!(second.feature_count, 1, "the well's buffer spilling into a second cell is ignored");
        assert_eq!(second.winner().feature_name, "DS-A");
        assert_relative_eq!(second.winner().metric, 2.0);
    }

    #[test]
    fn names_must_exist_and_stay_in_one_map() {
        use crate::config::LinkageConfig;
        use crate::diagnostics::Diagnostics;
        use crate::network::{classify, NodeId, NodeRecord};
        use crate::rivers::PlanarProjector;

        let nodes = [
            NodeRecord { id: NodeId(1), type_code: 3, name: Some("G1".into()), x: 0.0, y: 0.0, internal_id: 1 },
            NodeRecord { id: NodeId(2), type_code: 21, name: Some("C1".into()), x: 0.0, y: 0.0, internal_id: 2 },
        ];
        let mut diags = Diagnostics::new();
        let net = classify(&nodes, &[], &LinkageConfig::default(), &PlanarProjector::default(), &mut diags).network;

        let ok = input(LayerKind::Groundwater, vec![rec(0, 0, "G1", 1.0, 1, "main")]);
        assert!(validate_layer_names(&ok, &net).is_empty());

        let bad = input(
            LayerKind::Groundwater,
            vec![
                rec(0, 0, "G1", 1.0, 1, "main"),
                rec(0, 1, "C1", 1.0, 2, "main"),
                rec(0, 2, "G1", 1.0, 3, "wells"),
            ],
        );
        let errors = validate_layer_names(&bad, &net);
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            LinkageError::UnknownFeatures { layer: "groundwater".into(), names: vec!["C1".into()] },
            "a catchment name is not a groundwater name"
        );
        assert!(matches!(&errors[1], LinkageError::DuplicatedAcrossMaps { name, .. } if name == "G1"));

        let rivers = input(LayerKind::River, vec![rec(0, 0, "anything", 1.0, 1, "main")]);
        assert!(validate_layer_names(&rivers, &net).is_empty(), "river names are not node names");

        let mut ds = input(LayerKind::DemandSite, vec![]);
        ds.wells = vec!["G1".into(), "Pozo 9".into()];
        assert_eq!(unknown_wells(&ds, &net), vec!["G1", "Pozo 9"], "wells must be demand sites");
    }
}
