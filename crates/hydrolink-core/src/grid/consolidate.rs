//! Cross-layer consolidation: one record per cell seen in any layer, with an
//! optional slot per layer.

use std::collections::BTreeMap;

use serde::Serialize;

use super::layer::{CellSummary, LayerGrid};
use super::{Cell, LayerKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedCell {
    pub cell: Cell,
    pub catchment: Option<CellSummary>,
    pub groundwater: Option<CellSummary>,
    pub river: Option<CellSummary>,
    pub demand_site: Option<CellSummary>,
}

impl ConsolidatedCell {
    fn empty(cell: Cell) -> Self {
        Self { cell, catchment: None, groundwater: None, river: None, demand_site: None }
    }

    pub fn slot(&self, kind: LayerKind) -> Option<&CellSummary> {
        match kind {
            LayerKind::Catchment => self.catchment.as_ref(),
            LayerKind::Groundwater => self.groundwater.as_ref(),
            LayerKind::River => self.river.as_ref(),
            LayerKind::DemandSite => self.demand_site.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: LayerKind) -> &mut Option<CellSummary> {
        match kind {
            LayerKind::Catchment => &mut self.catchment,
            LayerKind::Groundwater => &mut self.groundwater,
            LayerKind::River => &mut self.river,
            LayerKind::DemandSite => &mut self.demand_site,
        }
    }

    /// Best-ranked feature name of a layer in this cell.
    pub fn winner(&self, kind: LayerKind) -> Option<&str> {
        self.slot(kind).map(|s| s.winner().feature_name.as_str())
    }

    /// Cell id of the last present slot in catchment, groundwater, river,
    /// demand-site order.
    pub fn external_cell_id(&self) -> Option<i64> {
        LayerKind::ALL
            .iter()
            .rev()
            .find_map(|&k| self.slot(k).map(|s| s.winning_external_cell_id))
    }
}

/// Map names a consolidated layer was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMaps {
    pub primary: String,
    pub secondary: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidatedGrid {
    cells: BTreeMap<Cell, ConsolidatedCell>,
    maps: BTreeMap<LayerKind, LayerMaps>,
}

/// Merges layer grids into one record per cell.  A layer kind given twice
/// replaces the earlier one.
pub fn consolidate(layers: impl IntoIterator<Item = LayerGrid>) -> ConsolidatedGrid {
    let mut grid = ConsolidatedGrid::default();
    for layer in layers {
        let (kind, primary, secondary, cells) = layer.into_parts();
        for (cell, summary) in cells {
            let entry = grid.cells.entry(cell).or_insert_with(|| ConsolidatedCell::empty(cell));
            *entry.slot_mut(kind) = Some(summary);
        }
        grid.maps.insert(kind, LayerMaps { primary, secondary });
    }
    tracing::info!(cells = grid.cells.len(), layers = grid.maps.len(), "grid consolidated");
    grid
}

impl ConsolidatedGrid {
    pub fn get(&self, cell: &Cell) -> Option<&ConsolidatedCell> {
        self.cells.get(cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = &ConsolidatedCell> {
        self.cells.values()
    }

    pub fn layer_maps(&self, kind: LayerKind) -> Option<&LayerMaps> {
        self.maps.get(&kind)
    }

    pub fn has_layer(&self, kind: LayerKind) -> bool {
        self.maps.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
