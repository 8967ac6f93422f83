//! Linkage grid: per-layer cell grids, their consolidation into one record
//! per cell, and the output columns written for every cell.

pub mod columns;
pub mod consolidate;
pub mod layer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Scope;
use crate::network::FeatureKind;

pub use columns::LinkageRow;
pub use consolidate::{consolidate, ConsolidatedCell, ConsolidatedGrid};
pub use layer::{unknown_wells, validate_layer_names, CellSummary, LayerGrid, LayerInput};

/// Grid coordinate.  Ordered row-major so cell iteration is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: i64,
    pub col: i64,
}

impl Cell {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// `"<row>x<col>"` key written to the output grid.
    pub fn rc(&self) -> String {
        format!("{}x{}", self.row, self.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(r={}, c={})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Catchment,
    Groundwater,
    River,
    DemandSite,
}

impl LayerKind {
    /// Column and external-cell-id precedence order.
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Catchment,
        LayerKind::Groundwater,
        LayerKind::River,
        LayerKind::DemandSite,
    ];

    /// Node kind whose names this layer's features must carry.  The river
    /// layer is named after segments, not nodes.
    pub fn feature_kind(&self) -> Option<FeatureKind> {
        match self {
            LayerKind::Catchment => Some(FeatureKind::Catchment),
            LayerKind::Groundwater => Some(FeatureKind::Groundwater),
            LayerKind::River => None,
            LayerKind::DemandSite => Some(FeatureKind::DemandSite),
        }
    }

    pub fn from_feature(kind: FeatureKind) -> Option<Self> {
        match kind {
            FeatureKind::Catchment => Some(LayerKind::Catchment),
            FeatureKind::Groundwater => Some(LayerKind::Groundwater),
            FeatureKind::DemandSite => Some(LayerKind::DemandSite),
            _ => None,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            LayerKind::Catchment => Scope::Catchment,
            LayerKind::Groundwater => Scope::Groundwater,
            LayerKind::River => Scope::River,
            LayerKind::DemandSite => Scope::DemandSite,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerKind::Catchment => "catchment",
            LayerKind::Groundwater => "groundwater",
            LayerKind::River => "river",
            LayerKind::DemandSite => "demand site",
        };
        f.write_str(s)
    }
}

/// Metric used to rank features competing for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderCriterion {
    Area,
    Length,
}

/// One geometry × cell intersection produced by the overlay engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCellRecord {
    pub cell: Cell,
    pub feature_name: String,
    /// Intersected area or length, per the layer's order criterion.
    pub metric: f64,
    pub external_cell_id: i64,
    /// Map the feature came from.
    pub layer_name: String,
}
