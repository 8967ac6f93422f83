//! Run configuration: type codes, attribute column names, per-layer options,
//! connectivity cases and output field names.
//!
//! Every field carries `#[serde(default)]` so a partial JSON file only
//! overrides what it names.

use serde::{Deserialize, Serialize};

use crate::grid::{LayerKind, OrderCriterion};
use crate::network::{ArcKind, FeatureKind};

// ── Type codes ────────────────────────────────────────────────────────────────

/// Raw node type codes as stored in the network attribute table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTypeCodes {
    pub groundwater: i64,
    pub catchment: i64,
    pub demand_site: i64,
    pub return_flow_node: i64,
    pub tributary_inflow: i64,
    pub catchment_inflow_node: i64,
    pub river_withdrawal: i64,
    pub diversion_outflow: i64,
    pub reservoir: i64,
}

impl Default for NodeTypeCodes {
    fn default() -> Self {
        Self {
            groundwater: 3,
            catchment: 21,
            demand_site: 1,
            return_flow_node: 17,
            tributary_inflow: 13,
            catchment_inflow_node: 23,
            river_withdrawal: 10,
            diversion_outflow: 11,
            reservoir: 4,
        }
    }
}

impl NodeTypeCodes {
    pub fn kind_of(&self, code: i64) -> FeatureKind {
        match code {
            c if c == self.groundwater => FeatureKind::Groundwater,
            c if c == self.catchment => FeatureKind::Catchment,
            c if c == self.demand_site => FeatureKind::DemandSite,
            c if c == self.return_flow_node => FeatureKind::ReturnFlowNode,
            c if c == self.tributary_inflow => FeatureKind::TributaryInflow,
            c if c == self.catchment_inflow_node => FeatureKind::CatchmentInflowNode,
            c if c == self.river_withdrawal => FeatureKind::RiverWithdrawal,
            c if c == self.diversion_outflow => FeatureKind::DiversionOutflow,
            c if c == self.reservoir => FeatureKind::Reservoir,
            other => FeatureKind::Other(other),
        }
    }
}

/// Raw arc type codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcTypeCodes {
    pub runoff_infiltration: i64,
    pub transmission_link: i64,
    pub river: i64,
    pub canal: i64,
    pub return_flow: i64,
}

impl Default for ArcTypeCodes {
    fn default() -> Self {
        Self {
            runoff_infiltration: 22,
            transmission_link: 7,
            river: 6,
            canal: 15,
            return_flow: 8,
        }
    }
}

impl ArcTypeCodes {
    pub fn kind_of(&self, code: i64) -> ArcKind {
        match code {
            c if c == self.runoff_infiltration => ArcKind::RunoffInfiltration,
            c if c == self.transmission_link => ArcKind::TransmissionLink,
            c if c == self.return_flow => ArcKind::ReturnFlow,
            c if c == self.river => ArcKind::River,
            c if c == self.canal => ArcKind::Canal,
            other => ArcKind::Other(other),
        }
    }
}

// ── Attribute columns ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFields {
    pub name: String,
    pub type_id: String,
    pub object_id: String,
    pub internal_id: String,
}

impl Default for NodeFields {
    fn default() -> Self {
        Self {
            name: "Name".into(),
            type_id: "TypeID".into(),
            object_id: "ObjID".into(),
            internal_id: "cat".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcFields {
    pub name: String,
    pub type_id: String,
    pub object_id: String,
    pub internal_id: String,
    pub source_id: String,
    pub destination_id: String,
}

impl Default for ArcFields {
    fn default() -> Self {
        Self {
            name: "Name".into(),
            type_id: "TypeID".into(),
            object_id: "ObjID".into(),
            internal_id: "cat".into(),
            source_id: "SrcObjID".into(),
            destination_id: "DestObjID".into(),
        }
    }
}

// ── Layers ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOptions {
    pub order_criterion: OrderCriterion,
    /// Number of primary feature-name columns written per cell.
    pub columns_to_save: usize,
    /// Output column stem; primary columns use its first 7 characters,
    /// secondary-map columns its first character.
    pub column_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    pub catchment: LayerOptions,
    pub groundwater: LayerOptions,
    pub river: LayerOptions,
    pub demand_site: LayerOptions,
}

impl Default for LayerSettings {
    fn default() -> Self {
        let opts = |order_criterion, columns_to_save, prefix: &str| LayerOptions {
            order_criterion,
            columns_to_save,
            column_prefix: prefix.to_string(),
        };
        Self {
            catchment: opts(OrderCriterion::Area, 1, "Catchment"),
            groundwater: opts(OrderCriterion::Area, 1, "Groundwater"),
            river: opts(OrderCriterion::Length, 1, "River"),
            demand_site: opts(OrderCriterion::Area, 4, "DemandSite"),
        }
    }
}

impl LayerSettings {
    pub fn get(&self, kind: LayerKind) -> &LayerOptions {
        match kind {
            LayerKind::Catchment => &self.catchment,
            LayerKind::Groundwater => &self.groundwater,
            LayerKind::River => &self.river,
            LayerKind::DemandSite => &self.demand_site,
        }
    }
}

// ── Connectivity and output ───────────────────────────────────────────────────

/// One `(base, secondary)` pair checked by the connectivity stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityCase {
    pub base: FeatureKind,
    pub secondary: FeatureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFields {
    pub row: String,
    pub col: String,
    pub rc: String,
}

impl Default for OutputFields {
    fn default() -> Self {
        Self { row: "row".into(), col: "col".into(), rc: "rc".into() }
    }
}

// ── Top-level config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageConfig {
    pub node_codes: NodeTypeCodes,
    pub arc_codes: ArcTypeCodes,
    pub node_fields: NodeFields,
    pub arc_fields: ArcFields,
    /// Minimum name similarity for a tributary inflow to claim a river as its
    /// secondary river without an exact `"<river> Inflow"` match.
    pub tributary_match_threshold: f64,
    /// Maximum node-to-line distance still counted as lying on the line.
    pub projection_tolerance: f64,
    pub layers: LayerSettings,
    pub connectivity_cases: Vec<ConnectivityCase>,
    pub output_fields: OutputFields,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            node_codes: NodeTypeCodes::default(),
            arc_codes: ArcTypeCodes::default(),
            node_fields: NodeFields::default(),
            arc_fields: ArcFields::default(),
            tributary_match_threshold: 0.9,
            projection_tolerance: 0.0,
            layers: LayerSettings::default(),
            connectivity_cases: vec![
                ConnectivityCase {
                    base: FeatureKind::Groundwater,
                    secondary: FeatureKind::DemandSite,
                },
                ConnectivityCase {
                    base: FeatureKind::Groundwater,
                    secondary: FeatureKind::Catchment,
                },
            ],
            output_fields: OutputFields::default(),
        }
    }
}

impl LinkageConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codes_resolve_to_kinds() {
        let codes = NodeTypeCodes::default();
        assert_eq!(codes.kind_of(3), FeatureKind::Groundwater);
        assert_eq!(codes.kind_of(21), FeatureKind::Catchment);
        assert_eq!(codes.kind_of(13), FeatureKind::TributaryInflow);
        assert_eq!(codes.kind_of(99), FeatureKind::Other(99));

        let arcs = ArcTypeCodes::default();
        assert_eq!(arcs.kind_of(22), ArcKind::RunoffInfiltration);
        assert_eq!(arcs.kind_of(15), ArcKind::Canal);
        assert_eq!(arcs.kind_of(-1), ArcKind::Other(-1));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = LinkageConfig::from_json(
            r#"{ "tributary_match_threshold": 0.8, "node_codes": { "groundwater": 30 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.tributary_match_threshold, 0.8);
        assert_eq!(cfg.node_codes.groundwater, 30);
        assert_eq!(cfg.node_codes.catchment, 21, "unlisted code should keep its default");
        assert_eq!(cfg.layers.demand_site.columns_to_save, 4);
        assert_eq!(cfg.connectivity_cases.len(), 2);
    }
}
