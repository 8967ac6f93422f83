//! Output columns of the linkage grid.
//!
//! Every layer writes `columns_to_save` primary columns, best feature first,
//! and one column per secondary map holding that map's top feature.  Column
//! names are cut to fit a 10-character field limit: 7 prefix characters plus
//! the column number, or the prefix initial plus 9 characters of the map name.

use serde::Serialize;
use serde_json::{Map, Value};

use super::consolidate::{ConsolidatedCell, ConsolidatedGrid};
use super::LayerKind;
use crate::config::{LayerOptions, LinkageConfig, OutputFields};
use crate::diagnostics::Diagnostics;

pub fn primary_columns(prefix: &str, count: usize) -> Vec<String> {
    let stem: String = prefix.chars().take(7).collect();
    (1..=count).map(|i| format!("{stem}{i}")).collect()
}

pub fn secondary_column(prefix: &str, map_name: &str) -> String {
    let initial: String = prefix.chars().take(1).collect();
    let tail: String = map_name.chars().take(9).collect();
    format!("{initial}{tail}")
}

/// One output row: the cell key columns and every layer column, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkageRow {
    pub row: i64,
    pub col: i64,
    pub rc: String,
    pub cell_id: Option<i64>,
    pub columns: Vec<(String, String)>,
}

impl LinkageRow {
    pub fn value(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.as_str())
    }

    /// Flat JSON object using the configured key column names.
    pub fn to_json(&self, fields: &OutputFields) -> Value {
        let mut obj = Map::new();
        obj.insert(fields.row.clone(), Value::from(self.row));
        obj.insert(fields.col.clone(), Value::from(self.col));
        obj.insert(fields.rc.clone(), Value::from(self.rc.clone()));
        obj.insert("cell_id".to_string(), self.cell_id.map(Value::from).unwrap_or(Value::Null));
        for (name, v) in &self.columns {
            obj.insert(name.clone(), Value::from(v.clone()));
        }
        Value::Object(obj)
    }
}

impl ConsolidatedGrid {
    /// Column names in output order, excluding the cell key columns.
    pub fn column_names(&self, config: &LinkageConfig) -> Vec<String> {
        let mut names = Vec::new();
        for kind in LayerKind::ALL {
            let opts = config.layers.get(kind);
            names.extend(primary_columns(&opts.column_prefix, opts.columns_to_save));
            if let Some(maps) = self.layer_maps(kind) {
                names.extend(maps.secondary.iter().map(|m| secondary_column(&opts.column_prefix, m)));
            }
        }
        names
    }

    /// Materializes one row per cell.  Primary-column truncation and
    /// ambiguous secondary maps are reported as warnings of the layer's scope.
    pub fn rows(&self, config: &LinkageConfig, diagnostics: &mut Diagnostics) -> Vec<LinkageRow> {
        let rows: Vec<LinkageRow> = self
            .cells()
            .map(|cell| {
                let mut columns = Vec::new();
                for kind in LayerKind::ALL {
                    self.layer_columns(cell, kind, config.layers.get(kind), &mut columns, diagnostics);
                }
                LinkageRow {
                    row: cell.cell.row,
                    col: cell.cell.col,
                    rc: cell.cell.rc(),
                    cell_id: cell.external_cell_id(),
                    columns,
                }
            })
            .collect();
        tracing::info!(rows = rows.len(), "linkage rows materialized");
        rows
    }

    fn layer_columns(
        &self,
        cell: &ConsolidatedCell,
        kind: LayerKind,
        opts: &LayerOptions,
        out: &mut Vec<(String, String)>,
        diagnostics: &mut Diagnostics,
    ) {
        let maps = self.layer_maps(kind);
        let summary = cell.slot(kind);

        // Primary map
        let names = primary_columns(&opts.column_prefix, opts.columns_to_save);
        let found: Vec<&str> = match (summary, maps) {
            (Some(s), Some(m)) => s.in_map(&m.primary).map(|f| f.feature_name.as_str()).collect(),
            _ => Vec::new(),
        };
        if found.len() > opts.columns_to_save {
            let excess = found.len() - opts.columns_to_save;
            diagnostics.warn(
                kind.scope(),
                format!(
                    "cell {}: map [{}] has {} features but only {} columns are saved; {} dropped, kept [{}]",
                    cell.cell,
                    maps.map(|m| m.primary.as_str()).unwrap_or_default(),
                    found.len(),
                    opts.columns_to_save,
                    excess,
                    found[..opts.columns_to_save].join(", "),
                ),
            );
        }
        for (i, name) in names.into_iter().enumerate() {
            let value = found.get(i).copied().unwrap_or_default();
            out.push((name, value.to_string()));
        }

        // Secondary maps
        let Some(maps) = maps else { return };
        for map in &maps.secondary {
            let found: Vec<&str> = summary
                .map(|s| s.in_map(map).map(|f| f.feature_name.as_str()).collect())
                .unwrap_or_default();
            if found.len() > 1 {
                diagnostics.warn(
                    kind.scope(),
                    format!(
                        "cell {}: map [{}] has {} features; keeping the first [{}]",
                        cell.cell,
                        map,
                        found.len(),
                        found[0]
                    ),
                );
            }
            let value = found.first().copied().unwrap_or_default();
            out.push((secondary_column(&opts.column_prefix, map), value.to_string()));
        }
    }
}
