//! Attribute-table rows → typed node and arc records.
//!
//! Rows arrive as JSON objects keyed by column name, paired with the feature's
//! geometry.  Type id and object id are mandatory; a row without them aborts
//! the parse.  Names may be null.  The internal id falls back to the object id
//! when its column is absent.

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ArcFields, NodeFields};
use crate::error::{LinkageError, Result};
use crate::network::{ArcId, ArcRecord, NodeId, NodeRecord};

const NODE_TABLE: &str = "nodes";
const ARC_TABLE: &str = "arcs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFeature {
    pub attributes: Map<String, Value>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcFeature {
    pub attributes: Map<String, Value>,
    pub coordinates: Vec<[f64; 2]>,
}

/// Fails on the first `required` column missing from `columns`.
pub fn required_columns_present<'a>(
    table: &str,
    columns: impl IntoIterator<Item = &'a str>,
    required: &[&str],
) -> Result<()> {
    let columns: Vec<&str> = columns.into_iter().collect();
    match required.iter().find(|r| !columns.contains(*r)) {
        Some(missing) => Err(LinkageError::MissingColumn {
            table: table.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Checks the mandatory columns against the first row's attribute names.
fn check_header(table: &str, first: Option<&Map<String, Value>>, required: &[&str]) -> Result<()> {
    match first {
        Some(map) => required_columns_present(table, map.keys().map(String::as_str), required),
        None => Ok(()),
    }
}

pub fn parse_nodes(features: &[NodeFeature], fields: &NodeFields) -> Result<Vec<NodeRecord>> {
    check_header(
        NODE_TABLE,
        features.first().map(|f| &f.attributes),
        &[fields.object_id.as_str(), fields.type_id.as_str()],
    )?;
    features
        .iter()
        .enumerate()
        .map(|(row, f)| -> Result<NodeRecord> {
            let attrs = Attributes { table: NODE_TABLE, row, map: &f.attributes };
            let id = attrs.required_int(&fields.object_id)?;
            Ok(NodeRecord {
                id: NodeId(id),
                type_code: attrs.required_int(&fields.type_id)?,
                name: attrs.text(&fields.name)?,
                x: f.x,
                y: f.y,
                internal_id: attrs.int(&fields.internal_id)?.unwrap_or(id),
            })
        })
        .collect()
}

pub fn parse_arcs(features: &[ArcFeature], fields: &ArcFields) -> Result<Vec<ArcRecord>> {
    check_header(
        ARC_TABLE,
        features.first().map(|f| &f.attributes),
        &[fields.object_id.as_str(), fields.type_id.as_str()],
    )?;
    features
        .iter()
        .enumerate()
        .map(|(row, f)| -> Result<ArcRecord> {
            let attrs = Attributes { table: ARC_TABLE, row, map: &f.attributes };
            let id = attrs.required_int(&fields.object_id)?;
            let line: LineString<f64> =
                f.coordinates.iter().map(|&[x, y]| Coord { x, y }).collect();
            Ok(ArcRecord {
                id: ArcId(id),
                type_code: attrs.required_int(&fields.type_id)?,
                name: attrs.text(&fields.name)?,
                internal_id: attrs.int(&fields.internal_id)?.unwrap_or(id),
                src: attrs.int(&fields.source_id)?.map(NodeId),
                dst: attrs.int(&fields.destination_id)?.map(NodeId),
                line,
            })
        })
        .collect()
}

// ── Row access ────────────────────────────────────────────────────────────────

struct Attributes<'a> {
    table: &'static str,
    row: usize,
    map: &'a Map<String, Value>,
}

impl Attributes<'_> {
    fn invalid(&self, column: &str, reason: impl Into<String>) -> LinkageError {
        LinkageError::InvalidAttribute {
            table: self.table.to_string(),
            row: self.row,
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    fn required_int(&self, column: &str) -> Result<i64> {
        self.int(column)?.ok_or_else(|| LinkageError::MissingColumn {
            table: self.table.to_string(),
            column: column.to_string(),
        })
    }

    /// Integers may be stored as JSON integers, whole floats or numeric text.
    fn int(&self, column: &str) -> Result<Option<i64>> {
        match self.map.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                        _ => Err(self.invalid(column, format!("expected an integer, found {n}"))),
                    }
                }
            }
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.invalid(column, format!("expected an integer, found \"{s}\""))),
            Some(other) => Err(self.invalid(column, format!("expected an integer, found {other}"))),
        }
    }

    fn text(&self, column: &str) -> Result<Option<String>> {
        match self.map.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.invalid(column, format!("expected text, found {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("test attributes must be an object"),
        }
    }

    #[test]
    fn nodes_parse_with_null_name_and_fallback_internal_id() {
        let features = vec![
            NodeFeature { attributes: attrs(json!({"ObjID": 4, "TypeID": 3, "Name": "GW-1", "cat": 40})), x: 1.0, y: 2.0 },
            NodeFeature { attributes: attrs(json!({"ObjID": "5", "TypeID": 21.0, "Name": null})), x: 0.0, y: 0.0 },
        ];
        let nodes = parse_nodes(&features, &NodeFields::default()).unwrap();
        assert_eq!(nodes[0].name.as_deref(), Some("GW-1"));
        assert_eq!(nodes[0].internal_id, 40);
        assert_eq!(nodes[1].id, NodeId(5));
        assert_eq!(nodes[1].type_code, 21);
        assert_eq!(nodes[1].name, None);
        assert_eq!(nodes[1].internal_id, 5, "internal id falls back to the object id");
    }

    #[test]
    fn missing_type_column_is_fatal() {
        let features = vec![NodeFeature { attributes: attrs(json!({"ObjID": 1})), x: 0.0, y: 0.0 }];
        let err = parse_nodes(&features, &NodeFields::default()).unwrap_err();
        assert_eq!(
            err,
            LinkageError::MissingColumn { table: "nodes".into(), column: "TypeID".into() }
        );
    }

    #[test]
    fn header_is_checked_before_any_row() {
        let features = vec![ArcFeature { attributes: attrs(json!({"ObjID": "x", "Name": "Maipo"})), coordinates: vec![] }];
        let err = parse_arcs(&features, &ArcFields::default()).unwrap_err();
        assert_eq!(
            err,
            LinkageError::MissingColumn { table: "arcs".into(), column: "TypeID".into() },
            "a missing column is reported before a bad value"
        );
        assert!(parse_arcs(&[], &ArcFields::default()).unwrap().is_empty());
    }

    #[test]
    fn arcs_parse_endpoints_and_geometry() {
        let features = vec![
            ArcFeature {
                attributes: attrs(json!({"ObjID": 9, "TypeID": 22, "SrcObjID": 1, "DestObjID": 2})),
                coordinates: vec![],
            },
            ArcFeature {
                attributes: attrs(json!({"ObjID": 10, "TypeID": 6, "Name": "Maipo", "SrcObjID": null})),
                coordinates: vec![[0.0, 0.0], [3.0, 4.0]],
            },
        ];
        let arcs = parse_arcs(&features, &ArcFields::default()).unwrap();
        assert_eq!(arcs[0].src, Some(NodeId(1)));
        assert_eq!(arcs[0].dst, Some(NodeId(2)));
        assert_eq!(arcs[1].src, None);
        assert_eq!(arcs[1].line.0.len(), 2);
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let features = vec![ArcFeature {
            attributes: attrs(json!({"ObjID": "x9", "TypeID": 6})),
            coordinates: vec![],
        }];
        match parse_arcs(&features, &ArcFields::default()) {
            Err(LinkageError::InvalidAttribute { column, row, .. }) => {
                assert_eq!(column, "ObjID");
                assert_eq!(row, 0);
            }
            other => panic!("expected an invalid attribute error, got {other:?}"),
        }
    }

    #[test]
    fn header_check_names_first_missing_column() {
        let header = ["ObjID", "Name"];
        let err = required_columns_present("nodes", header.iter().copied(), &["ObjID", "TypeID"]).unwrap_err();
        assert!(err.to_string().contains("[TypeID]"));
        assert!(required_columns_present("nodes", header.iter().copied(), &["Name"]).is_ok());
    }
}
