//! Segment plan: the ordered river pieces handed to the line splitter, and
//! the run-scoped id → name lookup used to label what comes back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Scope};
use crate::grid::{Cell, LayerCellRecord};
use crate::network::ArcId;

/// Position along a river: an absolute distance from its start, or the end of
/// the line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Offset {
    Distance(f64),
    Full,
}

impl Offset {
    pub const START: Offset = Offset::Distance(0.0);
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Distance(d) => write!(f, "{d}"),
            Offset::Full => f.write_str("100%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub sequence_id: u32,
    pub river: ArcId,
    pub river_internal_id: i64,
    pub start: Offset,
    pub end: Offset,
    /// `"Below <node>"` or `"Below <river> Headflow"`.
    pub break_name: String,
    pub river_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLabel {
    pub break_name: String,
    pub river_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentLookup {
    labels: BTreeMap<u32, SegmentLabel>,
}

impl SegmentLookup {
    pub fn get(&self, sequence_id: u32) -> Option<&SegmentLabel> {
        self.labels.get(&sequence_id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One split-line piece intersected with a grid cell, as returned by the
/// overlay engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPiece {
    pub cell: Cell,
    pub segment_id: u32,
    pub length: f64,
    pub external_cell_id: i64,
    pub layer_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlan {
    segments: Vec<Segment>,
    lookup: SegmentLookup,
}

impl SegmentPlan {
    /// Numbers `segments` from 1 in the order given and builds the lookup.
    pub fn from_segments(mut segments: Vec<Segment>) -> Self {
        let mut lookup = SegmentLookup::default();
        for (i, seg) in segments.iter_mut().enumerate() {
            seg.sequence_id = i as u32 + 1;
            lookup.labels.insert(
                seg.sequence_id,
                SegmentLabel { break_name: seg.break_name.clone(), river_name: seg.river_name.clone() },
            );
        }
        Self { segments, lookup }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn lookup(&self) -> &SegmentLookup {
        &self.lookup
    }

    pub fn for_river(&self, river: ArcId) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.river == river)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Line-splitter input, one `L <id> <river> <start> <end>` line per segment.
    pub fn segment_rules(&self) -> String {
        let mut out = String::new();
        for s in &self.segments {
            out.push_str(&format!(
                "L {} {} {} {}\n",
                s.sequence_id, s.river_internal_id, s.start, s.end
            ));
        }
        out
    }

    /// Labels split-line pieces as river-layer records named
    /// `"<river>,<segment>"`.  Pieces with an unknown id are reported and dropped.
    pub fn river_records(
        &self,
        pieces: &[SegmentPiece],
        diagnostics: &mut Diagnostics,
    ) -> Vec<LayerCellRecord> {
        let mut records = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let Some(label) = self.lookup.get(piece.segment_id) else {
                diagnostics.warn(
                    Scope::River,
                    format!(
                        "split river piece in cell {} refers to unknown segment id {}",
                        piece.cell, piece.segment_id
                    ),
                );
                continue;
            };
            records.push(LayerCellRecord {
                cell: piece.cell,
                feature_name: format!("{},{}", label.river_name, label.break_name),
                metric: piece.length,
                external_cell_id: piece.external_cell_id,
                layer_name: piece.layer_name.clone(),
            });
        }
        records
    }
}
