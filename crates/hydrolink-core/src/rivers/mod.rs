//! River handling: break-node projection, segmentation tree and the segment
//! plan exchanged with the line splitter.

pub mod flow_break;
pub mod projection;
pub mod segment_tree;
pub mod segments;

pub use flow_break::{BreakKind, BreakNode, FlowBreakResolver, RiverPosition};
pub use projection::{LineProjector, PlanarProjector, Projection};
pub use segment_tree::RiverSegmentTree;
pub use segments::{Offset, Segment, SegmentLookup, SegmentPiece, SegmentPlan};
