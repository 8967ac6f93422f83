//! Point-onto-polyline projection seam.
//!
//! The resolver only needs "is the node on this river, and how far from the
//! river start".  [`PlanarProjector`] answers that with `geo` in the plane of
//! the input coordinates; a caller with its own geometry engine plugs in a
//! different [`LineProjector`].

use geo::{Closest, ClosestPoint, Coord, LineLocatePoint, LineString, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub on_line: bool,
    /// Distance along the line from its first vertex to the projected point,
    /// in the line's coordinate units.
    pub distance_from_start: f64,
}

pub trait LineProjector {
    fn project(&self, line: &LineString<f64>, point: Point<f64>) -> Projection;
}

/// Euclidean projector.  `tolerance` is the largest node-to-line distance still
/// counted as lying on the line; 0.0 requires an exact hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarProjector {
    pub tolerance: f64,
}

impl PlanarProjector {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance: tolerance.max(0.0) }
    }
}

impl LineProjector for PlanarProjector {
    fn project(&self, line: &LineString<f64>, point: Point<f64>) -> Projection {
        let on_line = match line.closest_point(&point) {
            Closest::Intersection(_) => true,
            Closest::SinglePoint(p) => distance(p.0, point.0) <= self.tolerance,
            Closest::Indeterminate => false,
        };
        let fraction = line.line_locate_point(&point).unwrap_or(0.0);
        Projection { on_line, distance_from_start: fraction * line_length(line) }
    }
}

pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|seg| distance(seg.start, seg.end)).sum()
}

fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
