use serde::{Deserialize, Serialize};

use super::{coordinates_from_flat, ContourLayout, Location, Orientation};
use crate::{
    error::{Error, Result},
    geom::{BoundingRectangle, Coordinate, Segment},
    predicates::{intersect_robust, SegmentIntersection},
};

/// A closed ring of vertices.
///
/// The closing edge from the last vertex back to the first is implicit: if the
/// vertex list passed to [`Contour::new`] repeats its first vertex at the end,
/// the repetition is dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    vertices: Vec<Coordinate>,
    layout: ContourLayout,
}

pub(crate) fn cyclic_pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    xs.windows(2)
        .map(|pair| (&pair[0], &pair[1]))
        .chain(xs.last().zip(xs.first()).filter(|_| xs.len() > 1))
}

impl Contour {
    pub fn new(mut vertices: Vec<Coordinate>) -> Self {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self {
            vertices,
            layout: ContourLayout::Unknown,
        }
    }

    /// Builds a contour from interleaved `x, y` values.
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        Ok(Self::new(coordinates_from_flat(flat)?))
    }

    pub fn with_layout(mut self, layout: ContourLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> ContourLayout {
        self.layout
    }

    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    /// A contour with fewer than three vertices can't enclose anything.
    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    /// The edges of the contour, including the closing one.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        cyclic_pairs(&self.vertices).map(|(p, q)| Segment::new(*p, *q))
    }

    pub fn bounding_rectangle(&self) -> Option<BoundingRectangle> {
        BoundingRectangle::from_coordinates(&self.vertices)
    }

    /// The same ring, traversed the other way.
    pub fn reversed(&self) -> Contour {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        Contour {
            vertices,
            layout: self.layout,
        }
    }

    pub(crate) fn translated(&self, dx: f64, dy: f64) -> Contour {
        Contour {
            vertices: self.vertices.iter().map(|v| v.translated(dx, dy)).collect(),
            layout: self.layout,
        }
    }

    /// The shoelace area: positive if the contour runs counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        let Some(&origin) = self.vertices.first() else {
            return 0.0;
        };
        // Measuring from the first vertex keeps the products small.
        let twice: f64 = cyclic_pairs(&self.vertices)
            .map(|(p, q)| (*p - origin).cross(&(*q - origin)))
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }

    /// All the places where the contour touches or crosses itself, apart from
    /// the shared vertices of consecutive edges.
    pub fn self_intersections(&self, tolerance: f64) -> Vec<Coordinate> {
        let segs: Vec<Segment> = self.segments().collect();
        let n = segs.len();
        let mut ret: Vec<Coordinate> = Vec::new();
        let mut push = |c: Coordinate| {
            if !ret.iter().any(|r| r.tolerant_eq(&c, tolerance)) {
                ret.push(c);
            }
        };

        for i in 0..n {
            for j in (i + 1)..n {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                match intersect_robust(&segs[i], &segs[j], tolerance) {
                    SegmentIntersection::None => {}
                    SegmentIntersection::Point(p) => {
                        if !adjacent {
                            push(p);
                        }
                    }
                    SegmentIntersection::Overlap(s) => {
                        // Consecutive edges that double back on each other overlap
                        // away from their shared vertex.
                        let shared = if j == i + 1 { segs[i].v2 } else { segs[i].v1 };
                        for end in [s.v1, s.v2] {
                            if !adjacent || !end.tolerant_eq(&shared, tolerance) {
                                push(end);
                            }
                        }
                    }
                }
            }
        }
        ret
    }

    pub fn is_simple(&self, tolerance: f64) -> bool {
        self.self_intersections(tolerance).is_empty()
    }

    /// The winding direction. Undefined for contours without a well-defined
    /// inside, meaning self-intersecting or zero-area ones.
    pub fn orientation(&self, tolerance: f64) -> Orientation {
        if self.is_empty() || !self.is_simple(tolerance) {
            return Orientation::Undefined;
        }
        let area = self.signed_area();
        if area > 0.0 {
            Orientation::CounterClockwise
        } else if area < 0.0 {
            Orientation::Clockwise
        } else {
            Orientation::Undefined
        }
    }

    /// A point strictly inside the contour.
    ///
    /// We cast a horizontal line halfway through the tallest vertex-free band
    /// and take the middle of the widest interior run along it.
    pub fn interior_point(&self) -> Result<Coordinate> {
        let mut ys: Vec<f64> = self.vertices.iter().map(|v| v.y).collect();
        ys.sort_by(f64::total_cmp);
        ys.dedup();

        let band = ys
            .windows(2)
            .max_by(|a, b| (a[1] - a[0]).total_cmp(&(b[1] - b[0])))
            .ok_or_else(|| Error::InvalidOperation("contour has no vertical extent".into()))?;
        let y = (band[0] + band[1]) / 2.0;

        let mut xs: Vec<f64> = self
            .segments()
            .filter(|s| (s.v1.y < y) != (s.v2.y < y))
            .map(|s| s.v1.x + (y - s.v1.y) * (s.v2.x - s.v1.x) / (s.v2.y - s.v1.y))
            .collect();
        xs.sort_by(f64::total_cmp);

        let (lo, hi) = xs
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
            .ok_or_else(|| Error::InvalidOperation("contour has no interior".into()))?;
        if hi <= lo {
            return Err(Error::InvalidOperation("contour has no interior".into()));
        }
        Ok(Coordinate::new((lo + hi) / 2.0, y))
    }

    /// Even-odd containment, ignoring the boundary.
    ///
    /// The ray goes in the positive x direction, and an edge counts if it has
    /// one endpoint strictly below `p` and the other at or above.
    pub(crate) fn winds_around(&self, p: &Coordinate) -> bool {
        let mut inside = false;
        for s in self.segments() {
            if (s.v1.y > p.y) != (s.v2.y > p.y) {
                let x = s.v1.x + (p.y - s.v1.y) * (s.v2.x - s.v1.x) / (s.v2.y - s.v1.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Classifies a point against the contour, with anything within `tolerance`
    /// of an edge on the boundary.
    pub fn locate(&self, p: &Coordinate, tolerance: f64) -> Location {
        if self.segments().any(|s| s.distance_to(p) < tolerance) {
            Location::Boundary
        } else if self.winds_around(p) {
            Location::Interior
        } else {
            Location::Exterior
        }
    }
}
