//! OGC validity checks for polygons.

use std::collections::HashSet;

use super::{Contour, ContourLayout, Location, Orientation, Polygon};
use crate::{
    geom::{Coordinate, Segment},
    predicates::{intersect_robust, SegmentIntersection},
};

/// Why a polygon isn't valid. Contours are identified by their index in
/// [`Polygon::contours`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("contour {contour} has fewer than three vertices")]
    TooFewVertices { contour: usize },
    #[error("contour {contour} encloses no area")]
    ZeroArea { contour: usize },
    #[error("contour {contour} intersects itself at {at:?}")]
    SelfIntersection { contour: usize, at: Coordinate },
    #[error("contours {first} and {second} cross at {at:?}")]
    ContoursCross {
        first: usize,
        second: usize,
        at: Coordinate,
    },
    #[error("contours {first} and {second} share a boundary segment")]
    ContoursOverlap { first: usize, second: usize },
    #[error("contour {contour} is wound the wrong way for its layout")]
    WrongOrientation { contour: usize },
    #[error("hole {contour} is not inside a shell")]
    HoleOutsideShell { contour: usize },
    #[error("shell {contour} is inside another contour")]
    NestedShell { contour: usize },
    #[error("touching contours disconnect the interior near {at:?}")]
    DisconnectedInterior { at: Coordinate },
}

/// A quick (to write, not to execute) structure for tracking which elements
/// have been joined together.
struct Equiv<T> {
    sets: Vec<HashSet<T>>,
}

impl<T> Default for Equiv<T> {
    fn default() -> Self {
        Self {
            sets: Vec::new(),
        }
    }
}

impl<T: std::hash::Hash + Eq> Equiv<T> {
    fn find_set(&self, s: &T) -> Option<usize> {
        self.sets.iter().position(|set| set.contains(s))
    }

    /// Joins `s` and `t`, returning false if they were already joined.
    fn add_equivalence(&mut self, s: T, t: T) -> bool {
        match (self.find_set(&s), self.find_set(&t)) {
            (None, None) => self.sets.push([s, t].into_iter().collect()),
            (None, Some(i)) => {
                self.sets[i].insert(s);
            }
            (Some(i), None) => {
                self.sets[i].insert(t);
            }
            (Some(i), Some(j)) if i != j => {
                let j_set = std::mem::take(&mut self.sets[j]);
                self.sets[i].extend(j_set);
                self.sets.remove(j);
            }
            (Some(_), Some(_)) => return false,
        }
        true
    }
}

/// A vertex of the contour/touch-point graph. Touch points are keyed by the
/// shell whose interior they pinch, as well as by position.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum TouchNode {
    Contour(usize),
    Touch { shell: usize, point: usize },
}

/// How one contour sits relative to another.
#[derive(Default)]
struct Relation {
    /// Some piece of the first contour is inside the second.
    inside: bool,
    /// Some piece of the first contour is outside the second.
    outside: bool,
    /// The contours share a boundary segment.
    overlap: bool,
    /// Points where the contours meet.
    touches: Vec<Coordinate>,
}

/// Cuts every edge of `a` where it meets `b`, and locates the pieces.
fn relate_contours(a: &Contour, b: &Contour, tolerance: f64) -> Relation {
    let mut rel = Relation::default();
    let b_segs: Vec<Segment> = b.segments().collect();

    for sa in a.segments() {
        let mut cuts = vec![0.0, 1.0];
        for sb in &b_segs {
            match intersect_robust(&sa, sb, tolerance) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point(p) => {
                    cuts.push(sa.project(&p).clamp(0.0, 1.0));
                    if !rel.touches.iter().any(|t| t.tolerant_eq(&p, tolerance)) {
                        rel.touches.push(p);
                    }
                }
                SegmentIntersection::Overlap(_) => rel.overlap = true,
            }
        }
        cuts.sort_by(f64::total_cmp);
        for w in cuts.windows(2) {
            let piece = Segment::new(sa.v1.affine(&sa.v2, w[0]), sa.v1.affine(&sa.v2, w[1]));
            if piece.is_singular(tolerance) {
                continue;
            }
            match b.locate(&piece.center(), tolerance) {
                Location::Interior => rel.inside = true,
                Location::Exterior => rel.outside = true,
                Location::Boundary => {}
            }
        }
    }
    rel
}

pub(super) fn ogc_validation_error(poly: &Polygon, tolerance: f64) -> Option<ValidationError> {
    let contours = poly.contours();

    for (i, c) in contours.iter().enumerate() {
        if c.vertices().len() < 3 {
            return Some(ValidationError::TooFewVertices { contour: i });
        }
        if let Some(&at) = c.self_intersections(tolerance).first() {
            return Some(ValidationError::SelfIntersection { contour: i, at });
        }
        if c.area() <= tolerance * tolerance {
            return Some(ValidationError::ZeroArea { contour: i });
        }
    }

    // How deeply each contour is nested, and the points where contours touch.
    let mut depth = vec![0usize; contours.len()];
    let mut containers: Vec<Vec<usize>> = vec![Vec::new(); contours.len()];
    let mut touches: Vec<Coordinate> = Vec::new();
    let mut touch_pairs: Vec<(usize, usize, usize)> = Vec::new();
    for i in 0..contours.len() {
        for j in (i + 1)..contours.len() {
            let ij = relate_contours(&contours[i], &contours[j], tolerance);
            if ij.overlap {
                return Some(ValidationError::ContoursOverlap {
                    first: i,
                    second: j,
                });
            }
            let ji = relate_contours(&contours[j], &contours[i], tolerance);
            if (ij.inside && ij.outside) || (ji.inside && ji.outside) {
                let at = ij.touches.first().copied().unwrap_or(contours[i].vertices()[0]);
                return Some(ValidationError::ContoursCross {
                    first: i,
                    second: j,
                    at,
                });
            }
            if ij.inside {
                depth[i] += 1;
                containers[i].push(j);
            } else if ji.inside {
                depth[j] += 1;
                containers[j].push(i);
            }

            for p in ij.touches {
                let t = match touches.iter().position(|q| q.tolerant_eq(&p, tolerance)) {
                    Some(t) => t,
                    None => {
                        touches.push(p);
                        touches.len() - 1
                    }
                };
                touch_pairs.push((i, j, t));
            }
        }
    }

    for (i, c) in contours.iter().enumerate() {
        let orientation = c.orientation(tolerance);
        let declared_wrong = matches!(
            (c.layout(), orientation),
            (ContourLayout::External, Orientation::Clockwise)
                | (ContourLayout::Internal, Orientation::CounterClockwise)
        );
        if declared_wrong {
            return Some(ValidationError::WrongOrientation { contour: i });
        }
        // Shells sit at even depths (islands inside holes are fine) and holes
        // at odd ones.
        match orientation {
            Orientation::CounterClockwise if depth[i] % 2 == 1 => {
                return Some(ValidationError::NestedShell { contour: i });
            }
            Orientation::Clockwise if depth[i] % 2 == 0 => {
                return Some(ValidationError::HoleOutsideShell { contour: i });
            }
            _ => {}
        }
    }

    // Each hole belongs to the shell one level up. Touches between different
    // shells (or between a shell and the holes of another) only pinch the
    // exterior, so they don't count.
    let shell_of: Vec<usize> = (0..contours.len())
        .map(|k| {
            if depth[k] % 2 == 0 {
                k
            } else {
                containers[k]
                    .iter()
                    .copied()
                    .find(|&c| depth[c] + 1 == depth[k])
                    .unwrap_or(k)
            }
        })
        .collect();

    // A shell, its holes, and their touch points form a bipartite graph. The
    // shell's interior is connected exactly when that graph is a forest.
    let mut equiv = Equiv::default();
    let mut seen = HashSet::new();
    for (i, j, point) in touch_pairs {
        let shell = shell_of[i];
        if shell != shell_of[j] {
            continue;
        }
        for c in [i, j] {
            if !seen.insert((c, point)) {
                continue;
            }
            let touch = TouchNode::Touch { shell, point };
            if !equiv.add_equivalence(TouchNode::Contour(c), touch) {
                return Some(ValidationError::DisconnectedInterior { at: touches[point] });
            }
        }
    }

    None
}
