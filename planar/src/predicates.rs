//! Numerically robust geometric predicates.
//!
//! The rule in this module is that nothing fails for numerical reasons: when
//! an answer can't be determined, we say "no intersection" (or "undefined")
//! and let the planar graph builder sort out the consequences.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::{
    geom::{Coordinate, Segment},
    geometry::Dimension,
};

/// Snapping fails if a coordinate is more than this many grid cells from the
/// grid origin, because at that point rounding to a cell loses all precision.
pub const MAX_GRID_RATIO: f64 = 1e15;

/// Above this many points, the convex hull pre-filters points that are
/// obviously interior.
const HULL_PREFILTER_THRESHOLD: usize = 200;

/// Returns the exact sign of the determinant `x1 * y2 - x2 * y1`.
///
/// This is the orientation of `(x2, y2)` relative to the line from the origin
/// through `(x1, y1)`, evaluated with adaptive precision, so large or nearly
/// parallel rows can't flip the sign through cancellation.
pub fn determinant_sign(x1: f64, y1: f64, x2: f64, y2: f64) -> i32 {
    let det = robust::orient2d(
        robust::Coord { x: 0.0, y: 0.0 },
        robust::Coord { x: x1, y: y1 },
        robust::Coord { x: x2, y: y2 },
    );
    sign_of(det)
}

fn sign_of(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// The orientation of `c` relative to the directed line from `a` to `b`.
///
/// Returns `1` if `c` is to the left (counter-clockwise), `-1` if it's to the
/// right, and `0` if the three points are exactly collinear.
pub fn orientation(a: &Coordinate, b: &Coordinate, c: &Coordinate) -> i32 {
    let det = robust::orient2d(
        robust::Coord { x: a.x, y: a.y },
        robust::Coord { x: b.x, y: b.y },
        robust::Coord { x: c.x, y: c.y },
    );
    sign_of(det)
}

/// The orientation of `p` relative to a directed segment. See [`orientation`].
pub fn orientation_index(segment: &Segment, p: &Coordinate) -> i32 {
    orientation(&segment.v1, &segment.v2, p)
}

/// The intersection of two segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentIntersection {
    /// The segments don't meet.
    None,
    /// The segments meet in a single point.
    Point(Coordinate),
    /// The segments are collinear and share a sub-segment.
    Overlap(Segment),
}

impl SegmentIntersection {
    /// The dimension of the intersection, or `None` if it's empty.
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            SegmentIntersection::None => None,
            SegmentIntersection::Point(_) => Some(Dimension::Zero),
            SegmentIntersection::Overlap(_) => Some(Dimension::One),
        }
    }

    fn translated(self, dx: f64, dy: f64) -> Self {
        match self {
            SegmentIntersection::None => SegmentIntersection::None,
            SegmentIntersection::Point(p) => SegmentIntersection::Point(p.translated(dx, dy)),
            SegmentIntersection::Overlap(s) => SegmentIntersection::Overlap(Segment::new(
                s.v1.translated(dx, dy),
                s.v2.translated(dx, dy),
            )),
        }
    }
}

/// Intersects two segments by solving for the parameters directly.
///
/// This is fast, but can misclassify nearly-degenerate configurations. Points
/// within `tolerance` of an input endpoint are reported as that endpoint.
pub fn intersect_fast(a: &Segment, b: &Segment, tolerance: f64) -> SegmentIntersection {
    let la = a.length();
    let lb = b.length();

    if la < tolerance || lb < tolerance {
        let (short, long) = if la <= lb { (a, b) } else { (b, a) };
        return if long.distance_to(&short.v1) < tolerance {
            SegmentIntersection::Point(short.v1)
        } else {
            SegmentIntersection::None
        };
    }

    let collinear = (a.line_distance_to(&b.v1) < tolerance
        && a.line_distance_to(&b.v2) < tolerance)
        || (b.line_distance_to(&a.v1) < tolerance && b.line_distance_to(&a.v2) < tolerance);
    if collinear {
        return collinear_intersection(a, b, tolerance);
    }

    let r = a.direction();
    let s = b.direction();
    let denom = r.cross(&s);
    if denom == 0.0 {
        return SegmentIntersection::None;
    }

    let qp = b.v1 - a.v1;
    let t = qp.cross(&s) / denom;
    let u = qp.cross(&r) / denom;
    let slack_a = tolerance / la;
    let slack_b = tolerance / lb;
    if !(-slack_a..=1.0 + slack_a).contains(&t) || !(-slack_b..=1.0 + slack_b).contains(&u) {
        return SegmentIntersection::None;
    }

    let p = a.v1 + r.scaled(t.clamp(0.0, 1.0));
    for e in [a.v1, a.v2, b.v1, b.v2] {
        if e.tolerant_eq(&p, tolerance) {
            return SegmentIntersection::Point(e);
        }
    }
    SegmentIntersection::Point(p)
}

/// The intersection of two segments that lie (within tolerance) on a common line.
///
/// We sort the four endpoints along the line and take the middle interval.
fn collinear_intersection(a: &Segment, b: &Segment, tolerance: f64) -> SegmentIntersection {
    let axis = if a.length() >= b.length() { a } else { b };
    let dir = axis.direction();
    let len = dir.length();
    let param = |p: &Coordinate| (*p - axis.v1).dot(&dir) / len;

    let (a_lo, a_hi) = ordered(param(&a.v1), param(&a.v2));
    let (b_lo, b_hi) = ordered(param(&b.v1), param(&b.v2));
    if a_lo.max(b_lo) > a_hi.min(b_hi) + tolerance {
        return SegmentIntersection::None;
    }

    let mut ends = [a.v1, a.v2, b.v1, b.v2];
    ends.sort_by_key(|p| OrderedFloat(param(p)));
    let (p, q) = (ends[1], ends[2]);
    if p.tolerant_eq(&q, tolerance) {
        SegmentIntersection::Point(p)
    } else {
        SegmentIntersection::Overlap(Segment::new(p, q))
    }
}

fn ordered(s: f64, t: f64) -> (f64, f64) {
    if s <= t {
        (s, t)
    } else {
        (t, s)
    }
}

/// Intersects two segments, guarding against cancellation.
///
/// Exact orientation tests cheaply reject pairs that can't meet. Surviving
/// pairs are re-centered around the middle of their bounding box before
/// solving, so that the subtractions in [`intersect_fast`] happen between
/// small numbers.
pub fn intersect_robust(a: &Segment, b: &Segment, tolerance: f64) -> SegmentIntersection {
    if !a
        .bounding_rectangle()
        .intersects(&b.bounding_rectangle(), tolerance)
    {
        return SegmentIntersection::None;
    }

    let near = || {
        a.distance_to(&b.v1) < tolerance
            || a.distance_to(&b.v2) < tolerance
            || b.distance_to(&a.v1) < tolerance
            || b.distance_to(&a.v2) < tolerance
    };

    let o1 = orientation_index(a, &b.v1);
    let o2 = orientation_index(a, &b.v2);
    if o1 * o2 > 0 && !near() {
        return SegmentIntersection::None;
    }
    let o3 = orientation_index(b, &a.v1);
    let o4 = orientation_index(b, &a.v2);
    if o3 * o4 > 0 && !near() {
        return SegmentIntersection::None;
    }

    let c = a.bounding_rectangle().union(&b.bounding_rectangle()).center();
    let shift = |s: &Segment| Segment::new(s.v1.translated(-c.x, -c.y), s.v2.translated(-c.x, -c.y));
    let local = intersect_fast(&shift(a), &shift(b), tolerance).translated(c.x, c.y);

    // Translating back can perturb the last bit, but endpoints should come back exactly.
    match local {
        SegmentIntersection::Point(p) => SegmentIntersection::Point(restore_endpoint(p, a, b, tolerance)),
        SegmentIntersection::Overlap(s) => SegmentIntersection::Overlap(Segment::new(
            restore_endpoint(s.v1, a, b, tolerance),
            restore_endpoint(s.v2, a, b, tolerance),
        )),
        SegmentIntersection::None => SegmentIntersection::None,
    }
}

fn restore_endpoint(p: Coordinate, a: &Segment, b: &Segment, tolerance: f64) -> Coordinate {
    [a.v1, a.v2, b.v1, b.v2]
        .into_iter()
        .filter(|e| e.distance(&p) <= tolerance * 1e-3)
        .min_by_key(|e| OrderedFloat(e.distance(&p)))
        .unwrap_or(p)
}

/// Rounds a coordinate to the nearest node of a square grid.
///
/// Returns `None` if the grid is undefined here, because the coordinate is so
/// many cells away from the origin that rounding would lose all precision.
pub fn snap_to_grid(c: &Coordinate, origin: &Coordinate, cell_size: f64) -> Option<Coordinate> {
    let gx = (c.x - origin.x) / cell_size;
    let gy = (c.y - origin.y) / cell_size;
    // Written so that NaNs fail the check.
    if !(gx.abs() <= MAX_GRID_RATIO && gy.abs() <= MAX_GRID_RATIO) {
        return None;
    }
    Some(Coordinate::new(
        origin.x + gx.round() * cell_size,
        origin.y + gy.round() * cell_size,
    ))
}

/// Computes the convex hull of a set of points with a Graham scan.
///
/// The hull is returned counter-clockwise, without repeating the first point,
/// and with no collinear vertices. Degenerate inputs give degenerate hulls: a
/// single point, or the two ends of a line.
pub fn convex_hull(points: &[Coordinate]) -> Vec<Coordinate> {
    let mut pts: Vec<Coordinate> = points.iter().copied().filter(|p| p.is_finite()).collect();
    pts.sort_by(|p, q| p.cmp_xy(q));
    pts.dedup();

    if pts.len() > HULL_PREFILTER_THRESHOLD {
        pts = discard_interior(pts);
    }
    if pts.len() <= 2 {
        return pts;
    }

    // The pivot is the lowest point (leftmost, if there's a tie).
    let pivot_idx = pts
        .iter()
        .enumerate()
        .min_by(|(_, p), (_, q)| p.y.total_cmp(&q.y).then_with(|| p.x.total_cmp(&q.x)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let pivot = pts.swap_remove(pivot_idx);

    // Every other point is above the pivot (or level with it and to the right),
    // so the angles are all in [0, pi) and the orientation test is a total order.
    pts.sort_by(|p, q| match orientation(&pivot, p, q) {
        1 => Ordering::Less,
        -1 => Ordering::Greater,
        _ => OrderedFloat(pivot.distance(p)).cmp(&OrderedFloat(pivot.distance(q))),
    });

    let mut hull = vec![pivot];
    for p in pts {
        while hull.len() >= 2 && orientation(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull
}

/// Throws away points strictly inside the polygon formed by the extreme points
/// in eight directions. Those points can't be on the hull.
fn discard_interior(pts: Vec<Coordinate>) -> Vec<Coordinate> {
    const DIRECTIONS: [(f64, f64); 8] = [
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
        (-1.0, 1.0),
        (-1.0, 0.0),
        (-1.0, -1.0),
        (0.0, -1.0),
        (1.0, -1.0),
    ];

    let mut ring: Vec<Coordinate> = Vec::with_capacity(8);
    for (dx, dy) in DIRECTIONS {
        let extreme = pts
            .iter()
            .max_by_key(|p| OrderedFloat(p.x * dx + p.y * dy))
            .copied();
        if let Some(e) = extreme {
            if ring.last() != Some(&e) {
                ring.push(e);
            }
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return pts;
    }

    let strictly_inside = |p: &Coordinate| {
        (0..ring.len()).all(|i| orientation(&ring[i], &ring[(i + 1) % ring.len()], p) > 0)
    };
    pts.into_iter().filter(|p| !strictly_inside(p)).collect()
}

#[cfg(test)]
mod tests {
    use malachite::Rational;
    use proptest::prelude::*;

    use super::*;
    use crate::perturbation::{point_perturbation, Reasonable};

    fn c(x: f64, y: f64) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(c(x1, y1), c(x2, y2))
    }

    fn exact_sign(x1: f64, y1: f64, x2: f64, y2: f64) -> i32 {
        let r = |x: f64| Rational::try_from(x).unwrap();
        let det = r(x1) * r(y2) - r(x2) * r(y1);
        match det.cmp(&Rational::from(0)) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    #[test]
    fn determinant_small_cases() {
        assert_eq!(determinant_sign(1.0, 0.0, 0.0, 1.0), 1);
        assert_eq!(determinant_sign(0.0, 1.0, 1.0, 0.0), -1);
        assert_eq!(determinant_sign(2.0, 2.0, 4.0, 4.0), 0);
        assert_eq!(determinant_sign(3.0, 3.0, 4.0, 4.0), 0);
        assert_eq!(determinant_sign(1.0, 1.0, 2.0, 3.0), 1);
        assert_eq!(determinant_sign(2.0, 3.0, 1.0, 1.0), -1);
        assert_eq!(determinant_sign(1.0, -1.0, 1.0, 1.0), 1);
        assert_eq!(determinant_sign(-3.0, -1.0, -6.0, -2.0), 0);
    }

    #[test]
    fn determinant_beats_cancellation() {
        // (2^27 + 1)(2^27 - 1) = 2^54 - 1 rounds to 2^54, so the naive formula
        // evaluates to exactly zero here.
        let (x1, y1) = (134217729.0, 134217728.0);
        let (x2, y2) = (134217728.0, 134217727.0);
        assert_eq!(x1 * y2 - x2 * y1, 0.0);
        assert_eq!(determinant_sign(x1, y1, x2, y2), exact_sign(x1, y1, x2, y2));
        assert_eq!(determinant_sign(x1, y1, x2, y2), -1);
    }

    #[test]
    fn determinant_of_rounded_multiple() {
        // 3 * x1 and 3 * y1 both round, leaving a tiny positive determinant.
        let (x1, y1) = (836297.9973082814, -758731.2911730603);
        let (x2, y2) = (3.0 * x1, 3.0 * y1);
        assert_eq!(determinant_sign(x1, y1, x2, y2), exact_sign(x1, y1, x2, y2));
        assert_eq!(determinant_sign(x1, y1, x2, y2), 1);
    }

    #[test]
    fn orientation_is_translation_invariant() {
        let (a, b, p) = (c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0));
        let shift = |q: Coordinate| q.translated(1e12, 1e12);
        assert_eq!(orientation(&a, &b, &p), 1);
        assert_eq!(orientation(&shift(a), &shift(b), &shift(p)), 1);
        assert_eq!(orientation_index(&Segment::new(b, a), &p), -1);
    }

    #[test]
    fn crossing_segments() {
        let tol = 1e-9;
        let a = seg(0.0, 0.0, 1.0, 1.0);
        let b = seg(1.0, 0.0, 0.0, 1.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::Point(c(0.5, 0.5)));
        assert_eq!(intersect_fast(&a, &b, tol), SegmentIntersection::Point(c(0.5, 0.5)));
        assert_eq!(
            intersect_robust(&a, &b, tol).dimension(),
            Some(Dimension::Zero)
        );
    }

    #[test]
    fn disjoint_segments() {
        let tol = 1e-9;
        let a = seg(0.0, 0.0, 1.0, 0.0);
        let b = seg(0.0, 1.0, 1.0, 2.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::None);
        let b = seg(2.0, -1.0, 2.0, 1.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::None);
        assert_eq!(intersect_robust(&a, &b, tol).dimension(), None);
    }

    #[test]
    fn touching_segments() {
        let tol = 1e-9;
        let a = seg(0.0, 0.0, 2.0, 0.0);
        let b = seg(1.0, 0.0, 1.0, 1.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::Point(c(1.0, 0.0)));
        let b = seg(1.0, 1e-12, 1.0, 1.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::Point(c(1.0, 1e-12)));
    }

    #[test]
    fn collinear_overlap() {
        let tol = 1e-9;
        let a = seg(0.0, 0.0, 2.0, 0.0);
        let b = seg(3.0, 0.0, 1.0, 0.0);
        assert_eq!(
            intersect_robust(&a, &b, tol),
            SegmentIntersection::Overlap(seg(1.0, 0.0, 2.0, 0.0))
        );
        assert_eq!(
            intersect_robust(&a, &b, tol).dimension(),
            Some(Dimension::One)
        );

        let b = seg(2.0, 0.0, 3.0, 0.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::Point(c(2.0, 0.0)));

        let b = seg(2.5, 0.0, 3.0, 0.0);
        assert_eq!(intersect_robust(&a, &b, tol), SegmentIntersection::None);
    }

    #[test]
    fn snapping() {
        let origin = c(0.0, 0.0);
        assert_eq!(snap_to_grid(&c(0.26, -0.74), &origin, 0.5), Some(c(0.5, -0.5)));
        assert_eq!(snap_to_grid(&c(1e10, 0.0), &origin, 1e-9), None);
        assert_eq!(snap_to_grid(&c(f64::NAN, 0.0), &origin, 1.0), None);
    }

    #[test]
    fn hull_of_square_with_interior() {
        let mut pts = vec![c(0.0, 0.0), c(2.0, 0.0), c(2.0, 2.0), c(0.0, 2.0), c(1.0, 0.0)];
        pts.push(c(1.0, 1.0));
        pts.push(c(0.5, 1.5));
        let hull = convex_hull(&pts);
        assert_eq!(hull, vec![c(0.0, 0.0), c(2.0, 0.0), c(2.0, 2.0), c(0.0, 2.0)]);
    }

    #[test]
    fn hull_prefilter() {
        // Enough points to trigger the pre-filter: a grid plus four far corners.
        let mut pts = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                pts.push(c(i as f64, j as f64));
            }
        }
        pts.push(c(-10.0, -10.0));
        pts.push(c(30.0, -10.0));
        pts.push(c(30.0, 30.0));
        pts.push(c(-10.0, 30.0));
        let hull = convex_hull(&pts);
        assert_eq!(
            hull,
            vec![c(-10.0, -10.0), c(30.0, -10.0), c(30.0, 30.0), c(-10.0, 30.0)]
        );
    }

    #[test]
    fn degenerate_hulls() {
        assert!(convex_hull(&[]).is_empty());
        assert_eq!(convex_hull(&[c(1.0, 1.0), c(1.0, 1.0)]), vec![c(1.0, 1.0)]);
        let line = convex_hull(&[c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0)]);
        assert_eq!(line, vec![c(0.0, 0.0), c(2.0, 2.0)]);
    }

    proptest! {
        #[test]
        fn determinant_sign_is_exact(
            x1 in -1e6f64..1e6, y1 in -1e6f64..1e6, x2 in -1e6f64..1e6, y2 in -1e6f64..1e6
        ) {
            prop_assert_eq!(determinant_sign(x1, y1, x2, y2), exact_sign(x1, y1, x2, y2));
        }

        #[test]
        fn determinant_sign_nearly_parallel(
            x1 in -1e6f64..1e6, y1 in -1e6f64..1e6, pert in point_perturbation(1e-9)
        ) {
            // The second row is (nearly) a multiple of the first, which is where
            // the naive formula goes wrong.
            let q = pert.apply(c(3.0 * x1, 3.0 * y1));
            prop_assert_eq!(determinant_sign(x1, y1, q.x, q.y), exact_sign(x1, y1, q.x, q.y));
        }

        #[test]
        fn determinant_sign_exact_multiples(x1 in -1e6f64..1e6, y1 in -1e6f64..1e6) {
            prop_assert_eq!(
                determinant_sign(x1, y1, 3.0 * x1, 3.0 * y1),
                exact_sign(x1, y1, 3.0 * x1, 3.0 * y1)
            );
        }

        #[test]
        fn robust_intersection_is_symmetric(a in Segment::reasonable(), b in Segment::reasonable()) {
            let ab = intersect_robust(&a, &b, 1e-9).dimension();
            let ba = intersect_robust(&b, &a, 1e-9).dimension();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn orientation_survives_translation(
            dx in -1e12f64..1e12, dy in -1e12f64..1e12
        ) {
            // Only translations that keep the points exactly representable are meaningful.
            let dx = dx.round();
            let dy = dy.round();
            let pts = [c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0)].map(|p| p.translated(dx, dy));
            prop_assert_eq!(orientation(&pts[0], &pts[1], &pts[2]), 1);
        }
    }
}
