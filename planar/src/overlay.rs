//! Boolean operations on geometries.
//!
//! Every operation has the same shape: build the planar graph of both
//! operands, enable the nodes and edges that belong in the result, and
//! reconstruct geometries from what's enabled. What differs between
//! operations (and between pairs of operand dimensions) is only the rule for
//! enabling things.
//!
//! ```
//! use planar::{overlay, Context, Contour, Geometry};
//!
//! let ctx = Context::default();
//! let a = Geometry::from(Contour::from_flat(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]).unwrap());
//! let b = Geometry::from(Contour::from_flat(&[0.5, 0.5, 1.5, 0.5, 1.5, 1.5, 0.5, 1.5]).unwrap());
//! let union = overlay::union(&ctx, &a, &b).unwrap();
//! assert_eq!(union.len(), 1);
//! assert!((union[0].area() - 1.75).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    context::Context,
    error::{BuildFailure, Error, Result},
    geom::Coordinate,
    geometry::{Contour, Dimension, Geometry, MultiPoint, Polygon, Polyline},
    graph::{EdgeIdx, Faces, NodeIdx, PlanarGraph},
};

/// A boolean set operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayOp {
    Union,
    Intersection,
    /// The first operand minus the second.
    Difference,
    SymmetricDifference,
}

/// Runs a graph computation, and if it hits a topology failure, runs it once
/// more with snapping.
pub(crate) fn with_snapping_retry<T>(
    mut f: impl FnMut(bool) -> std::result::Result<T, BuildFailure>,
) -> Result<T> {
    match f(false) {
        Ok(x) => Ok(x),
        Err(BuildFailure::Abort(e)) => Err(e),
        Err(BuildFailure::RetryWithSnapping(failure)) => {
            warn!(
                reason = failure.reason,
                at = ?failure.location,
                "topology failure, retrying with snapping"
            );
            f(true).map_err(BuildFailure::into_error)
        }
    }
}

pub(crate) fn reject_collections(gs: &[&Geometry]) -> Result<()> {
    if gs.iter().any(|g| matches!(g, Geometry::Collection(_))) {
        return Err(Error::UnsupportedGeometry(
            "geometry collections can't be used as operands",
        ));
    }
    Ok(())
}

/// The center of the joint bounding box, or `None` if both are empty.
pub(crate) fn joint_center(gs: &[&Geometry]) -> Option<Coordinate> {
    gs.iter()
        .filter_map(|g| g.bounding_rectangle())
        .reduce(|r, s| r.union(&s))
        .map(|r| r.center())
}

/// Puts a geometry in the form the overlay handlers expect: points become
/// point sets, line paths become polylines, and areas become simplified
/// polygons.
pub(crate) fn normalize(ctx: &Context, g: &Geometry) -> Result<Geometry> {
    Ok(match g {
        Geometry::Point(p) => Geometry::MultiPoint(MultiPoint::new(vec![*p])),
        Geometry::LinePath(lp) => Geometry::Polyline(Polyline::new(vec![lp.clone()])),
        Geometry::Contour(c) => {
            Geometry::Polygon(simplify_contours(ctx, &Polygon::new(vec![c.clone()]))?)
        }
        Geometry::BoundingRectangle(r) => {
            let square = Contour::new(r.corners().to_vec());
            Geometry::Polygon(simplify_contours(ctx, &Polygon::new(vec![square]))?)
        }
        Geometry::Polygon(p) => Geometry::Polygon(simplify_contours(ctx, p)?),
        other => other.clone(),
    })
}

/// The result when the operands can't interact: at least one is empty, or
/// their bounding boxes are apart.
fn trivial_result(op: OverlayOp, a: &Geometry, b: &Geometry) -> Vec<Geometry> {
    let non_empty = |g: &Geometry| (!g.is_empty()).then(|| g.clone());
    match op {
        OverlayOp::Union | OverlayOp::SymmetricDifference => {
            non_empty(a).into_iter().chain(non_empty(b)).collect()
        }
        OverlayOp::Difference => non_empty(a).into_iter().collect(),
        OverlayOp::Intersection => Vec::new(),
    }
}

/// Computes a boolean operation between two geometries.
///
/// The result can mix dimensions: the intersection of two squares that share
/// an edge is a line, and two squares touching at a corner intersect in a
/// point. Each dimension that's present comes out as one geometry, areas
/// first.
pub fn overlay(ctx: &Context, a: &Geometry, b: &Geometry, op: OverlayOp) -> Result<Vec<Geometry>> {
    ctx.validate()?;
    reject_collections(&[a, b])?;
    let (Some(ra), Some(rb)) = (a.bounding_rectangle(), b.bounding_rectangle()) else {
        return Ok(trivial_result(op, a, b));
    };
    if a.is_empty() || b.is_empty() || !ra.intersects(&rb, ctx.tolerance) {
        return Ok(trivial_result(op, a, b));
    }

    let center = ra.union(&rb).center();
    let a = normalize(ctx, &a.translated(-center.x, -center.y))?;
    let b = normalize(ctx, &b.translated(-center.x, -center.y))?;

    let out = match (a.dimension(), b.dimension()) {
        (Some(da), Some(db)) => {
            let (low, high, a_is_low) = if da <= db {
                (&a, &b, true)
            } else {
                (&b, &a, false)
            };
            let dims = (da.min(db), da.max(db));
            debug!(?op, ?dims, "overlay");
            with_snapping_retry(|snapping| match dims {
                (Dimension::Zero, Dimension::Zero) => point_point(ctx, &a, &b, op, snapping),
                (Dimension::Zero, Dimension::One) => {
                    point_line(ctx, low, high, a_is_low, op, snapping)
                }
                (Dimension::Zero, Dimension::Two) => {
                    point_area(ctx, low, high, a_is_low, op, snapping)
                }
                (Dimension::One, Dimension::Two) => {
                    line_area(ctx, low, high, a_is_low, op, snapping)
                }
                (Dimension::One, _) => line_line(ctx, &a, &b, op, snapping),
                (Dimension::Two, _) => area_area(ctx, &a, &b, op, snapping),
            })?
        }
        // Simplification can leave nothing of a degenerate area.
        _ => trivial_result(op, &a, &b),
    };
    Ok(out
        .into_iter()
        .map(|g| g.translated(center.x, center.y))
        .collect())
}

pub fn union(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<Vec<Geometry>> {
    overlay(ctx, a, b, OverlayOp::Union)
}

pub fn intersection(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<Vec<Geometry>> {
    overlay(ctx, a, b, OverlayOp::Intersection)
}

pub fn difference(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<Vec<Geometry>> {
    overlay(ctx, a, b, OverlayOp::Difference)
}

pub fn symmetric_difference(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<Vec<Geometry>> {
    overlay(ctx, a, b, OverlayOp::SymmetricDifference)
}

fn push_points(out: &mut Vec<Geometry>, points: Vec<Coordinate>) {
    if !points.is_empty() {
        out.push(Geometry::MultiPoint(MultiPoint::new(points)));
    }
}

fn push_paths(out: &mut Vec<Geometry>, g: &mut PlanarGraph) {
    let paths = g.build_polyline();
    if !paths.is_empty() {
        out.push(Geometry::Polyline(Polyline::new(paths)));
    }
}

/// Enables every edge for which `rule` returns true, in its stored direction.
fn enable_edges_where(g: &mut PlanarGraph, rule: impl Fn(&PlanarGraph, EdgeIdx) -> bool) {
    let graph: &PlanarGraph = g;
    let chosen: Vec<EdgeIdx> = graph.edge_indices().filter(|&e| rule(graph, e)).collect();
    for e in chosen {
        g.enable_edge(e, true);
    }
}

/// Enables every node for which `rule` returns true.
fn enable_nodes_where(g: &mut PlanarGraph, rule: impl Fn(&PlanarGraph, NodeIdx) -> bool) {
    let graph: &PlanarGraph = g;
    let chosen: Vec<NodeIdx> = graph.node_indices().filter(|&n| rule(graph, n)).collect();
    for n in chosen {
        g[n].enabled = true;
    }
}

/// Nodes where both sources meet, but that aren't on any enabled edge.
fn isolated_meeting_points(g: &PlanarGraph, meets: impl Fn(&PlanarGraph, NodeIdx) -> bool) -> Vec<Coordinate> {
    g.node_indices()
        .filter(|&n| meets(g, n) && g.enabled_degree(n) == 0)
        .map(|n| g[n].coord)
        .collect()
}

fn point_point(
    ctx: &Context,
    a: &Geometry,
    b: &Geometry,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[a, b], snapping)?;
    enable_nodes_where(&mut g, |g, n| {
        let (in_a, in_b) = (g[n].label.is_used(0), g[n].label.is_used(1));
        match op {
            OverlayOp::Union => in_a || in_b,
            OverlayOp::Intersection => in_a && in_b,
            OverlayOp::Difference => in_a && !in_b,
            OverlayOp::SymmetricDifference => in_a != in_b,
        }
    });
    let mut out = Vec::new();
    push_points(&mut out, g.build_points());
    Ok(out)
}

fn line_line(
    ctx: &Context,
    a: &Geometry,
    b: &Geometry,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[a, b], snapping)?;
    enable_edges_where(&mut g, |g, e| {
        let label = &g[e].label;
        match op {
            OverlayOp::Union => label.is_used(0) || label.is_used(1),
            OverlayOp::Intersection => label.used_by_both(),
            OverlayOp::Difference => label.sole_user() == Some(0),
            OverlayOp::SymmetricDifference => label.sole_user().is_some(),
        }
    });
    let points = if op == OverlayOp::Intersection {
        isolated_meeting_points(&g, |g, n| g.touches(n, 0) && g.touches(n, 1))
    } else {
        Vec::new()
    };
    let mut out = Vec::new();
    push_paths(&mut out, &mut g);
    push_points(&mut out, points);
    Ok(out)
}

/// Whether an edge used only by `source` should be in the result, and if so
/// whether it should be reversed. `inside` says whether the edge is inside
/// the other source's area.
fn area_edge_rule(op: OverlayOp, source: usize, inside: bool) -> Option<bool> {
    match op {
        OverlayOp::Intersection => inside.then_some(false),
        OverlayOp::Union => (!inside).then_some(false),
        // The part of B's boundary inside A bounds the difference from the
        // other side.
        OverlayOp::Difference if source == 0 => (!inside).then_some(false),
        OverlayOp::Difference => inside.then_some(true),
        OverlayOp::SymmetricDifference => Some(inside),
    }
}

fn area_area(
    ctx: &Context,
    a: &Geometry,
    b: &Geometry,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[a, b], snapping)?;

    // Shared edges that the two areas bound from opposite sides.
    let mut opposite = Vec::new();
    let mut chosen = Vec::new();
    for e in g.edge_indices() {
        let edge = &g[e];
        let forward = |source: usize| edge.direction[source] > 0;
        match (edge.label.is_odd(0), edge.label.is_odd(1)) {
            (true, true) => {
                let same = forward(0) == forward(1);
                if !same {
                    opposite.push(e);
                }
                let keep = match op {
                    OverlayOp::Intersection | OverlayOp::Union => same,
                    OverlayOp::Difference => !same,
                    OverlayOp::SymmetricDifference => false,
                };
                if keep {
                    chosen.push((e, forward(0)));
                }
            }
            (true, false) | (false, true) => {
                let source = if edge.label.is_odd(0) { 0 } else { 1 };
                let inside = g.inside_area(&g.midpoint(e), 1 - source);
                if let Some(reverse) = area_edge_rule(op, source, inside) {
                    chosen.push((e, forward(source) != reverse));
                }
            }
            (false, false) => {}
        }
    }
    for (e, forward) in chosen {
        g.enable_edge(e, forward);
    }

    let mut out = Vec::new();
    let polygon = g.build_polygon()?;
    if !polygon.is_empty() {
        out.push(Geometry::Polygon(polygon));
    }

    if op == OverlayOp::Intersection {
        // Where the areas only touch, the intersection is lower-dimensional.
        for e in opposite {
            g.enable_edge(e, true);
        }
        let points = isolated_meeting_points(&g, |g, n| {
            g.on_boundary(n, 0) && g.on_boundary(n, 1)
        });
        push_paths(&mut out, &mut g);
        push_points(&mut out, points);
    }
    Ok(out)
}

fn point_line(
    ctx: &Context,
    points: &Geometry,
    line: &Geometry,
    points_first: bool,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[points, line], snapping)?;
    let keep_line = match op {
        OverlayOp::Intersection => false,
        OverlayOp::Union | OverlayOp::SymmetricDifference => true,
        OverlayOp::Difference => !points_first,
    };
    enable_nodes_where(&mut g, |g, n| {
        if !g[n].label.is_used(0) {
            return false;
        }
        let on_line = g.touches(n, 1);
        match op {
            OverlayOp::Intersection => on_line,
            OverlayOp::Union | OverlayOp::SymmetricDifference => !on_line,
            OverlayOp::Difference => points_first && !on_line,
        }
    });

    let mut out = Vec::new();
    if keep_line {
        enable_edges_where(&mut g, |g, e| g[e].label.is_used(1));
        push_paths(&mut out, &mut g);
    }
    push_points(&mut out, g.build_points());
    Ok(out)
}

fn point_area(
    ctx: &Context,
    points: &Geometry,
    area: &Geometry,
    points_first: bool,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[points, area], snapping)?;
    let keep_area = match op {
        OverlayOp::Intersection => false,
        OverlayOp::Union | OverlayOp::SymmetricDifference => true,
        OverlayOp::Difference => !points_first,
    };
    enable_nodes_where(&mut g, |g, n| {
        if !g[n].label.is_used(0) {
            return false;
        }
        let outside = !g.on_boundary(n, 1) && !g.inside_area(&g[n].coord, 1);
        match op {
            OverlayOp::Intersection => !outside,
            OverlayOp::Union | OverlayOp::SymmetricDifference => outside,
            OverlayOp::Difference => points_first && outside,
        }
    });

    let mut out = Vec::new();
    if keep_area {
        out.push(area.clone());
    }
    push_points(&mut out, g.build_points());
    Ok(out)
}

fn line_area(
    ctx: &Context,
    line: &Geometry,
    area: &Geometry,
    line_first: bool,
    op: OverlayOp,
    snapping: bool,
) -> std::result::Result<Vec<Geometry>, BuildFailure> {
    let mut g = PlanarGraph::build(ctx, &[line, area], snapping)?;
    let keep_area = match op {
        OverlayOp::Intersection => false,
        OverlayOp::Union | OverlayOp::SymmetricDifference => true,
        OverlayOp::Difference => !line_first,
    };
    let keep_outside = match op {
        OverlayOp::Intersection => false,
        OverlayOp::Union | OverlayOp::SymmetricDifference => true,
        OverlayOp::Difference => line_first,
    };
    enable_edges_where(&mut g, |g, e| {
        if !g[e].label.is_used(0) {
            return false;
        }
        let outside = !g[e].label.is_odd(1) && !g.inside_area(&g.midpoint(e), 1);
        if op == OverlayOp::Intersection {
            !outside
        } else {
            keep_outside && outside
        }
    });

    let mut out = Vec::new();
    if keep_area {
        out.push(area.clone());
    }
    let points = if op == OverlayOp::Intersection {
        isolated_meeting_points(&g, |g, n| g.touches(n, 0) && g.on_boundary(n, 1))
    } else {
        Vec::new()
    };
    push_paths(&mut out, &mut g);
    push_points(&mut out, points);
    Ok(out)
}

/// Gives each edge of an even-odd area an orientation with the interior on
/// its left.
///
/// Non-horizontal edges cast a ray in the positive x direction from their
/// midpoint: if it crosses an odd number of other boundary edges, the
/// interior is to the east, so the edge should run downwards. Horizontal
/// edges do the same with a ray in the positive y direction.
fn orient_boundary_edges(g: &mut PlanarGraph, source: usize) {
    let mut chosen = Vec::new();
    for e in g.edge_indices() {
        if !g[e].label.is_odd(source) {
            continue;
        }
        let s = g.segment(e);
        let vertical_ray = s.v1.y == s.v2.y;
        let inside = g.ray_parity(&s.center(), vertical_ray, Some(e), |edge| {
            edge.label.is_odd(source)
        });
        let forward = if vertical_ray {
            (s.v1.x < s.v2.x) == inside
        } else {
            (s.v1.y > s.v2.y) == inside
        };
        chosen.push((e, forward));
    }
    for (e, forward) in chosen {
        g.enable_edge(e, forward);
    }
}

/// Rebuilds a polygon with even-odd semantics into simple, non-crossing
/// contours: counter-clockwise shells, each followed by its clockwise holes.
///
/// Boundary segments that the input covers an even number of times cancel
/// out.
pub fn simplify_contours(ctx: &Context, polygon: &Polygon) -> Result<Polygon> {
    ctx.validate()?;
    let geometry = Geometry::Polygon(polygon.clone());
    let Some(center) = joint_center(&[&geometry]) else {
        return Ok(Polygon::default());
    };
    let shifted = geometry.translated(-center.x, -center.y);
    let out = with_snapping_retry(|snapping| {
        let mut g = PlanarGraph::build(ctx, &[&shifted], snapping)?;
        orient_boundary_edges(&mut g, 0);
        Ok(g.build_polygon()?)
    })?;
    Ok(out.translated(center.x, center.y))
}

/// Splits line paths wherever they cross or touch, and merges their
/// overlapping parts.
pub fn simplify_line_paths(ctx: &Context, polyline: &Polyline) -> Result<Polyline> {
    ctx.validate()?;
    let geometry = Geometry::Polyline(polyline.clone());
    let Some(center) = joint_center(&[&geometry]) else {
        return Ok(Polyline::default());
    };
    let shifted = geometry.translated(-center.x, -center.y);
    let paths = with_snapping_retry(|snapping| {
        let mut g = PlanarGraph::build(ctx, &[&shifted], snapping)?;
        enable_edges_where(&mut g, |g, e| g[e].label.is_used(0));
        Ok(g.build_polyline())
    })?;
    Ok(Polyline::new(paths).translated(center.x, center.y))
}

/// Finds the faces enclosed by a geometry's linework.
///
/// The edges that don't separate two faces come back as dangles.
pub fn polygonize(ctx: &Context, geometry: &Geometry) -> Result<Faces> {
    ctx.validate()?;
    reject_collections(&[geometry])?;
    let Some(center) = joint_center(&[geometry]) else {
        return Ok(Faces::default());
    };
    let shifted = geometry.translated(-center.x, -center.y);
    let faces = with_snapping_retry(|snapping| {
        let mut g = PlanarGraph::build(ctx, &[&shifted], snapping)?;
        enable_edges_where(&mut g, |g, e| g[e].label.is_used(0));
        Ok(g.build_faces())
    })?;
    Ok(Faces {
        polygons: faces
            .polygons
            .iter()
            .map(|p| p.translated(center.x, center.y))
            .collect(),
        dangles: faces
            .dangles
            .iter()
            .map(|p| p.translated(center.x, center.y))
            .collect(),
    })
}
