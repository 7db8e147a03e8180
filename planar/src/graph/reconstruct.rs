//! Turning the enabled part of a planar graph back into geometries.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet, VecDeque},
};

use tracing::warn;

use super::{EdgeIdx, NodeIdx, PlanarGraph};
use crate::{
    error::TopologyFailure,
    geom::{Coordinate, Vector},
    geometry::{Contour, ContourLayout, LinePath, Polygon},
    predicates::determinant_sign,
};

/// The bounded faces of a graph, and the edges that don't bound any face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Faces {
    /// One polygon per face: a counter-clockwise shell followed by clockwise
    /// holes.
    pub polygons: Vec<Polygon>,
    /// Edges with the same face on both sides, as two-vertex paths.
    pub dangles: Vec<LinePath>,
}

/// Sorts directions by their clockwise angle from `reference`.
///
/// Directions pointing the same way as `reference` come last (at a full turn)
/// unless `same_first` is set, in which case they come first.
fn clockwise_from(reference: &Vector, a: &Vector, b: &Vector, same_first: bool) -> Ordering {
    let group = |v: &Vector| -> u8 {
        match determinant_sign(reference.x, reference.y, v.x, v.y) {
            -1 => 1,
            1 => 3,
            _ if reference.dot(v) < 0.0 => 2,
            _ if same_first => 0,
            _ => 4,
        }
    };
    group(a).cmp(&group(b)).then_with(|| {
        // Within a half-plane, `a` comes first if `b` is clockwise of it.
        match determinant_sign(a.x, a.y, b.x, b.y) {
            -1 => Ordering::Less,
            1 => Ordering::Greater,
            _ => Ordering::Equal,
        }
    })
}

const NORTH: Vector = Vector { x: 0.0, y: 1.0 };

/// A directed copy of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct HalfEdge {
    edge: EdgeIdx,
    forward: bool,
}

impl HalfEdge {
    fn reversed(self) -> HalfEdge {
        HalfEdge {
            edge: self.edge,
            forward: !self.forward,
        }
    }
}

impl PlanarGraph {
    fn vector(&self, from: NodeIdx, to: NodeIdx) -> Vector {
        self[to].coord - self[from].coord
    }

    fn half_tail(&self, h: HalfEdge) -> NodeIdx {
        if h.forward {
            self[h.edge].n1
        } else {
            self[h.edge].n2
        }
    }

    fn half_head(&self, h: HalfEdge) -> NodeIdx {
        self.half_tail(h.reversed())
    }

    fn coords(&self, nodes: &[NodeIdx]) -> Vec<Coordinate> {
        nodes.iter().map(|&n| self[n].coord).collect()
    }

    /// One point per enabled node.
    pub fn build_points(&self) -> Vec<Coordinate> {
        self.node_indices()
            .filter(|&n| self[n].enabled)
            .map(|n| self[n].coord)
            .collect()
    }

    fn is_available(&self, e: EdgeIdx) -> bool {
        self[e].enabled && !self[e].visited
    }

    /// Follows enabled edges from `start` along `first`, passing straight
    /// through nodes with exactly two enabled edges.
    fn walk_path(&mut self, start: NodeIdx, first: EdgeIdx) -> LinePath {
        let mut vertices = vec![self[start].coord];
        let mut node = start;
        let mut edge = first;
        loop {
            self[edge].visited = true;
            node = self[edge].other_end(node);
            vertices.push(self[node].coord);
            if self.enabled_degree(node) != 2 {
                break;
            }
            let next = self[node]
                .edges
                .iter()
                .copied()
                .find(|&e| self.is_available(e));
            match next {
                Some(e) => edge = e,
                None => break,
            }
        }
        LinePath::new(vertices)
    }

    /// Assembles the enabled edges into line paths.
    ///
    /// Paths start and end at nodes where the linework ends or branches, and
    /// pass through every node with exactly two enabled edges. Closed loops
    /// with no such node come out as closed paths, repeating their first
    /// vertex at the end.
    pub fn build_polyline(&mut self) -> Vec<LinePath> {
        let mut ret = Vec::new();
        let starts: Vec<NodeIdx> = self
            .node_indices()
            .filter(|&n| {
                let d = self.enabled_degree(n);
                d > 0 && d != 2
            })
            .collect();

        for start in starts.into_iter().chain(self.node_indices().collect::<Vec<_>>()) {
            loop {
                let first = self[start]
                    .edges
                    .iter()
                    .copied()
                    .filter(|&e| self.is_available(e))
                    .min_by(|&a, &b| {
                        let va = self.vector(start, self[a].other_end(start));
                        let vb = self.vector(start, self[b].other_end(start));
                        clockwise_from(&NORTH, &va, &vb, true)
                    });
                let Some(first) = first else {
                    break;
                };
                ret.push(self.walk_path(start, first));
            }
        }
        ret
    }

    /// The next edge of a polygon boundary after arriving at `v` from `prev`:
    /// the first outgoing edge clockwise from the way we came in.
    fn next_boundary_edge(&self, prev: NodeIdx, v: NodeIdx) -> Option<EdgeIdx> {
        let back = self.vector(v, prev);
        self[v]
            .edges
            .iter()
            .copied()
            .filter(|&e| self.is_available(e) && self[e].tail() == v)
            .min_by(|&a, &b| {
                let va = self.vector(v, self[a].head());
                let vb = self.vector(v, self[b].head());
                clockwise_from(&back, &va, &vb, false)
            })
    }

    /// Traces the boundary ring starting with edge `first`, and splits it
    /// into simple rings wherever it revisits a node.
    fn trace_rings(&mut self, first: EdgeIdx) -> Result<Vec<Vec<NodeIdx>>, TopologyFailure> {
        let start = self[first].tail();
        let mut rings = Vec::new();
        let mut nodes = vec![start];
        let mut position: HashMap<NodeIdx, usize> = HashMap::new();
        position.insert(start, 0);

        let mut edge = first;
        loop {
            self[edge].visited = true;
            let prev = self[edge].tail();
            let v = self[edge].head();
            if v == start {
                break;
            }
            if let Some(&i) = position.get(&v) {
                //   ____
                //  |    |
                //  |____v____
                //       |    |
                //       |____|
                //
                // Everything since we were last at v is a ring of its own.
                let ring = nodes.split_off(i + 1);
                for n in &ring {
                    position.remove(n);
                }
                let mut ring_nodes = vec![v];
                ring_nodes.extend(ring);
                rings.push(ring_nodes);
            } else {
                position.insert(v, nodes.len());
                nodes.push(v);
            }
            edge = self
                .next_boundary_edge(prev, v)
                .ok_or_else(|| TopologyFailure::new("dangling edge in polygon boundary", self[v].coord))?;
        }
        rings.push(nodes);
        Ok(rings)
    }

    /// Assembles the enabled edges, in their output orientations, into a polygon.
    ///
    /// Every enabled edge must be part of a closed ring. Rings winding
    /// counter-clockwise become shells and the others become holes, each
    /// placed after the smallest shell containing it.
    pub fn build_polygon(&mut self) -> Result<Polygon, TopologyFailure> {
        let mut rings = Vec::new();
        for e in self.edge_indices() {
            if self.is_available(e) {
                rings.extend(self.trace_rings(e)?);
            }
        }

        let mut contours = Vec::new();
        for ring in rings {
            if ring.len() < 3 {
                continue;
            }
            let contour = Contour::new(self.coords(&ring));
            let area = contour.signed_area();
            let layout = if area > 0.0 {
                ContourLayout::External
            } else if area < 0.0 {
                ContourLayout::Internal
            } else {
                warn!(at = ?self[ring[0]].coord, "dropping a ring with no area");
                continue;
            };
            for &n in &ring {
                self[n].layout = layout;
            }
            contours.push(contour.with_layout(layout));
        }

        let (shells, holes): (Vec<Contour>, Vec<Contour>) = contours
            .into_iter()
            .partition(|c| c.layout() == ContourLayout::External);
        let (polygon, orphans) = nest_holes(shells, holes);
        for hole in orphans {
            warn!(at = ?hole.vertices()[0], "dropping a hole outside every shell");
        }
        Ok(polygon)
    }

    /// Finds the next half-edge around the face to the left of `h`.
    fn next_in_face(&self, h: HalfEdge) -> HalfEdge {
        let u = self.half_tail(h);
        let v = self.half_head(h);
        let back = self.vector(v, u);
        self[v]
            .edges
            .iter()
            .copied()
            .filter(|&e| self[e].enabled)
            .map(|e| HalfEdge {
                edge: e,
                forward: self[e].n1 == v,
            })
            .min_by(|&a, &b| {
                let va = self.vector(v, self.half_head(a));
                let vb = self.vector(v, self.half_head(b));
                clockwise_from(&back, &va, &vb, false)
            })
            // The way we came in is always a candidate.
            .unwrap_or(h.reversed())
    }

    /// Finds all the faces bounded by enabled edges, ignoring edge orientations.
    pub fn build_faces(&mut self) -> Faces {
        let mut seen: HashSet<HalfEdge> = HashSet::new();
        let mut pieces: Vec<Vec<HalfEdge>> = Vec::new();

        for e in self.edge_indices() {
            if !self.is_available(e) {
                continue;
            }
            for forward in [true, false] {
                let first = HalfEdge { edge: e, forward };
                if seen.contains(&first) {
                    continue;
                }
                let mut circuit = Vec::new();
                let mut h = first;
                let mut closed = true;
                loop {
                    seen.insert(h);
                    circuit.push(h);
                    h = self.next_in_face(h);
                    if h == first {
                        break;
                    }
                    // Every half-edge is on exactly one face, unless the
                    // angular order at some node is inconsistent.
                    if circuit.len() > 2 * self.edge_count() {
                        warn!(at = ?self[self.half_tail(first)].coord, "face walk did not close");
                        closed = false;
                        break;
                    }
                }
                if closed {
                    pieces.extend(self.split_at_revisits(circuit));
                }
            }
        }
        for e in self.edge_indices() {
            if self[e].enabled {
                self[e].visited = true;
            }
        }

        let mut dangles = Vec::new();
        let mut shells = Vec::new();
        let mut holes = Vec::new();
        for piece in pieces {
            let ring = cancel_reverse_pairs(piece, &mut |h| {
                dangles.push(LinePath::new(vec![
                    self[self.half_tail(h)].coord,
                    self[self.half_head(h)].coord,
                ]))
            });
            if ring.len() < 3 {
                continue;
            }
            let nodes: Vec<NodeIdx> = ring.iter().map(|&h| self.half_tail(h)).collect();
            let contour = Contour::new(self.coords(&nodes));
            let area = contour.signed_area();
            if area > 0.0 {
                shells.push(contour.with_layout(ContourLayout::External));
            } else if area < 0.0 {
                holes.push(contour.with_layout(ContourLayout::Internal));
            }
        }

        // Clockwise rings that no face contains are the outer boundaries of
        // connected components.
        let (nested, _) = nest_holes(shells, holes);
        let mut polygons = Vec::new();
        let mut current: Vec<Contour> = Vec::new();
        for c in nested.contours() {
            if c.layout() == ContourLayout::External && !current.is_empty() {
                polygons.push(Polygon::new(std::mem::take(&mut current)));
            }
            current.push(c.clone());
        }
        if !current.is_empty() {
            polygons.push(Polygon::new(current));
        }
        Faces { polygons, dangles }
    }

    /// Splits a closed circuit of half-edges into pieces that don't revisit nodes.
    fn split_at_revisits(&self, circuit: Vec<HalfEdge>) -> Vec<Vec<HalfEdge>> {
        let mut ret = Vec::new();
        let mut stack: Vec<HalfEdge> = Vec::new();
        let mut position: HashMap<NodeIdx, usize> = HashMap::new();
        for h in circuit {
            let tail = self.half_tail(h);
            if let Some(&i) = position.get(&tail) {
                let piece = stack.split_off(i);
                for p in &piece {
                    position.remove(&self.half_tail(*p));
                }
                ret.push(piece);
            }
            position.insert(tail, stack.len());
            stack.push(h);
        }
        ret.push(stack);
        ret
    }
}

/// Removes pairs of consecutive half-edges that run along the same edge in
/// opposite directions, treating the sequence as cyclic. Each removed pair is
/// reported once.
fn cancel_reverse_pairs(piece: Vec<HalfEdge>, removed: &mut impl FnMut(HalfEdge)) -> Vec<HalfEdge> {
    let mut stack: Vec<HalfEdge> = Vec::with_capacity(piece.len());
    for h in piece {
        if stack.last() == Some(&h.reversed()) {
            stack.pop();
            removed(h);
        } else {
            stack.push(h);
        }
    }
    let mut ret = VecDeque::from(stack);
    while ret.len() >= 2 && ret.front().map(|h| h.reversed()) == ret.back().copied() {
        if let Some(h) = ret.pop_back() {
            removed(h);
        }
        ret.pop_front();
    }
    ret.into()
}

/// Puts each hole after the smallest shell that contains it. Also returns the
/// holes that no shell contains.
fn nest_holes(shells: Vec<Contour>, holes: Vec<Contour>) -> (Polygon, Vec<Contour>) {
    let shell_areas: Vec<f64> = shells.iter().map(Contour::area).collect();
    let mut children: Vec<Vec<Contour>> = vec![Vec::new(); shells.len()];
    let mut orphans = Vec::new();

    for hole in holes {
        let area = hole.area();
        let parent = hole.interior_point().ok().and_then(|p| {
            shells
                .iter()
                .enumerate()
                .filter(|&(i, s)| shell_areas[i] > area && s.winds_around(&p))
                .min_by(|a, b| shell_areas[a.0].total_cmp(&shell_areas[b.0]))
                .map(|(i, _)| i)
        });
        match parent {
            Some(i) => children[i].push(hole),
            None => orphans.push(hole),
        }
    }

    let mut contours = Vec::new();
    for (shell, holes) in shells.into_iter().zip(children) {
        contours.push(shell);
        contours.extend(holes);
    }
    (Polygon::new(contours), orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Context,
        geometry::{Geometry, Polyline},
    };

    fn contour(flat: &[f64]) -> Contour {
        Contour::from_flat(flat).unwrap()
    }

    fn path(flat: &[f64]) -> LinePath {
        LinePath::from_flat(flat).unwrap()
    }

    /// Enables every edge used by source 0, in the direction source 0 uses it.
    fn enable_source_edges(g: &mut PlanarGraph) {
        for e in g.edge_indices() {
            if g[e].label.is_odd(0) {
                let forward = g[e].direction[0] > 0;
                g.enable_edge(e, forward);
            }
        }
    }

    #[test]
    fn clockwise_order() {
        let west = Vector { x: -1.0, y: 0.0 };
        let mut dirs = vec![
            Vector { x: -1.0, y: 0.0 },
            Vector { x: 0.0, y: -1.0 },
            Vector { x: 1.0, y: 0.0 },
            Vector { x: 0.0, y: 1.0 },
            Vector { x: -1.0, y: 1.0 },
        ];
        dirs.sort_by(|a, b| clockwise_from(&west, a, b, false));
        assert_eq!(
            dirs,
            vec![
                Vector { x: -1.0, y: 1.0 },
                Vector { x: 0.0, y: 1.0 },
                Vector { x: 1.0, y: 0.0 },
                Vector { x: 0.0, y: -1.0 },
                Vector { x: -1.0, y: 0.0 },
            ]
        );
        dirs.sort_by(|a, b| clockwise_from(&west, a, b, true));
        assert_eq!(dirs[0], west);
    }

    #[test]
    fn square_with_hole() {
        let ctx = Context::default();
        let poly = Geometry::Polygon(Polygon::new(vec![
            contour(&[0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0]),
            contour(&[1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0]),
        ]));
        let mut g = PlanarGraph::build(&ctx, &[&poly], false).unwrap();
        enable_source_edges(&mut g);
        let out = g.build_polygon().unwrap();
        assert_eq!(out.contours().len(), 2);
        assert_eq!(out.contours()[0].layout(), ContourLayout::External);
        assert_eq!(out.contours()[1].layout(), ContourLayout::Internal);
        assert_eq!(out.area(), 12.0);
        assert!(out.is_ogc_valid(1e-9));
    }

    #[test]
    fn corner_touch_splits() {
        let ctx = Context::default();
        // A single contour that passes through (1, 1) twice.
        let c = Geometry::Contour(contour(&[
            0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 2.0, 1.0, 2.0, 2.0, 1.0, 2.0, 1.0, 1.0, 0.0, 1.0,
        ]));
        let mut g = PlanarGraph::build(&ctx, &[&c], false).unwrap();
        assert_eq!(g.node_count(), 7);
        enable_source_edges(&mut g);
        let out = g.build_polygon().unwrap();
        assert_eq!(out.contours().len(), 2);
        for c in out.contours() {
            assert_eq!(c.layout(), ContourLayout::External);
            assert_eq!(c.signed_area(), 1.0);
        }
    }

    #[test]
    fn open_ring_fails() {
        let ctx = Context::default();
        let lp = Geometry::LinePath(path(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]));
        let mut g = PlanarGraph::build(&ctx, &[&lp], false).unwrap();
        enable_source_edges(&mut g);
        assert!(g.build_polygon().is_err());
    }

    #[test]
    fn polyline_paths() {
        let ctx = Context::default();
        let plus = Geometry::Polyline(Polyline::new(vec![
            path(&[-1.0, 0.0, 1.0, 0.0]),
            path(&[0.0, -1.0, 0.0, 1.0]),
        ]));
        let mut g = PlanarGraph::build(&ctx, &[&plus], false).unwrap();
        enable_source_edges(&mut g);
        let paths = g.build_polyline();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.vertices().len() == 2));

        let bent = Geometry::LinePath(path(&[0.0, 0.0, 1.0, 0.0, 2.0, 1.0]));
        let mut g = PlanarGraph::build(&ctx, &[&bent], false).unwrap();
        enable_source_edges(&mut g);
        assert_eq!(g.build_polyline(), vec![path(&[0.0, 0.0, 1.0, 0.0, 2.0, 1.0])]);

        let ring = Geometry::Contour(contour(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]));
        let mut g = PlanarGraph::build(&ctx, &[&ring], false).unwrap();
        enable_source_edges(&mut g);
        let paths = g.build_polyline();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].vertices().len(), 4);
        assert_eq!(paths[0].vertices()[0], paths[0].vertices()[3]);
    }

    #[test]
    fn faces_and_dangles() {
        let ctx = Context::default();
        //   ________
        //  |   |    |
        //  |   |    |____
        //  |___|____|
        let lines = Geometry::Polyline(Polyline::new(vec![
            path(&[0.0, 0.0, 2.0, 0.0, 2.0, 1.0, 0.0, 1.0, 0.0, 0.0]),
            path(&[1.0, 0.0, 1.0, 1.0]),
            path(&[2.0, 0.5, 3.0, 0.5]),
        ]));
        let mut g = PlanarGraph::build(&ctx, &[&lines], false).unwrap();
        assert_eq!(g.edge_count(), 9);
        for e in g.edge_indices() {
            g.enable_edge(e, true);
        }
        let faces = g.build_faces();
        assert_eq!(faces.polygons.len(), 2);
        for p in &faces.polygons {
            assert_eq!(p.contours().len(), 1);
            assert_eq!(p.area(), 1.0);
        }
        assert_eq!(faces.dangles.len(), 1);
        assert_eq!(faces.dangles[0].length(), 1.0);
    }

    #[test]
    fn faces_with_holes() {
        let ctx = Context::default();
        let lines = Geometry::Polyline(Polyline::new(vec![
            path(&[0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0, 0.0, 0.0]),
            path(&[1.0, 1.0, 3.0, 1.0, 3.0, 3.0, 1.0, 3.0, 1.0, 1.0]),
        ]));
        let mut g = PlanarGraph::build(&ctx, &[&lines], false).unwrap();
        for e in g.edge_indices() {
            g.enable_edge(e, true);
        }
        let faces = g.build_faces();
        assert!(faces.dangles.is_empty());
        let mut areas: Vec<f64> = faces.polygons.iter().map(Polygon::area).collect();
        areas.sort_by(f64::total_cmp);
        assert_eq!(areas, vec![4.0, 12.0]);
    }
}
