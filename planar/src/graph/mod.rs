//! Planar graphs built from one or two geometries.
//!
//! A [`PlanarGraph`] is an arrangement: every input vertex and every pairwise
//! intersection is a node, and the input segments are cut up at the nodes so
//! that edges only meet at their endpoints. Each node and edge is labelled
//! with the source geometries that use it.
//!
//! Callers enable a subset of the graph (say, the edges on the boundary of
//! the union of two polygons), and then ask for it to be reconstructed as
//! points, line paths, or polygons.

use serde::Serialize;

use crate::{
    geom::{Coordinate, Segment},
    geometry::ContourLayout,
};

mod builder;
mod label;
mod reconstruct;
mod segments;

pub use label::TopologyLabel;
pub use reconstruct::Faces;
pub use segments::{SegIdx, Segments};

/// An index into the nodes of a [`PlanarGraph`].
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize)]
pub struct NodeIdx(pub usize);

impl std::fmt::Debug for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n_{}", self.0)
    }
}

/// An index into the edges of a [`PlanarGraph`].
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeIdx(pub usize);

impl std::fmt::Debug for EdgeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e_{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub coord: Coordinate,
    /// Isolated input points at this node.
    pub label: TopologyLabel,
    /// Incident edges, in no particular order.
    pub edges: Vec<EdgeIdx>,
    pub enabled: bool,
    pub layout: ContourLayout,
}

/// An edge of the graph.
///
/// Edges are undirected, but we store them with `n1 < n2`; "forward" below
/// means from `n1` to `n2`.
#[derive(Clone, Debug, Serialize)]
pub struct Edge {
    pub n1: NodeIdx,
    pub n2: NodeIdx,
    pub label: TopologyLabel,
    /// For each source, the net number of times it traverses this edge
    /// forwards (backwards traversals count as -1).
    pub direction: [i32; 2],
    pub enabled: bool,
    pub visited: bool,
    /// For polygon reconstruction: whether the output traverses this edge forwards.
    pub forward: bool,
}

impl Edge {
    pub fn other_end(&self, n: NodeIdx) -> NodeIdx {
        if n == self.n1 {
            self.n2
        } else {
            self.n1
        }
    }

    /// The node this edge starts from, in its output orientation.
    pub fn tail(&self) -> NodeIdx {
        if self.forward {
            self.n1
        } else {
            self.n2
        }
    }

    /// The node this edge ends at, in its output orientation.
    pub fn head(&self) -> NodeIdx {
        if self.forward {
            self.n2
        } else {
            self.n1
        }
    }
}

/// A planar subdivision induced by one or two geometries.
#[derive(Clone, Debug, Serialize)]
pub struct PlanarGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    snapping: bool,
    tolerance: f64,
}

impl std::ops::Index<NodeIdx> for PlanarGraph {
    type Output = Node;

    fn index(&self, index: NodeIdx) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl std::ops::IndexMut<NodeIdx> for PlanarGraph {
    fn index_mut(&mut self, index: NodeIdx) -> &mut Node {
        &mut self.nodes[index.0]
    }
}

impl std::ops::Index<EdgeIdx> for PlanarGraph {
    type Output = Edge;

    fn index(&self, index: EdgeIdx) -> &Self::Output {
        &self.edges[index.0]
    }
}

impl std::ops::IndexMut<EdgeIdx> for PlanarGraph {
    fn index_mut(&mut self, index: EdgeIdx) -> &mut Edge {
        &mut self.edges[index.0]
    }
}

impl PlanarGraph {
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIdx> {
        (0..self.nodes.len()).map(NodeIdx)
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIdx> {
        (0..self.edges.len()).map(EdgeIdx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph was built with coordinates snapped to the tolerance grid.
    pub fn is_snapping(&self) -> bool {
        self.snapping
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The edge as a segment, running forwards.
    pub fn segment(&self, e: EdgeIdx) -> Segment {
        Segment::new(self[self[e].n1].coord, self[self[e].n2].coord)
    }

    pub fn midpoint(&self, e: EdgeIdx) -> Coordinate {
        self.segment(e).center()
    }

    /// How many times `source` passes through a node: the sum of the
    /// occurrence counts of its incident edges.
    pub fn degree(&self, n: NodeIdx, source: usize) -> u32 {
        self[n]
            .edges
            .iter()
            .map(|&e| self[e].label.occurrences(source))
            .sum()
    }

    /// Whether some edge used by `source` ends at this node.
    pub fn touches(&self, n: NodeIdx, source: usize) -> bool {
        self[n].edges.iter().any(|&e| self[e].label.is_used(source))
    }

    /// Whether `source` uses this node at all, as a point or a segment endpoint.
    pub fn node_used_by(&self, n: NodeIdx, source: usize) -> bool {
        self[n].label.is_used(source) || self.touches(n, source)
    }

    /// Whether some edge of `source`'s polygon boundary ends at this node.
    pub fn on_boundary(&self, n: NodeIdx, source: usize) -> bool {
        self[n].edges.iter().any(|&e| self[e].label.is_odd(source))
    }

    /// The number of enabled edges at a node.
    pub fn enabled_degree(&self, n: NodeIdx) -> usize {
        self[n].edges.iter().filter(|&&e| self[e].enabled).count()
    }

    pub fn enable_edge(&mut self, e: EdgeIdx, forward: bool) {
        self[e].enabled = true;
        self[e].forward = forward;
    }

    /// Disables and unvisits everything, so that the graph can be reconstructed again.
    pub fn reset(&mut self) {
        for n in &mut self.nodes {
            n.enabled = false;
            n.layout = ContourLayout::Unknown;
        }
        for e in &mut self.edges {
            e.enabled = false;
            e.visited = false;
            e.forward = true;
        }
    }

    /// Casts a ray from `p` and counts how many of the selected edges it crosses.
    ///
    /// The ray goes in the positive x direction, or in the positive y direction
    /// if `vertical` is set. Edges touching the ray's line are counted with a
    /// half-open rule, so that a ray through a vertex counts once.
    pub fn ray_parity(
        &self,
        p: &Coordinate,
        vertical: bool,
        skip: Option<EdgeIdx>,
        include: impl Fn(&Edge) -> bool,
    ) -> bool {
        let mut inside = false;
        for e in self.edge_indices() {
            if Some(e) == skip || !include(&self[e]) {
                continue;
            }
            let s = self.segment(e);
            let (a, b, q) = if vertical {
                (
                    Coordinate::new(s.v1.y, s.v1.x),
                    Coordinate::new(s.v2.y, s.v2.x),
                    Coordinate::new(p.y, p.x),
                )
            } else {
                (s.v1, s.v2, *p)
            };
            if (a.y > q.y) != (b.y > q.y) {
                let x = a.x + (q.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if q.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Whether `p` is inside the polygon formed by `source`'s boundary edges.
    pub fn inside_area(&self, p: &Coordinate, source: usize) -> bool {
        self.ray_parity(p, false, None, |e| e.label.is_odd(source))
    }
}
