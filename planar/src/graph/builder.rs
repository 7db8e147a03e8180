//! Construction of planar graphs.
//!
//! Building proceeds in stages: every input vertex becomes a node, every
//! input segment becomes a pending "piece" between two nodes, and then pieces
//! are taken off the pending stack one at a time. A piece is either merged
//! into an identical finalized piece, split at a node lying on it, split
//! (along with a finalized piece) at a crossing, or finalized. Splitting puts
//! the new pieces back on the stack, so the loop runs until nothing crosses.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{
    label::TopologyLabel,
    segments::Segments,
    Edge, Node, NodeIdx, PlanarGraph,
};
use crate::{
    context::Context,
    error::{BuildFailure, Error, TopologyFailure},
    geom::{BoundingRectangle, Coordinate, Segment},
    geometry::{ContourLayout, Geometry},
    index::{self, SpatialIndex},
    predicates::{intersect_robust, orientation_index, snap_to_grid, SegmentIntersection},
};

/// Under snapping, segments shorter than this many grid cells are dropped.
/// Anything longer keeps distinct endpoints after rounding, because rounding
/// moves each endpoint by at most half a cell diagonal.
pub(crate) const SNAP_MIN_LENGTH_FACTOR: f64 = 1.42;

/// A piece of an input segment, between two nodes.
#[derive(Clone, Debug)]
struct Piece {
    n1: NodeIdx,
    n2: NodeIdx,
    label: TopologyLabel,
    direction: [i32; 2],
}

impl Piece {
    /// A piece used once by `source`, traversed from `from` to `to`.
    fn new(source: usize, from: NodeIdx, to: NodeIdx) -> Self {
        let mut direction = [0; 2];
        direction[source] = if from < to { 1 } else { -1 };
        Piece {
            n1: from.min(to),
            n2: from.max(to),
            label: TopologyLabel::single(source),
            direction,
        }
    }

    /// A piece with the same usage as this one, between two other nodes.
    /// `from` and `to` are in this piece's forward order.
    fn sub_piece(&self, from: NodeIdx, to: NodeIdx) -> Self {
        let direction = if from < to {
            self.direction
        } else {
            [-self.direction[0], -self.direction[1]]
        };
        Piece {
            n1: from.min(to),
            n2: from.max(to),
            label: self.label,
            direction,
        }
    }

    fn absorb(&mut self, other: &Piece) {
        self.label.merge(&other.label);
        self.direction[0] += other.direction[0];
        self.direction[1] += other.direction[1];
    }

    fn has_end(&self, n: NodeIdx) -> bool {
        self.n1 == n || self.n2 == n
    }
}

struct GraphBuilder<'a> {
    ctx: &'a Context,
    tolerance: f64,
    snapping: bool,
    grid_origin: Coordinate,
    nodes: Vec<Node>,
    node_index: Box<dyn SpatialIndex>,
    /// Under snapping, nodes are found by exact (grid) coordinate.
    snapped_nodes: HashMap<(u64, u64), NodeIdx>,
    /// Finalized pieces. Pieces that were split later stay here but are dead.
    pieces: Vec<Piece>,
    alive: Vec<bool>,
    piece_index: Box<dyn SpatialIndex>,
    by_nodes: HashMap<(NodeIdx, NodeIdx), usize>,
    pending: Vec<Piece>,
}

impl PlanarGraph {
    /// Builds the planar graph of one or two geometries.
    ///
    /// The geometries become sources 0 and 1, in order. If `snapping` is set,
    /// every node is rounded to a grid with cells the size of the tolerance.
    pub fn build(
        ctx: &Context,
        sources: &[&Geometry],
        snapping: bool,
    ) -> Result<PlanarGraph, BuildFailure> {
        ctx.validate()?;
        if sources.len() > 2 {
            return Err(Error::Argument(format!(
                "a planar graph has at most two sources, got {}",
                sources.len()
            ))
            .into());
        }

        let min_len = if snapping {
            ctx.tolerance * SNAP_MIN_LENGTH_FACTOR
        } else {
            ctx.tolerance
        };
        let mut segments = Segments::default();
        for (source, g) in sources.iter().enumerate() {
            segments.add_geometry(source, g, min_len)?;
        }

        let mut builder = GraphBuilder::new(ctx, snapping, segments.coordinate_count());
        builder.add_vertices(&segments)?;
        builder.add_source_segments(&segments)?;
        builder.split_segments()?;
        Ok(builder.finish())
    }
}

impl<'a> GraphBuilder<'a> {
    fn new(ctx: &'a Context, snapping: bool, point_count: usize) -> Self {
        let threshold = ctx.spatial_index_threshold;
        GraphBuilder {
            ctx,
            tolerance: ctx.tolerance,
            snapping,
            grid_origin: Coordinate::default(),
            nodes: Vec::new(),
            node_index: index::for_point_count(point_count, threshold),
            snapped_nodes: HashMap::new(),
            pieces: Vec::new(),
            alive: Vec::new(),
            piece_index: index::for_point_count(point_count, threshold),
            by_nodes: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn coord(&self, n: NodeIdx) -> Coordinate {
        self.nodes[n.0].coord
    }

    fn segment(&self, n1: NodeIdx, n2: NodeIdx) -> Segment {
        Segment::new(self.coord(n1), self.coord(n2))
    }

    /// Finds the node for a coordinate, creating one if necessary. Returns the
    /// node, and whether it's new.
    fn node_for(&mut self, c: Coordinate) -> Result<(NodeIdx, bool), BuildFailure> {
        let c = if self.snapping {
            let snapped = snap_to_grid(&c, &self.grid_origin, self.tolerance).ok_or_else(|| {
                Error::InsufficientPrecision(TopologyFailure::new(
                    "coordinate is too far from the snapping grid",
                    c,
                ))
            })?;
            // Normalize negative zero, so that it hashes like positive zero.
            let snapped = Coordinate::new(snapped.x + 0.0, snapped.y + 0.0);
            if let Some(&n) = self.snapped_nodes.get(&(snapped.x.to_bits(), snapped.y.to_bits())) {
                return Ok((n, false));
            }
            snapped
        } else {
            let window = BoundingRectangle::spanning(c, c).expanded(self.tolerance);
            let closest = self
                .node_index
                .query(&window)
                .into_iter()
                .map(|i| (i, self.nodes[i].coord.distance(&c)))
                .filter(|&(_, d)| d < self.tolerance)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, _)) = closest {
                return Ok((NodeIdx(i), false));
            }
            c
        };

        let idx = NodeIdx(self.nodes.len());
        self.nodes.push(Node {
            coord: c,
            label: TopologyLabel::default(),
            edges: Vec::new(),
            enabled: false,
            layout: ContourLayout::Unknown,
        });
        self.node_index.insert(idx.0, BoundingRectangle::spanning(c, c));
        if self.snapping {
            self.snapped_nodes.insert((c.x.to_bits(), c.y.to_bits()), idx);
        }
        trace!(node = ?idx, coord = ?c, "created node");
        Ok((idx, true))
    }

    fn add_vertices(&mut self, segments: &Segments) -> Result<(), BuildFailure> {
        for idx in segments.indices() {
            let s = *segments.get(idx);
            self.node_for(s.v1)?;
            self.node_for(s.v2)?;
        }
        for &(source, p) in segments.points() {
            let (n, _) = self.node_for(p)?;
            self.nodes[n.0].label.mark(source);
        }
        Ok(())
    }

    fn add_source_segments(&mut self, segments: &Segments) -> Result<(), BuildFailure> {
        for idx in segments.indices() {
            let s = *segments.get(idx);
            let (from, _) = self.node_for(s.v1)?;
            let (to, _) = self.node_for(s.v2)?;
            if from == to {
                return Err(TopologyFailure::new("segment endpoints collapse onto one node", s.v1).into());
            }
            self.pending.push(Piece::new(segments.source(idx), from, to));
        }
        // The pending list is a stack; this makes us process segments in input order.
        self.pending.reverse();
        Ok(())
    }

    /// Is node `m` on the segment from `n1` to `n2`, strictly between the ends?
    fn node_on_segment(&self, m: NodeIdx, n1: NodeIdx, n2: NodeIdx) -> bool {
        if m == n1 || m == n2 {
            return false;
        }
        let seg = self.segment(n1, n2);
        let c = self.coord(m);
        let t = seg.project(&c);
        if t <= 0.0 || t >= 1.0 {
            return false;
        }
        if self.snapping {
            orientation_index(&seg, &c) == 0
        } else {
            seg.distance_to(&c) < self.tolerance
        }
    }

    /// All nodes strictly on the segment, ordered from `n1` to `n2`.
    fn nodes_on(&self, n1: NodeIdx, n2: NodeIdx) -> Vec<NodeIdx> {
        let seg = self.segment(n1, n2);
        let window = seg.bounding_rectangle().expanded(self.tolerance);
        let mut on: Vec<(f64, NodeIdx)> = self
            .node_index
            .query(&window)
            .into_iter()
            .map(NodeIdx)
            .filter(|&m| self.node_on_segment(m, n1, n2))
            .map(|m| (seg.project(&self.coord(m)), m))
            .collect();
        on.sort_by(|a, b| a.0.total_cmp(&b.0));
        on.into_iter().map(|(_, m)| m).collect()
    }

    /// Cuts a piece at some nodes, which need not be sorted.
    fn split_piece(&self, piece: &Piece, cuts: &[NodeIdx]) -> Result<Vec<Piece>, BuildFailure> {
        let seg = self.segment(piece.n1, piece.n2);
        let mut cuts: Vec<(f64, NodeIdx)> = cuts
            .iter()
            .filter(|&&m| !piece.has_end(m))
            .map(|&m| (seg.project(&self.coord(m)), m))
            .collect();
        cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
        cuts.dedup_by_key(|c| c.1);

        let chain: Vec<NodeIdx> = std::iter::once(piece.n1)
            .chain(cuts.into_iter().map(|(_, m)| m))
            .chain(std::iter::once(piece.n2))
            .collect();
        let mut ret = Vec::with_capacity(chain.len() - 1);
        for w in chain.windows(2) {
            if w[0] == w[1] {
                return Err(TopologyFailure::new("split collapses a segment", self.coord(w[0])).into());
            }
            trace!(from = ?w[0], to = ?w[1], "split segment");
            ret.push(piece.sub_piece(w[0], w[1]));
        }
        Ok(ret)
    }

    /// Removes a finalized piece, and queues up its parts after cutting it.
    fn split_finalized(&mut self, q: usize, cuts: &[NodeIdx]) -> Result<(), BuildFailure> {
        let piece = self.pieces[q].clone();
        let parts = self.split_piece(&piece, cuts)?;
        self.alive[q] = false;
        self.piece_index
            .remove(q, &self.segment(piece.n1, piece.n2).bounding_rectangle());
        self.by_nodes.remove(&(piece.n1, piece.n2));
        self.pending.extend(parts);
        Ok(())
    }

    /// Splits every finalized piece that a newly created node lies on.
    fn split_finalized_at(&mut self, m: NodeIdx) -> Result<(), BuildFailure> {
        let c = self.coord(m);
        let window = BoundingRectangle::spanning(c, c).expanded(self.tolerance);
        for q in self.piece_index.query(&window) {
            let (n1, n2) = (self.pieces[q].n1, self.pieces[q].n2);
            if self.alive[q] && self.node_on_segment(m, n1, n2) {
                self.split_finalized(q, &[m])?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self, piece: Piece) {
        let idx = self.pieces.len();
        self.piece_index
            .insert(idx, self.segment(piece.n1, piece.n2).bounding_rectangle());
        self.by_nodes.insert((piece.n1, piece.n2), idx);
        self.pieces.push(piece);
        self.alive.push(true);
    }

    /// Handles one pending piece.
    fn process(&mut self, piece: Piece) -> Result<(), BuildFailure> {
        if let Some(&q) = self.by_nodes.get(&(piece.n1, piece.n2)) {
            self.pieces[q].absorb(&piece);
            return Ok(());
        }

        let on = self.nodes_on(piece.n1, piece.n2);
        if !on.is_empty() {
            let parts = self.split_piece(&piece, &on)?;
            self.pending.extend(parts);
            return Ok(());
        }

        let seg = self.segment(piece.n1, piece.n2);
        let window = seg.bounding_rectangle().expanded(self.tolerance);
        for q in self.piece_index.query(&window) {
            if !self.alive[q] {
                continue;
            }
            let other = self.segment(self.pieces[q].n1, self.pieces[q].n2);
            let cuts: Vec<(Coordinate, NodeIdx, bool)> =
                match intersect_robust(&seg, &other, self.tolerance) {
                    SegmentIntersection::None => continue,
                    SegmentIntersection::Point(x) => {
                        let (m, created) = self.node_for(x)?;
                        vec![(x, m, created)]
                    }
                    SegmentIntersection::Overlap(s) => {
                        let (m1, c1) = self.node_for(s.v1)?;
                        let (m2, c2) = self.node_for(s.v2)?;
                        vec![(s.v1, m1, c1), (s.v2, m2, c2)]
                    }
                };

            let mut created_any = false;
            for &(_, m, created) in &cuts {
                if created {
                    created_any = true;
                    self.split_finalized_at(m)?;
                }
            }

            let piece_cuts: Vec<NodeIdx> = cuts
                .iter()
                .map(|c| c.1)
                .filter(|&m| !piece.has_end(m))
                .collect();
            let q_cuts: Vec<NodeIdx> = if self.alive[q] {
                cuts.iter()
                    .map(|c| c.1)
                    .filter(|&m| !self.pieces[q].has_end(m))
                    .collect()
            } else {
                Vec::new()
            };

            if piece_cuts.is_empty() && q_cuts.is_empty() && !created_any {
                // The segments only meet at shared endpoints.
                let distinct = cuts.first().map(|c| c.1) != cuts.last().map(|c| c.1);
                if distinct {
                    return Err(TopologyFailure::new("overlapping segments collapse", cuts[0].0).into());
                }
                continue;
            }

            if !q_cuts.is_empty() {
                self.split_finalized(q, &q_cuts)?;
            }
            if piece_cuts.is_empty() {
                self.pending.push(piece);
            } else {
                let parts = self.split_piece(&piece, &piece_cuts)?;
                self.pending.extend(parts);
            }
            return Ok(());
        }

        self.finalize(piece);
        Ok(())
    }

    fn split_segments(&mut self) -> Result<(), BuildFailure> {
        // Every split strictly shortens a piece, but with tolerances in play
        // that isn't quite a termination proof. Give up eventually.
        let n = self.pending.len().saturating_add(16);
        let budget = n.saturating_mul(n).saturating_mul(4);
        let mut steps = 0usize;

        while let Some(piece) = self.pending.pop() {
            self.ctx.check_cancelled()?;
            steps += 1;
            if steps > budget {
                return Err(TopologyFailure::new(
                    "segment splitting did not converge",
                    self.coord(piece.n1),
                )
                .into());
            }
            self.process(piece)?;
        }
        Ok(())
    }

    fn finish(self) -> PlanarGraph {
        let GraphBuilder {
            mut nodes,
            pieces,
            alive,
            snapping,
            tolerance,
            ..
        } = self;

        let mut edges = Vec::new();
        for (piece, alive) in pieces.into_iter().zip(alive) {
            if !alive {
                continue;
            }
            let idx = super::EdgeIdx(edges.len());
            nodes[piece.n1.0].edges.push(idx);
            nodes[piece.n2.0].edges.push(idx);
            edges.push(Edge {
                n1: piece.n1,
                n2: piece.n2,
                label: piece.label,
                direction: piece.direction,
                enabled: false,
                visited: false,
                forward: true,
            });
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            snapping,
            "built planar graph"
        );
        PlanarGraph {
            nodes,
            edges,
            snapping,
            tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Arc};

    use assert_matches::assert_matches;

    use super::*;
    use crate::geometry::{Contour, LinePath, MultiPoint};

    #[test]
    fn crossing_lines() {
        let ctx = Context::default();
        let a = Geometry::LinePath(LinePath::from_flat(&[0.0, 0.0, 2.0, 2.0]).unwrap());
        let b = Geometry::LinePath(LinePath::from_flat(&[0.0, 2.0, 2.0, 0.0]).unwrap());
        let g = PlanarGraph::build(&ctx, &[&a, &b], false).unwrap();
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 4);
        let center = g
            .node_indices()
            .find(|&n| g[n].coord == Coordinate::new(1.0, 1.0))
            .unwrap();
        assert_eq!(g[center].edges.len(), 4);
    }

    #[test]
    fn collinear_overlap() {
        let ctx = Context::default();
        let a = Geometry::LinePath(LinePath::from_flat(&[0.0, 0.0, 2.0, 0.0]).unwrap());
        let b = Geometry::LinePath(LinePath::from_flat(&[3.0, 0.0, 1.0, 0.0]).unwrap());
        let g = PlanarGraph::build(&ctx, &[&a, &b], false).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
        let shared: Vec<_> = g.edge_indices().filter(|&e| g[e].label.used_by_both()).collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(g.segment(shared[0]).length(), 1.0);
        // Path a runs backwards along the shared edge, and path b forwards.
        assert_eq!(g[shared[0]].direction, [-1, 1]);
    }

    #[test]
    fn isolated_points() {
        let ctx = Context::default();
        let a = Geometry::MultiPoint(MultiPoint::new(vec![
            Coordinate::new(0.5, 0.0),
            Coordinate::new(5.0, 5.0),
            Coordinate::new(5.0, 5.0),
        ]));
        let b = Geometry::LinePath(LinePath::from_flat(&[0.0, 0.0, 1.0, 0.0]).unwrap());
        let g = PlanarGraph::build(&ctx, &[&a, &b], false).unwrap();
        assert_eq!(g.node_count(), 4);
        // The point on the line splits it.
        assert_eq!(g.edge_count(), 2);
        let far = g
            .node_indices()
            .find(|&n| g[n].coord == Coordinate::new(5.0, 5.0))
            .unwrap();
        assert_eq!(g[far].label.occurrences(0), 2);
        assert!(g[far].edges.is_empty());
    }

    #[test]
    fn snapped_nodes_are_on_the_grid() {
        let ctx = Context::new(0.5).unwrap();
        let a = Geometry::Contour(
            Contour::from_flat(&[0.1, 0.1, 3.9, 0.2, 4.1, 3.8, 0.2, 4.2]).unwrap(),
        );
        let g = PlanarGraph::build(&ctx, &[&a], true).unwrap();
        assert!(g.is_snapping());
        for n in g.node_indices() {
            let c = g[n].coord;
            assert_eq!(c.x * 2.0, (c.x * 2.0).round());
            assert_eq!(c.y * 2.0, (c.y * 2.0).round());
        }
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn cancelled_build() {
        let flag = Arc::new(AtomicBool::new(true));
        let ctx = Context::default().with_cancellation(flag);
        let a = Geometry::LinePath(LinePath::from_flat(&[0.0, 0.0, 2.0, 2.0]).unwrap());
        assert_matches!(
            PlanarGraph::build(&ctx, &[&a], false),
            Err(BuildFailure::Abort(Error::Cancelled))
        );
    }

    #[test]
    fn collections_are_rejected() {
        let ctx = Context::default();
        let a = Geometry::Collection(vec![]);
        assert_matches!(
            PlanarGraph::build(&ctx, &[&a], false),
            Err(BuildFailure::Abort(Error::UnsupportedGeometry(_)))
        );
    }
}
