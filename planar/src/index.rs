//! Spatial indices over bounding rectangles.
//!
//! The graph builder uses these to find finalized segments near a pending
//! one. Small inputs get a [`SortedIndex`] and large ones an [`RTreeIndex`].

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use rstar::{RTree, RTreeObject, AABB};

use crate::geom::BoundingRectangle;

/// A set of ids, each tagged with a bounding rectangle.
pub trait SpatialIndex {
    fn insert(&mut self, id: usize, bounds: BoundingRectangle);

    /// Removes an entry. `bounds` must be the rectangle it was inserted with.
    /// Returns false if there was no such entry.
    fn remove(&mut self, id: usize, bounds: &BoundingRectangle) -> bool;

    /// The ids of all entries whose rectangles intersect `window`, in
    /// increasing order.
    fn query(&self, window: &BoundingRectangle) -> Vec<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks an index implementation for the given number of input points.
pub fn for_point_count(points: usize, threshold: usize) -> Box<dyn SpatialIndex> {
    if points > threshold {
        Box::<RTreeIndex>::default()
    } else {
        Box::<SortedIndex>::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    id: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for Entry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope(r: &BoundingRectangle) -> AABB<[f64; 2]> {
    AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y])
}

/// An R-tree, for large inputs.
#[derive(Default)]
pub struct RTreeIndex {
    tree: RTree<Entry>,
}

impl SpatialIndex for RTreeIndex {
    fn insert(&mut self, id: usize, bounds: BoundingRectangle) {
        self.tree.insert(Entry {
            id,
            envelope: envelope(&bounds),
        });
    }

    fn remove(&mut self, id: usize, bounds: &BoundingRectangle) -> bool {
        self.tree
            .remove(&Entry {
                id,
                envelope: envelope(bounds),
            })
            .is_some()
    }

    fn query(&self, window: &BoundingRectangle) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope(window))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

/// Entries sorted by their left edge, scanned linearly up to the right edge
/// of the query window.
#[derive(Default)]
pub struct SortedIndex {
    entries: BTreeMap<(OrderedFloat<f64>, usize), BoundingRectangle>,
}

impl SpatialIndex for SortedIndex {
    fn insert(&mut self, id: usize, bounds: BoundingRectangle) {
        self.entries.insert((OrderedFloat(bounds.min().x), id), bounds);
    }

    fn remove(&mut self, id: usize, bounds: &BoundingRectangle) -> bool {
        self.entries
            .remove(&(OrderedFloat(bounds.min().x), id))
            .is_some()
    }

    fn query(&self, window: &BoundingRectangle) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .entries
            .range(..=(OrderedFloat(window.max().x), usize::MAX))
            .filter(|(_, bounds)| bounds.intersects(window, 0.0))
            .map(|((_, id), _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{geom::Coordinate, perturbation::Reasonable};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingRectangle {
        BoundingRectangle::spanning(Coordinate::new(x0, y0), Coordinate::new(x1, y1))
    }

    fn exercise(index: &mut dyn SpatialIndex) {
        index.insert(0, rect(0.0, 0.0, 1.0, 1.0));
        index.insert(1, rect(2.0, 2.0, 3.0, 3.0));
        index.insert(2, rect(0.5, 0.5, 2.5, 2.5));
        assert_eq!(index.len(), 3);

        assert_eq!(index.query(&rect(0.9, 0.9, 1.1, 1.1)), vec![0, 2]);
        assert_eq!(index.query(&rect(1.0, 1.0, 2.0, 2.0)), vec![0, 1, 2]);
        assert_eq!(index.query(&rect(5.0, 5.0, 6.0, 6.0)), Vec::<usize>::new());

        assert!(index.remove(2, &rect(0.5, 0.5, 2.5, 2.5)));
        assert!(!index.remove(2, &rect(0.5, 0.5, 2.5, 2.5)));
        assert_eq!(index.query(&rect(0.9, 0.9, 1.1, 1.1)), vec![0]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn sorted() {
        exercise(&mut SortedIndex::default());
    }

    #[test]
    fn rtree() {
        exercise(&mut RTreeIndex::default());
    }

    proptest! {
        #[test]
        fn indices_agree(
            rects in prop::collection::vec((Coordinate::reasonable(), Coordinate::reasonable()), 1..40),
            window in (Coordinate::reasonable(), Coordinate::reasonable()),
        ) {
            let mut sorted = SortedIndex::default();
            let mut rtree = RTreeIndex::default();
            for (id, (a, b)) in rects.iter().enumerate() {
                sorted.insert(id, BoundingRectangle::spanning(*a, *b));
                rtree.insert(id, BoundingRectangle::spanning(*a, *b));
            }
            let window = BoundingRectangle::spanning(window.0, window.1);
            prop_assert_eq!(sorted.query(&window), rtree.query(&window));
        }
    }
}
