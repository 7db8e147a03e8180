use crate::{
    error::{Error, Result},
    geom::{Coordinate, Segment},
    geometry::{contour::cyclic_pairs, Geometry},
};

/// An index into our segment arena.
///
/// We assign identities to input segments, so that we may consider segments
/// as different even if they have the same endpoints. (This breaks down if
/// there are multiple `Segments` in flight. Just be careful not to mix them up.)
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct SegIdx(pub usize);

impl std::fmt::Debug for SegIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s_{}", self.0)
    }
}

/// The input to graph construction: directed segments and isolated points,
/// each tagged with the source geometry (0 or 1) they came from.
#[derive(Clone, Debug, Default)]
pub struct Segments {
    segs: Vec<Segment>,
    source: Vec<usize>,
    points: Vec<(usize, Coordinate)>,
    /// The number of input coordinates, before any were dropped.
    coordinate_count: usize,
}

impl Segments {
    pub fn get(&self, idx: SegIdx) -> &Segment {
        &self.segs[idx.0]
    }

    pub fn source(&self, idx: SegIdx) -> usize {
        self.source[idx.0]
    }

    pub fn indices(&self) -> impl Iterator<Item = SegIdx> {
        (0..self.segs.len()).map(SegIdx)
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty() && self.points.is_empty()
    }

    /// Isolated points, with their sources.
    pub fn points(&self) -> &[(usize, Coordinate)] {
        &self.points
    }

    pub fn coordinate_count(&self) -> usize {
        self.coordinate_count
    }

    /// Adds the segments of a vertex sequence.
    ///
    /// Vertices closer than `min_len` to the previously kept vertex are
    /// skipped, so no segment is shorter than `min_len`.
    pub fn add_points(
        &mut self,
        source: usize,
        ps: impl IntoIterator<Item = Coordinate>,
        closed: bool,
        min_len: f64,
    ) {
        let mut kept: Vec<Coordinate> = Vec::new();
        for p in ps {
            self.coordinate_count += 1;
            if kept.last().map_or(true, |q| q.distance(&p) >= min_len) {
                kept.push(p);
            }
        }
        if closed {
            while kept.len() > 1 && kept[0].distance(&kept[kept.len() - 1]) < min_len {
                kept.pop();
            }
        }
        if kept.len() <= 1 {
            return;
        }

        if closed {
            for (p, q) in cyclic_pairs(&kept) {
                self.segs.push(Segment::new(*p, *q));
                self.source.push(source);
            }
        } else {
            for w in kept.windows(2) {
                self.segs.push(Segment::new(w[0], w[1]));
                self.source.push(source);
            }
        }
    }

    pub fn add_point(&mut self, source: usize, p: Coordinate) {
        self.coordinate_count += 1;
        self.points.push((source, p));
    }

    /// Adds all the segments and points of a geometry.
    pub fn add_geometry(&mut self, source: usize, g: &Geometry, min_len: f64) -> Result<()> {
        if let Some(bad) = g.coordinates().into_iter().find(|c| !c.is_finite()) {
            return Err(Error::Argument(format!(
                "coordinates must be finite, got {bad:?}"
            )));
        }
        match g {
            Geometry::Point(p) => self.add_point(source, *p),
            Geometry::MultiPoint(mp) => {
                for p in mp.points() {
                    self.add_point(source, *p);
                }
            }
            Geometry::LinePath(lp) => {
                self.add_points(source, lp.vertices().iter().copied(), false, min_len)
            }
            Geometry::Polyline(pl) => {
                for lp in pl.paths() {
                    self.add_points(source, lp.vertices().iter().copied(), false, min_len);
                }
            }
            Geometry::Contour(c) => {
                self.add_points(source, c.vertices().iter().copied(), true, min_len)
            }
            Geometry::Polygon(poly) => {
                for c in poly.contours() {
                    self.add_points(source, c.vertices().iter().copied(), true, min_len);
                }
            }
            Geometry::BoundingRectangle(r) => self.add_points(source, r.corners(), true, min_len),
            Geometry::Collection(_) => {
                return Err(Error::UnsupportedGeometry(
                    "geometry collections can't be added to a planar graph",
                ))
            }
        }
        Ok(())
    }
}
