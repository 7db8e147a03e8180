//! Geometry value types.
//!
//! All geometries are immutable once built: constructors take ownership of a
//! vertex buffer and freeze it. Operations that "change" a geometry return a
//! new one.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    geom::{BoundingRectangle, Coordinate, Segment},
    predicates,
};

pub(crate) mod contour;
mod polygon;
mod validation;

pub use contour::Contour;
pub use polygon::Polygon;
pub use validation::ValidationError;

/// The topological dimension of a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Points.
    Zero,
    /// Curves.
    One,
    /// Areas.
    Two,
}

/// Where a point lies relative to a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Interior,
    Boundary,
    Exterior,
}

/// The winding of a contour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Clockwise,
    CounterClockwise,
    /// The contour has no area, or crosses itself.
    Undefined,
}

/// The role of a contour within a polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContourLayout {
    #[default]
    Unknown,
    /// A shell: counter-clockwise, with the polygon's interior inside.
    External,
    /// A hole: clockwise, with the polygon's interior outside.
    Internal,
    /// Crosses other contours, so it's neither a shell nor a hole.
    Intersect,
}

fn coordinates_from_flat(flat: &[f64]) -> Result<Vec<Coordinate>> {
    if flat.len() % 2 != 0 {
        return Err(Error::Argument(format!(
            "flat coordinate lists must have even length, got {}",
            flat.len()
        )));
    }
    Ok(flat
        .chunks_exact(2)
        .map(|xy| Coordinate::new(xy[0], xy[1]))
        .collect())
}

/// A set of points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPoint {
    points: Vec<Coordinate>,
}

impl MultiPoint {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// An open sequence of vertices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePath {
    vertices: Vec<Coordinate>,
}

impl LinePath {
    pub fn new(vertices: Vec<Coordinate>) -> Self {
        Self { vertices }
    }

    /// Builds a path from interleaved `x, y` values.
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        Ok(Self::new(coordinates_from_flat(flat)?))
    }

    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 2
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.vertices.windows(2).map(|w| Segment::new(w[0], w[1]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }

    pub fn reversed(&self) -> LinePath {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        LinePath { vertices }
    }

    pub(crate) fn translated(&self, dx: f64, dy: f64) -> LinePath {
        LinePath::new(self.vertices.iter().map(|v| v.translated(dx, dy)).collect())
    }
}

/// A collection of line paths.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    paths: Vec<LinePath>,
}

impl Polyline {
    pub fn new(paths: Vec<LinePath>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[LinePath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.iter().all(LinePath::is_empty)
    }

    pub fn length(&self) -> f64 {
        self.paths.iter().map(LinePath::length).sum()
    }

    pub(crate) fn translated(&self, dx: f64, dy: f64) -> Polyline {
        Polyline::new(self.paths.iter().map(|p| p.translated(dx, dy)).collect())
    }

    /// Splits the paths at every crossing and touch, and merges duplicated parts.
    pub fn simplify(&self, ctx: &crate::Context) -> Result<Polyline> {
        crate::overlay::simplify_line_paths(ctx, self)
    }
}

/// Any geometry the engine knows about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Coordinate),
    MultiPoint(MultiPoint),
    LinePath(LinePath),
    Polyline(Polyline),
    Contour(Contour),
    Polygon(Polygon),
    BoundingRectangle(BoundingRectangle),
    /// A heterogeneous collection, as produced by overlay. Overlay and relate
    /// don't accept these as inputs.
    Collection(Vec<Geometry>),
}

impl Geometry {
    /// The dimension of the geometry, or `None` if it's empty.
    pub fn dimension(&self) -> Option<Dimension> {
        if self.is_empty() {
            return None;
        }
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(Dimension::Zero),
            Geometry::LinePath(_) | Geometry::Polyline(_) => Some(Dimension::One),
            Geometry::Contour(_) | Geometry::Polygon(_) | Geometry::BoundingRectangle(_) => {
                Some(Dimension::Two)
            }
            Geometry::Collection(gs) => gs.iter().filter_map(Geometry::dimension).max(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) | Geometry::BoundingRectangle(_) => false,
            Geometry::MultiPoint(mp) => mp.is_empty(),
            Geometry::LinePath(lp) => lp.is_empty(),
            Geometry::Polyline(pl) => pl.is_empty(),
            Geometry::Contour(c) => c.is_empty(),
            Geometry::Polygon(p) => p.is_empty(),
            Geometry::Collection(gs) => gs.iter().all(Geometry::is_empty),
        }
    }

    /// Every coordinate of the geometry, in storage order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::MultiPoint(mp) => mp.points().to_vec(),
            Geometry::LinePath(lp) => lp.vertices().to_vec(),
            Geometry::Polyline(pl) => pl
                .paths()
                .iter()
                .flat_map(|p| p.vertices().iter().copied())
                .collect(),
            Geometry::Contour(c) => c.vertices().to_vec(),
            Geometry::Polygon(p) => p
                .contours()
                .iter()
                .flat_map(|c| c.vertices().iter().copied())
                .collect(),
            Geometry::BoundingRectangle(r) => r.corners().to_vec(),
            Geometry::Collection(gs) => gs.iter().flat_map(Geometry::coordinates).collect(),
        }
    }

    /// The bounding rectangle, or `None` for an empty geometry.
    pub fn bounding_rectangle(&self) -> Option<BoundingRectangle> {
        match self {
            Geometry::BoundingRectangle(r) => Some(*r),
            _ => BoundingRectangle::from_coordinates(&self.coordinates()),
        }
    }

    /// The convex hull, as the simplest geometry that can represent it.
    pub fn convex_hull(&self) -> Geometry {
        let hull = predicates::convex_hull(&self.coordinates());
        match hull.len() {
            0 => Geometry::MultiPoint(MultiPoint::default()),
            1 => Geometry::Point(hull[0]),
            2 => Geometry::LinePath(LinePath::new(hull)),
            _ => Geometry::Polygon(Polygon::new(vec![
                Contour::new(hull).with_layout(ContourLayout::External)
            ])),
        }
    }

    pub(crate) fn translated(&self, dx: f64, dy: f64) -> Geometry {
        match self {
            Geometry::Point(p) => Geometry::Point(p.translated(dx, dy)),
            Geometry::MultiPoint(mp) => Geometry::MultiPoint(MultiPoint::new(
                mp.points().iter().map(|p| p.translated(dx, dy)).collect(),
            )),
            Geometry::LinePath(lp) => Geometry::LinePath(lp.translated(dx, dy)),
            Geometry::Polyline(pl) => Geometry::Polyline(pl.translated(dx, dy)),
            Geometry::Contour(c) => Geometry::Contour(c.translated(dx, dy)),
            Geometry::Polygon(p) => Geometry::Polygon(p.translated(dx, dy)),
            Geometry::BoundingRectangle(r) => Geometry::BoundingRectangle(BoundingRectangle::spanning(
                r.min().translated(dx, dy),
                r.max().translated(dx, dy),
            )),
            Geometry::Collection(gs) => {
                Geometry::Collection(gs.iter().map(|g| g.translated(dx, dy)).collect())
            }
        }
    }

    /// The area of a two-dimensional geometry, and zero otherwise.
    pub fn area(&self) -> f64 {
        match self {
            Geometry::Contour(c) => c.area(),
            Geometry::Polygon(p) => p.area(),
            Geometry::BoundingRectangle(r) => r.width() * r.height(),
            Geometry::Collection(gs) => gs.iter().map(Geometry::area).sum(),
            _ => 0.0,
        }
    }

    /// The length of a one-dimensional geometry, or the perimeter of an area.
    pub fn length(&self) -> f64 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
            Geometry::LinePath(lp) => lp.length(),
            Geometry::Polyline(pl) => pl.length(),
            Geometry::Contour(c) => c.perimeter(),
            Geometry::Polygon(p) => p.perimeter(),
            Geometry::BoundingRectangle(r) => 2.0 * (r.width() + r.height()),
            Geometry::Collection(gs) => gs.iter().map(Geometry::length).sum(),
        }
    }
}

impl From<Coordinate> for Geometry {
    fn from(c: Coordinate) -> Self {
        Geometry::Point(c)
    }
}

impl From<MultiPoint> for Geometry {
    fn from(mp: MultiPoint) -> Self {
        Geometry::MultiPoint(mp)
    }
}

impl From<LinePath> for Geometry {
    fn from(lp: LinePath) -> Self {
        Geometry::LinePath(lp)
    }
}

impl From<Polyline> for Geometry {
    fn from(pl: Polyline) -> Self {
        Geometry::Polyline(pl)
    }
}

impl From<Contour> for Geometry {
    fn from(c: Contour) -> Self {
        Geometry::Contour(c)
    }
}

impl From<Polygon> for Geometry {
    fn from(p: Polygon) -> Self {
        Geometry::Polygon(p)
    }
}

impl From<BoundingRectangle> for Geometry {
    fn from(r: BoundingRectangle) -> Self {
        Geometry::BoundingRectangle(r)
    }
}
