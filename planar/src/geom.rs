use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A point in the plane.
///
/// Equality (`==`) is exact. Use [`Coordinate::tolerant_eq`] to compare up to
/// a tolerance.
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl std::fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Coordinate { x, y }
    }

    pub fn distance(&self, other: &Coordinate) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Two coordinates are tolerant-equal if they're strictly closer than `tolerance`.
    pub fn tolerant_eq(&self, other: &Coordinate, tolerance: f64) -> bool {
        self.distance(other) < tolerance
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Coordinate {
        Coordinate::new(self.x + dx, self.y + dy)
    }

    /// The point a fraction `t` of the way from `self` to `other`.
    pub fn affine(&self, other: &Coordinate, t: f64) -> Coordinate {
        Coordinate {
            x: (1.0 - t) * self.x + t * other.x,
            y: (1.0 - t) * self.y + t * other.y,
        }
    }

    /// Lexicographic order by `x` and then `y`.
    pub fn cmp_xy(&self, other: &Coordinate) -> std::cmp::Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Coordinate {
    type Output = Vector;

    fn sub(self, rhs: Self) -> Self::Output {
        Vector {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Add<Vector> for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Vector) -> Self::Output {
        Coordinate {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn cross(&self, other: &Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn scaled(&self, t: f64) -> Vector {
        Vector {
            x: self.x * t,
            y: self.y * t,
        }
    }
}

/// A line segment between two coordinates.
///
/// Unlike the segments inside a planar graph, these keep their orientation:
/// `v1` comes first when walking the geometry they came from.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub v1: Coordinate,
    pub v2: Coordinate,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -- {:?}", self.v1, self.v2)
    }
}

impl Segment {
    pub fn new(v1: Coordinate, v2: Coordinate) -> Self {
        Segment { v1, v2 }
    }

    pub fn length(&self) -> f64 {
        self.v1.distance(&self.v2)
    }

    pub fn center(&self) -> Coordinate {
        self.v1.affine(&self.v2, 0.5)
    }

    pub fn direction(&self) -> Vector {
        self.v2 - self.v1
    }

    pub fn reversed(&self) -> Segment {
        Segment {
            v1: self.v2,
            v2: self.v1,
        }
    }

    /// A segment is singular if its endpoints are tolerant-equal.
    pub fn is_singular(&self, tolerance: f64) -> bool {
        self.v1.tolerant_eq(&self.v2, tolerance)
    }

    pub fn bounding_rectangle(&self) -> BoundingRectangle {
        BoundingRectangle::spanning(self.v1, self.v2)
    }

    /// The parameter `t` of the point on the supporting line closest to `p`,
    /// where `t = 0` at `v1` and `t = 1` at `v2`.
    pub fn project(&self, p: &Coordinate) -> f64 {
        let d = self.direction();
        let len2 = d.dot(&d);
        if len2 == 0.0 {
            0.0
        } else {
            (*p - self.v1).dot(&d) / len2
        }
    }

    /// The distance from `p` to the closest point of this segment.
    pub fn distance_to(&self, p: &Coordinate) -> f64 {
        let t = self.project(p).clamp(0.0, 1.0);
        self.v1.affine(&self.v2, t).distance(p)
    }

    /// The distance from `p` to the infinite line through this segment.
    pub fn line_distance_to(&self, p: &Coordinate) -> f64 {
        let d = self.direction();
        let len = d.length();
        if len == 0.0 {
            self.v1.distance(p)
        } else {
            d.cross(&(*p - self.v1)).abs() / len
        }
    }
}

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingRectangle {
    min: Coordinate,
    max: Coordinate,
}

impl BoundingRectangle {
    /// Creates a rectangle from its lower-left and upper-right corners.
    ///
    /// Fails if the corners are inverted or not finite.
    pub fn new(min: Coordinate, max: Coordinate) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::Argument(format!(
                "rectangle corners must be finite, got {min:?} and {max:?}"
            )));
        }
        if min.x > max.x || min.y > max.y {
            return Err(Error::Argument(format!(
                "rectangle corners are inverted: {min:?} is not below-left of {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    /// The smallest rectangle containing both points, in whatever order they come.
    pub fn spanning(a: Coordinate, b: Coordinate) -> Self {
        Self {
            min: Coordinate::new(a.x.min(b.x), a.y.min(b.y)),
            max: Coordinate::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// The smallest rectangle containing all the points, or `None` if there aren't any.
    pub fn from_coordinates<'a>(
        coords: impl IntoIterator<Item = &'a Coordinate>,
    ) -> Option<Self> {
        let mut coords = coords.into_iter();
        let first = *coords.next()?;
        Some(coords.fold(Self::spanning(first, first), |r, c| r.including(c)))
    }

    pub fn min(&self) -> Coordinate {
        self.min
    }

    pub fn max(&self) -> Coordinate {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Coordinate {
        self.min.affine(&self.max, 0.5)
    }

    pub fn including(&self, c: &Coordinate) -> Self {
        Self {
            min: Coordinate::new(self.min.x.min(c.x), self.min.y.min(c.y)),
            max: Coordinate::new(self.max.x.max(c.x), self.max.y.max(c.y)),
        }
    }

    pub fn union(&self, other: &BoundingRectangle) -> Self {
        self.including(&other.min).including(&other.max)
    }

    /// Grows the rectangle by `d` on every side.
    pub fn expanded(&self, d: f64) -> Self {
        Self {
            min: self.min.translated(-d, -d),
            max: self.max.translated(d, d),
        }
    }

    /// Whether the rectangles overlap, after expanding both by `tolerance`.
    pub fn intersects(&self, other: &BoundingRectangle, tolerance: f64) -> bool {
        self.min.x <= other.max.x + tolerance
            && other.min.x <= self.max.x + tolerance
            && self.min.y <= other.max.y + tolerance
            && other.min.y <= self.max.y + tolerance
    }

    pub fn contains(&self, c: &Coordinate, tolerance: f64) -> bool {
        self.min.x - tolerance <= c.x
            && c.x <= self.max.x + tolerance
            && self.min.y - tolerance <= c.y
            && c.y <= self.max.y + tolerance
    }

    /// The four corners, counter-clockwise from the lower-left.
    pub fn corners(&self) -> [Coordinate; 4] {
        [
            self.min,
            Coordinate::new(self.max.x, self.min.y),
            self.max,
            Coordinate::new(self.min.x, self.max.y),
        ]
    }
}
