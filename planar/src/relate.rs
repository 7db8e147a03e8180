//! The dimensionally extended nine-intersection model (DE-9IM).
//!
//! An [`IntersectionMatrix`] records, for each pair of (interior, boundary,
//! exterior) of two geometries, the dimension of their intersection. We fill
//! it in from the planar graph of the two geometries: every node of the graph
//! has a location relative to each geometry, and so does every edge. A node
//! at (interior of A, boundary of B) means that those two sets meet in at
//! least a point, an edge means that they meet in at least a line, and areas
//! are handled by looking at what's on either side of the edges.
//!
//! ```
//! use planar::{relate, Context, Contour, Geometry};
//!
//! let ctx = Context::default();
//! let a = Geometry::from(Contour::from_flat(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]).unwrap());
//! let b = Geometry::from(Contour::from_flat(&[0.5, 0.5, 1.5, 0.5, 1.5, 1.5, 0.5, 1.5]).unwrap());
//! assert_eq!(relate::calculate(&ctx, &a, &b).unwrap().to_string(), "212101212");
//! assert!(relate::overlaps(&ctx, &a, &b).unwrap());
//! ```

use std::str::FromStr;

use serde::Serialize;

use crate::{
    context::Context,
    error::{Error, Result},
    geometry::{Dimension, Geometry, Location},
    graph::{EdgeIdx, NodeIdx, PlanarGraph},
    overlay::{joint_center, normalize, reject_collections, with_snapping_retry},
};

/// The value of one cell of an intersection matrix.
///
/// The variants are ordered, so that a cell can only be raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MatrixValue {
    /// Not computed.
    Undefined,
    /// The sets don't meet.
    Empty,
    Zero,
    One,
    Two,
}

impl MatrixValue {
    pub fn as_char(self) -> char {
        match self {
            MatrixValue::Undefined => 'U',
            MatrixValue::Empty => 'F',
            MatrixValue::Zero => '0',
            MatrixValue::One => '1',
            MatrixValue::Two => '2',
        }
    }

    fn from_char(c: char) -> Option<MatrixValue> {
        Some(match c {
            'U' => MatrixValue::Undefined,
            'F' => MatrixValue::Empty,
            '0' => MatrixValue::Zero,
            '1' => MatrixValue::One,
            '2' => MatrixValue::Two,
            _ => return None,
        })
    }

    fn is_non_empty(self) -> bool {
        self >= MatrixValue::Zero
    }
}

fn location_index(loc: Location) -> usize {
    match loc {
        Location::Interior => 0,
        Location::Boundary => 1,
        Location::Exterior => 2,
    }
}

/// Parses a nine-character pattern over `*TF012`, returning for each cell
/// whether it's constrained (i.e. not `*`).
fn parse_template(template: &str) -> Result<[[bool; 3]; 3]> {
    let chars: Vec<char> = template.chars().collect();
    if chars.len() != 9 {
        return Err(Error::Argument(format!(
            "DE-9IM templates have 9 characters, got {template:?}"
        )));
    }
    let mut ret = [[false; 3]; 3];
    for (i, c) in chars.into_iter().enumerate() {
        if !matches!(c, '*' | 'T' | 'F' | '0' | '1' | '2') {
            return Err(Error::Argument(format!(
                "bad character {c:?} in DE-9IM template {template:?}"
            )));
        }
        ret[i / 3][i % 3] = c != '*';
    }
    Ok(ret)
}

/// A DE-9IM matrix.
///
/// Rows are the interior, boundary and exterior of the first geometry, and
/// columns are the same for the second geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct IntersectionMatrix {
    cells: [[MatrixValue; 3]; 3],
}

impl IntersectionMatrix {
    /// A matrix with the wanted cells empty, and the others undefined.
    fn masked(wanted: [[bool; 3]; 3]) -> Self {
        let mut cells = [[MatrixValue::Undefined; 3]; 3];
        for (row, wanted_row) in cells.iter_mut().zip(wanted) {
            for (cell, wanted) in row.iter_mut().zip(wanted_row) {
                if wanted {
                    *cell = MatrixValue::Empty;
                }
            }
        }
        IntersectionMatrix { cells }
    }

    pub fn get(&self, a: Location, b: Location) -> MatrixValue {
        self.cells[location_index(a)][location_index(b)]
    }

    /// Raises a cell to at least `value`. Undefined cells stay undefined.
    fn raise(&mut self, a: Location, b: Location, value: MatrixValue) {
        let cell = &mut self.cells[location_index(a)][location_index(b)];
        if *cell != MatrixValue::Undefined && *cell < value {
            *cell = value;
        }
    }

    /// The matrix with the roles of the two geometries swapped.
    pub fn transposed(&self) -> Self {
        let mut cells = self.cells;
        for (i, row) in cells.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.cells[j][i];
            }
        }
        IntersectionMatrix { cells }
    }

    /// Checks the matrix against a pattern like `T*F**FFF*`.
    ///
    /// `*` matches anything, `T` matches any non-empty intersection, and `F`,
    /// `0`, `1` and `2` match exactly. An undefined cell only matches `*`.
    pub fn matches(&self, template: &str) -> Result<bool> {
        parse_template(template)?;
        Ok(template
            .chars()
            .zip(self.cells.iter().flatten())
            .all(|(t, &v)| match t {
                '*' => true,
                'T' => v.is_non_empty(),
                _ => MatrixValue::from_char(t) == Some(v),
            }))
    }
}

impl std::fmt::Display for IntersectionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for v in self.cells.iter().flatten() {
            write!(f, "{}", v.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for IntersectionMatrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let values: Vec<MatrixValue> = s
            .chars()
            .map(|c| {
                MatrixValue::from_char(c)
                    .ok_or_else(|| Error::Argument(format!("bad DE-9IM character {c:?}")))
            })
            .collect::<Result<_>>()?;
        if values.len() != 9 {
            return Err(Error::Argument(format!(
                "DE-9IM matrices have 9 characters, got {s:?}"
            )));
        }
        let mut cells = [[MatrixValue::Undefined; 3]; 3];
        for (i, v) in values.into_iter().enumerate() {
            cells[i / 3][i % 3] = v;
        }
        Ok(IntersectionMatrix { cells })
    }
}

fn node_location(g: &PlanarGraph, n: NodeIdx, source: usize, dim: Option<Dimension>) -> Location {
    match dim {
        None => Location::Exterior,
        Some(Dimension::Zero) => {
            if g[n].label.is_used(source) {
                Location::Interior
            } else {
                Location::Exterior
            }
        }
        // The mod-2 rule: a node is on the boundary of a line if an odd
        // number of path ends meet there.
        Some(Dimension::One) => match g.degree(n, source) {
            0 => Location::Exterior,
            d if d % 2 == 1 => Location::Boundary,
            _ => Location::Interior,
        },
        Some(Dimension::Two) => {
            if g.on_boundary(n, source) {
                Location::Boundary
            } else if g.inside_area(&g[n].coord, source) {
                Location::Interior
            } else {
                Location::Exterior
            }
        }
    }
}

fn edge_location(g: &PlanarGraph, e: EdgeIdx, source: usize, dim: Option<Dimension>) -> Location {
    match dim {
        None | Some(Dimension::Zero) => Location::Exterior,
        Some(Dimension::One) => {
            if g[e].label.is_used(source) {
                Location::Interior
            } else {
                Location::Exterior
            }
        }
        Some(Dimension::Two) => {
            if g[e].label.is_odd(source) {
                Location::Boundary
            } else if g.inside_area(&g.midpoint(e), source) {
                Location::Interior
            } else {
                Location::Exterior
            }
        }
    }
}

/// Finds the two-dimensional intersections, by looking at what's on either
/// side of each boundary edge.
fn fill_areas(g: &PlanarGraph, dims: [Option<Dimension>; 2], m: &mut IntersectionMatrix) {
    use Location::{Exterior as E, Interior as I};

    let is_area = |s: usize| dims[s] == Some(Dimension::Two);
    match (is_area(0), is_area(1)) {
        (true, true) => {}
        (true, false) => {
            m.raise(I, E, MatrixValue::Two);
            return;
        }
        (false, true) => {
            m.raise(E, I, MatrixValue::Two);
            return;
        }
        (false, false) => return,
    }

    for e in g.edge_indices() {
        let edge = &g[e];
        match (edge.label.is_odd(0), edge.label.is_odd(1)) {
            (true, true) => {
                if (edge.direction[0] > 0) == (edge.direction[1] > 0) {
                    m.raise(I, I, MatrixValue::Two);
                } else {
                    m.raise(I, E, MatrixValue::Two);
                    m.raise(E, I, MatrixValue::Two);
                }
            }
            (true, false) => {
                if g.inside_area(&g.midpoint(e), 1) {
                    m.raise(I, I, MatrixValue::Two);
                    m.raise(E, I, MatrixValue::Two);
                } else {
                    m.raise(I, E, MatrixValue::Two);
                }
            }
            (false, true) => {
                if g.inside_area(&g.midpoint(e), 0) {
                    m.raise(I, I, MatrixValue::Two);
                    m.raise(I, E, MatrixValue::Two);
                } else {
                    m.raise(E, I, MatrixValue::Two);
                }
            }
            (false, false) => {}
        }
    }
}

fn compute(ctx: &Context, a: &Geometry, b: &Geometry, wanted: [[bool; 3]; 3]) -> Result<IntersectionMatrix> {
    ctx.validate()?;
    reject_collections(&[a, b])?;

    let mut m = IntersectionMatrix::masked(wanted);
    // Both geometries are bounded, so their exteriors always overlap.
    m.raise(Location::Exterior, Location::Exterior, MatrixValue::Two);
    let Some(center) = joint_center(&[a, b]) else {
        return Ok(m);
    };
    let a = normalize(ctx, &a.translated(-center.x, -center.y))?;
    let b = normalize(ctx, &b.translated(-center.x, -center.y))?;
    let dims = [a.dimension(), b.dimension()];

    let g = with_snapping_retry(|snapping| PlanarGraph::build(ctx, &[&a, &b], snapping))?;
    for n in g.node_indices() {
        let la = node_location(&g, n, 0, dims[0]);
        let lb = node_location(&g, n, 1, dims[1]);
        m.raise(la, lb, MatrixValue::Zero);
    }
    for e in g.edge_indices() {
        let la = edge_location(&g, e, 0, dims[0]);
        let lb = edge_location(&g, e, 1, dims[1]);
        m.raise(la, lb, MatrixValue::One);
    }
    fill_areas(&g, dims, &mut m);
    Ok(m)
}

/// Computes the full intersection matrix of two geometries.
pub fn calculate(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<IntersectionMatrix> {
    compute(ctx, a, b, [[true; 3]; 3])
}

/// Computes only the cells that `template` constrains; the others are
/// [`MatrixValue::Undefined`].
pub fn calculate_partial(
    ctx: &Context,
    a: &Geometry,
    b: &Geometry,
    template: &str,
) -> Result<IntersectionMatrix> {
    compute(ctx, a, b, parse_template(template)?)
}

/// Whether the intersection matrix of two geometries matches a template.
pub fn relate(ctx: &Context, a: &Geometry, b: &Geometry, template: &str) -> Result<bool> {
    calculate_partial(ctx, a, b, template)?.matches(template)
}

/// The geometries are the same point set.
///
/// Two empty geometries are equal, even though their matrix (`FFFFFFFF2`)
/// doesn't match `T*F**FFF*`.
pub fn equals(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    if a.is_empty() && b.is_empty() {
        ctx.validate()?;
        reject_collections(&[a, b])?;
        return Ok(true);
    }
    relate(ctx, a, b, "T*F**FFF*")
}

pub fn disjoint(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    relate(ctx, a, b, "FF*FF****")
}

pub fn intersects(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    Ok(!disjoint(ctx, a, b)?)
}

/// The geometries meet, but only on their boundaries.
pub fn touches(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    if a.dimension() == Some(Dimension::Zero) && b.dimension() == Some(Dimension::Zero) {
        return Ok(false);
    }
    let m = calculate(ctx, a, b)?;
    for template in ["FT*******", "F**T*****", "F***T****"] {
        if m.matches(template)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The interiors meet in something of lower dimension than the larger
/// geometry, and each geometry sticks out of the other.
pub fn crosses(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    let (Some(da), Some(db)) = (a.dimension(), b.dimension()) else {
        return Ok(false);
    };
    let template = if da < db {
        "T*T******"
    } else if da > db {
        "T*****T**"
    } else if da == Dimension::One {
        "0********"
    } else {
        return Ok(false);
    };
    relate(ctx, a, b, template)
}

/// The geometries have the same dimension, their interiors meet in that
/// dimension, and neither contains the other.
pub fn overlaps(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    let (Some(da), Some(db)) = (a.dimension(), b.dimension()) else {
        return Ok(false);
    };
    if da != db {
        return Ok(false);
    }
    let template = if da == Dimension::One {
        "1*T***T**"
    } else {
        "T*T***T**"
    };
    relate(ctx, a, b, template)
}

pub fn within(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    relate(ctx, a, b, "T*F**F***")
}

pub fn contains(ctx: &Context, a: &Geometry, b: &Geometry) -> Result<bool> {
    relate(ctx, a, b, "T*****FF*")
}
