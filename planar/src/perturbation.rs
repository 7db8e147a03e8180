//! Strategies for generating nearly-degenerate inputs.
//!
//! Robustness bugs hide in inputs that are almost, but not quite, what a
//! simple test would use: vertices a few ulps off a line, edges cut at
//! arbitrary parameters, rings stacked on perturbed copies of themselves. A
//! [`Perturbation`] describes one such mangling of a base ring.

use proptest::{arbitrary::any, prelude::*, prop_oneof, strategy::Strategy};

use crate::geom::{Coordinate, Segment};

/// Like `Arbitrary`, but local (so we can implement it for our own types) and
/// restricted to values of a sensible magnitude.
pub trait Reasonable {
    type Strategy: Strategy<Value = Self>;
    fn reasonable() -> Self::Strategy;
}

impl Reasonable for Coordinate {
    type Strategy = BoxedStrategy<Coordinate>;

    fn reasonable() -> Self::Strategy {
        (-1e6..1e6, -1e6..1e6)
            .prop_map(|(x, y)| Coordinate::new(x, y))
            .boxed()
    }
}

impl Reasonable for Segment {
    type Strategy = BoxedStrategy<Segment>;

    fn reasonable() -> Self::Strategy {
        (Coordinate::reasonable(), Coordinate::reasonable())
            .prop_map(|(v1, v2)| Segment::new(v1, v2))
            .boxed()
    }
}

/// Moves `f` by `n` representable values along the real line.
fn step_ulps(f: f64, n: i64) -> f64 {
    if !f.is_finite() {
        return f;
    }
    // On this integer line, adjacent floats are one apart and both zeros are 0.
    let to_line = |bits: i64| if bits < 0 { i64::MIN - bits } else { bits };
    let moved = to_line(f.to_bits() as i64).saturating_add(n);
    f64::from_bits(to_line(moved) as u64)
}

#[derive(Clone, Copy, Debug)]
pub enum FloatPerturbation {
    Ulps(i8),
    Offset(f64),
}

impl FloatPerturbation {
    fn apply(&self, f: f64) -> f64 {
        match *self {
            FloatPerturbation::Ulps(n) => step_ulps(f, n.into()),
            FloatPerturbation::Offset(d) => f + d,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointPerturbation {
    pub x: FloatPerturbation,
    pub y: FloatPerturbation,
}

impl PointPerturbation {
    pub fn apply(&self, p: Coordinate) -> Coordinate {
        Coordinate::new(self.x.apply(p.x), self.y.apply(p.y))
    }
}

/// A recipe for turning one of a list of base rings into a messier ring.
/// Indices wrap around, so any `usize` is valid.
#[derive(Clone, Debug)]
pub enum Perturbation {
    Base(usize),
    /// Nudges one vertex.
    Nudge {
        by: PointPerturbation,
        vertex: usize,
        inner: Box<Perturbation>,
    },
    /// Adds a vertex part way (`t` in `[0, 1)`) along an edge.
    Split {
        t: f64,
        edge: usize,
        inner: Box<Perturbation>,
    },
    /// Concatenates two rings.
    Stack(Box<Perturbation>, Box<Perturbation>),
}

impl Perturbation {
    pub fn realize(&self, base_rings: &[Vec<Coordinate>]) -> Vec<Coordinate> {
        match self {
            Perturbation::Base(idx) => base_rings[idx % base_rings.len()].clone(),
            Perturbation::Nudge { by, vertex, inner } => {
                let mut ring = inner.realize(base_rings);
                let i = vertex % ring.len();
                ring[i] = by.apply(ring[i]);
                ring
            }
            Perturbation::Split { t, edge, inner } => {
                let mut ring = inner.realize(base_rings);
                let i = edge % ring.len();
                let p = ring[i].affine(&ring[(i + 1) % ring.len()], *t);
                ring.insert(i + 1, p);
                ring
            }
            Perturbation::Stack(first, second) => {
                let mut ring = first.realize(base_rings);
                ring.extend(second.realize(base_rings));
                ring
            }
        }
    }
}

pub fn float_perturbation(eps: f64) -> impl Strategy<Value = FloatPerturbation> {
    prop_oneof![
        any::<i8>().prop_map(FloatPerturbation::Ulps),
        (-eps..=eps).prop_map(FloatPerturbation::Offset),
    ]
}

pub fn point_perturbation(eps: f64) -> impl Strategy<Value = PointPerturbation> {
    (float_perturbation(eps), float_perturbation(eps)).prop_map(|(x, y)| PointPerturbation { x, y })
}

pub fn perturbation(eps: f64) -> impl Strategy<Value = Perturbation> {
    any::<usize>()
        .prop_map(Perturbation::Base)
        .prop_recursive(3, 16, 8, move |inner| {
            let boxed = || inner.clone().prop_map(Box::new);
            prop_oneof![
                (point_perturbation(eps), any::<usize>(), boxed())
                    .prop_map(|(by, vertex, inner)| Perturbation::Nudge { by, vertex, inner }),
                (0.0..1.0, any::<usize>(), boxed())
                    .prop_map(|(t, edge, inner)| Perturbation::Split { t, edge, inner }),
                (boxed(), boxed()).prop_map(|(a, b)| Perturbation::Stack(a, b)),
            ]
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulp_steps() {
        assert_eq!(step_ulps(1.0, 1), 1.0 + f64::EPSILON);
        assert_eq!(step_ulps(1.0 + f64::EPSILON, -1), 1.0);
        assert_eq!(step_ulps(0.0, -1), -f64::from_bits(1));
        assert_eq!(step_ulps(-f64::from_bits(1), 2), f64::from_bits(1));
        assert_eq!(step_ulps(f64::INFINITY, 3), f64::INFINITY);
    }

    #[test]
    fn realize_splits_and_stacks() {
        let base = vec![vec![Coordinate::new(0.0, 0.0), Coordinate::new(2.0, 0.0), Coordinate::new(0.0, 2.0)]];
        let split = Perturbation::Split {
            t: 0.5,
            edge: 4,
            inner: Box::new(Perturbation::Base(7)),
        };
        let ring = split.realize(&base);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[2], Coordinate::new(1.0, 1.0));

        let stacked = Perturbation::Stack(Box::new(split), Box::new(Perturbation::Base(0)));
        assert_eq!(stacked.realize(&base).len(), 7);
    }
}
