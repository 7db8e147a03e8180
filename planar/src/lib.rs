#![doc = include_str!("../README.md")]

pub mod context;
pub mod error;
pub mod geom;
pub mod geometry;
pub mod graph;
pub mod index;
pub mod overlay;
pub mod predicates;
pub mod relate;

pub use context::Context;
pub use error::{BuildFailure, Error, Result, TopologyFailure};
pub use geom::{BoundingRectangle, Coordinate, Segment, Vector};
pub use geometry::{
    Contour, ContourLayout, Dimension, Geometry, LinePath, Location, MultiPoint, Orientation,
    Polygon, Polyline, ValidationError,
};
pub use overlay::{overlay, OverlayOp};
pub use relate::{IntersectionMatrix, MatrixValue};

#[cfg(test)]
pub(crate) mod perturbation;
