//! Error types for the topology engine.

use crate::geom::Coordinate;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the engine.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// A caller-supplied value was malformed: a bad tolerance, an odd number
    /// of flat coordinates, inverted rectangle corners, a bad DE-9IM template.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The operation doesn't know how to handle this kind of geometry.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(&'static str),

    /// Graph construction failed even after retrying with snapping enabled.
    ///
    /// Pre-clean the input or pick a different tolerance.
    #[error("insufficient precision for this tolerance/data: {0}")]
    InsufficientPrecision(TopologyFailure),

    /// A domain invariant was violated, e.g. asking for an interior point of
    /// a contour with no area.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The cancellation flag in the [`Context`](crate::Context) was raised.
    #[error("operation cancelled")]
    Cancelled,
}

/// A structural impossibility detected while building or walking a planar graph.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{reason} near {location:?}")]
pub struct TopologyFailure {
    /// What went wrong.
    pub reason: &'static str,
    /// Where it went wrong, in the coordinates the graph was built in.
    pub location: Coordinate,
}

impl TopologyFailure {
    pub(crate) fn new(reason: &'static str, location: Coordinate) -> Self {
        Self { reason, location }
    }
}

/// The outcome of a failed graph construction.
///
/// Graph construction is the one place where we expect to recover from
/// failure: a [`BuildFailure::RetryWithSnapping`] means the caller should
/// rebuild the graph with coordinates snapped to the tolerance grid.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildFailure {
    /// Inconsistent topology; try again with snapping.
    RetryWithSnapping(TopologyFailure),
    /// Something retrying won't fix.
    Abort(Error),
}

impl From<Error> for BuildFailure {
    fn from(e: Error) -> Self {
        BuildFailure::Abort(e)
    }
}

impl From<TopologyFailure> for BuildFailure {
    fn from(f: TopologyFailure) -> Self {
        BuildFailure::RetryWithSnapping(f)
    }
}

impl BuildFailure {
    /// Converts into a user-facing error, for when there's no retry left.
    pub fn into_error(self) -> Error {
        match self {
            BuildFailure::RetryWithSnapping(f) => Error::InsufficientPrecision(f),
            BuildFailure::Abort(e) => e,
        }
    }
}
