//! Engine configuration.
//!
//! Every entry point takes a [`Context`] explicitly. There is no global
//! tolerance, so two callers using different tolerances can't interfere.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The default tolerance: coordinates closer than this are considered equal.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Above this many input points, candidate segments are found with an R-tree
/// instead of a sorted linear scan.
pub const DEFAULT_SPATIAL_INDEX_THRESHOLD: usize = 800;

/// Immutable configuration for a topology computation.
///
/// ```
/// let ctx: planar::Context = serde_json::from_str(r#"{ "tolerance": 1e-6 }"#).unwrap();
/// assert_eq!(ctx.tolerance, 1e-6);
/// assert_eq!(ctx.spatial_index_threshold, 800);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    /// Coordinates closer than this are merged, and segments shorter than this
    /// are dropped. Must be finite and positive.
    pub tolerance: f64,
    /// Total input point count above which graph construction uses a spatial
    /// index for candidate-segment queries.
    pub spatial_index_threshold: usize,
    #[serde(skip)]
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            spatial_index_threshold: DEFAULT_SPATIAL_INDEX_THRESHOLD,
            cancel: None,
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.tolerance == other.tolerance
            && self.spatial_index_threshold == other.spatial_index_threshold
    }
}

impl Context {
    /// Creates a context with the given tolerance and default everything else.
    pub fn new(tolerance: f64) -> Result<Self> {
        let ctx = Self {
            tolerance,
            ..Self::default()
        };
        ctx.validate()?;
        Ok(ctx)
    }

    /// Sets the point count above which a spatial index is used.
    pub fn with_spatial_index_threshold(mut self, threshold: usize) -> Self {
        self.spatial_index_threshold = threshold;
        self
    }

    /// Attaches a cancellation flag. Raising it makes a running computation
    /// return [`Error::Cancelled`] at its next check.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::Argument(format!(
                "tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}
