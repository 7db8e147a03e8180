use serde::{Deserialize, Serialize};

use super::{validation, Contour, Location, ValidationError};
use crate::{context::Context, error::Result, geom::BoundingRectangle};

/// A list of contours with even-odd semantics: a point is inside the polygon
/// if it's inside an odd number of contours.
///
/// After [`Polygon::simplify`], contours don't cross, shells run
/// counter-clockwise, holes run clockwise, and each shell is followed by its
/// holes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    contours: Vec<Contour>,
}

impl Polygon {
    pub fn new(contours: Vec<Contour>) -> Self {
        Self { contours }
    }

    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(Contour::is_empty)
    }

    pub fn bounding_rectangle(&self) -> Option<BoundingRectangle> {
        BoundingRectangle::from_coordinates(self.contours.iter().flat_map(|c| c.vertices()))
    }

    pub(crate) fn translated(&self, dx: f64, dy: f64) -> Polygon {
        Polygon::new(self.contours.iter().map(|c| c.translated(dx, dy)).collect())
    }

    /// For each contour, the number of other contours that enclose it.
    ///
    /// A contour encloses another if it's strictly larger and contains the
    /// other's interior point. Contours without an interior get depth zero.
    pub(crate) fn nesting_depths(&self) -> Vec<usize> {
        let areas: Vec<f64> = self.contours.iter().map(Contour::area).collect();
        self.contours
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let Ok(p) = c.interior_point() else {
                    return 0;
                };
                self.contours
                    .iter()
                    .enumerate()
                    .filter(|&(j, other)| j != i && areas[j] > areas[i] && other.winds_around(&p))
                    .count()
            })
            .collect()
    }

    /// The enclosed area.
    ///
    /// Contours at even nesting depth add their area and contours at odd depth
    /// subtract it, so the answer doesn't depend on how the contours are wound.
    pub fn area(&self) -> f64 {
        self.contours
            .iter()
            .zip(self.nesting_depths())
            .map(|(c, depth)| {
                if depth % 2 == 0 {
                    c.area()
                } else {
                    -c.area()
                }
            })
            .sum()
    }

    pub fn perimeter(&self) -> f64 {
        self.contours.iter().map(Contour::perimeter).sum()
    }

    /// Classifies a point, using the even-odd rule for the interior.
    pub fn locate(&self, p: &crate::Coordinate, tolerance: f64) -> Location {
        let mut inside = false;
        for c in &self.contours {
            match c.locate(p, tolerance) {
                Location::Boundary => return Location::Boundary,
                Location::Interior => inside = !inside,
                Location::Exterior => {}
            }
        }
        if inside {
            Location::Interior
        } else {
            Location::Exterior
        }
    }

    /// Rebuilds the polygon so that its contours are simple, don't cross, and
    /// are wound and ordered as shells followed by their holes.
    pub fn simplify(&self, ctx: &Context) -> Result<Polygon> {
        crate::overlay::simplify_contours(ctx, self)
    }

    /// The first reason this polygon isn't valid in the OGC sense, if any.
    pub fn ogc_validation_error(&self, tolerance: f64) -> Option<ValidationError> {
        validation::ogc_validation_error(self, tolerance)
    }

    pub fn is_ogc_valid(&self, tolerance: f64) -> bool {
        self.ogc_validation_error(tolerance).is_none()
    }
}
