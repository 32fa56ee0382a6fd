//! Planar tissue surface crossed by the needle.

use nalgebra::{Point3, Unit, Vector3};

use crate::{NeedleError, Result};

/// A plane separating free space from tissue.
///
/// The normal points into the tissue: points with a positive signed
/// distance are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueSurface {
    point: Point3<f64>,
    normal: Unit<Vector3<f64>>,
}

impl TissueSurface {
    /// Create a surface through `point` with the given inward normal.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidArgument`] for a zero or non-finite normal.
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Result<Self> {
        if !normal.iter().all(|v| v.is_finite()) {
            return Err(NeedleError::invalid_argument("surface normal is not finite"));
        }
        let normal = Unit::try_new(normal, f64::MIN_POSITIVE)
            .ok_or_else(|| NeedleError::invalid_argument("surface normal has zero length"))?;
        Ok(Self { point, normal })
    }

    /// A point on the plane.
    #[must_use]
    pub fn point(&self) -> Point3<f64> {
        self.point
    }

    /// Unit normal pointing into the tissue.
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal.into_inner()
    }

    /// Signed distance of `p` to the plane, positive inside the tissue.
    #[must_use]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.point).dot(&self.normal)
    }

    /// True if `p` lies strictly inside the tissue.
    #[must_use]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.signed_distance(p) > 0.0
    }
}
